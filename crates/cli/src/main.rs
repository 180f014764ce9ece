use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mediaplug::registry::{self, PluginResult};
use mediaplug::{Features, LoaderConfig, RtpPacket, RtpSession, SessionEvent};
use tracing_subscriber::EnvFilter;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(
    name = "mediaplug-probe",
    about = "Load a mediaplug provider and inspect what it offers"
)]
struct Args {
    /// Provider plugin library (overrides MEDIAPLUG_PLUGIN)
    #[arg(long)]
    plugin: Option<PathBuf>,

    /// Resource directory handed to the provider (overrides MEDIAPLUG_RESOURCES)
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Make the built-in loopback provider available to static discovery
    #[arg(long)]
    static_loopback: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the provider's credits and where it was loaded from
    Info,
    /// List devices and supported modes
    Devices {
        /// Give up after this many milliseconds (negative waits forever)
        #[arg(long, default_value_t = 5000, allow_negative_numbers = true)]
        timeout_ms: i64,
    },
    /// Start a session, send packets on the audio channel and read them back
    Loopback {
        #[arg(long, default_value_t = 5)]
        count: u16,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match LoaderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid environment: {e}");
            return ExitCode::from(2);
        }
    };
    if let Some(plugin) = args.plugin {
        config = config.with_plugin(plugin);
    }
    if let Some(resources) = args.resources {
        config = config.with_resources(resources);
    }
    if args.static_loopback {
        mediaplug_loopback::register_static();
    }

    match registry::load_configured(&config) {
        PluginResult::Success => {}
        failure => {
            eprintln!("No provider loaded: {failure:?}");
            return ExitCode::FAILURE;
        }
    }

    let outcome = match args.command {
        Command::Info => info(),
        Command::Devices { timeout_ms } => devices(timeout_ms),
        Command::Loopback { count } => loopback(count),
    };
    registry::unload_plugin();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn info() -> Result<(), String> {
    let name = registry::credit_name().ok_or("provider disappeared")?;
    println!("provider: {name}");
    println!("origin:   {:?}", registry::active_origin());
    if let Some(text) = registry::credit_text() {
        println!();
        println!("{text}");
    }
    Ok(())
}

fn devices(timeout_ms: i64) -> Result<(), String> {
    let features = Features::new();
    features.lookup();
    if !features.wait_for_finished(timeout_ms) {
        return Err(format!("feature lookup did not finish within {timeout_ms} ms"));
    }

    let caps = features.capabilities();
    for (title, devices) in [
        ("audio outputs", &caps.audio_output_devices),
        ("audio inputs", &caps.audio_input_devices),
        ("video inputs", &caps.video_input_devices),
    ] {
        println!("{title}:");
        for device in devices {
            println!("  {:<24} {}", device.id(), device.name());
        }
    }
    println!("audio modes:");
    for mode in &caps.supported_audio_modes {
        println!(
            "  {} {} Hz, {} bit, {} ch",
            mode.codec, mode.sample_rate, mode.sample_size, mode.channels
        );
    }
    println!("video modes:");
    for mode in &caps.supported_video_modes {
        println!(
            "  {} {}x{} @ {} fps",
            mode.codec, mode.size.width, mode.size.height, mode.fps
        );
    }
    Ok(())
}

fn loopback(count: u16) -> Result<(), String> {
    let session = RtpSession::new().map_err(|e| e.to_string())?;
    let (event_tx, events) = mpsc::channel();
    let _events = session.subscribe(move |event| {
        let _ = event_tx.send(event);
    });

    session.start();
    wait_for(&events, SessionEvent::Started)?;

    let audio = session.audio_rtp_channel();
    let (ready_tx, ready) = mpsc::channel();
    let _ready = audio.on_ready_read(move || {
        let _ = ready_tx.send(());
    });

    for sequence in 0..count {
        let [hi, lo] = sequence.to_be_bytes();
        audio.write(&RtpPacket::new(vec![0x80, 0x00, hi, lo], 0));
    }

    let mut received = 0;
    while received < count {
        if ready.recv_timeout(EVENT_TIMEOUT).is_err() {
            break;
        }
        loop {
            let packet = audio.read();
            if packet.is_null() {
                break;
            }
            received += 1;
            println!("packet {received}: {} bytes", packet.raw_value().len());
        }
    }

    session.stop();
    wait_for(&events, SessionEvent::Stopped)?;

    if received == count {
        println!("{received}/{count} packets looped back");
        Ok(())
    } else {
        Err(format!("only {received}/{count} packets came back"))
    }
}

fn wait_for(events: &mpsc::Receiver<SessionEvent>, expected: SessionEvent) -> Result<(), String> {
    loop {
        match events.recv_timeout(EVENT_TIMEOUT) {
            Ok(event) if event == expected => return Ok(()),
            Ok(SessionEvent::Error) => return Err("session reported an error".to_string()),
            Ok(SessionEvent::Finished) => return Err("session finished early".to_string()),
            Ok(event) => tracing::debug!(?event, "session event"),
            Err(_) => return Err(format!("timed out waiting for {expected:?}")),
        }
    }
}
