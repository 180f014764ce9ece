//! Asynchronous capability query.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::listeners::{Listeners, Subscription};
use crate::marshal::import_all;
use crate::registry::{self, ProviderHandle};
use crate::types::{AudioParams, Device, VideoParams};

/// Devices and modes reported by the provider at the time of a lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub audio_output_devices: Vec<Device>,
    pub audio_input_devices: Vec<Device>,
    pub video_input_devices: Vec<Device>,
    pub supported_audio_modes: Vec<AudioParams>,
    pub supported_video_modes: Vec<VideoParams>,
}

impl Capabilities {
    fn query(provider: Option<&ProviderHandle>) -> Self {
        let Some(provider) = provider else {
            return Self::default();
        };
        Self {
            audio_output_devices: import_all(&provider.audio_output_devices()),
            audio_input_devices: import_all(&provider.audio_input_devices()),
            video_input_devices: import_all(&provider.video_input_devices()),
            supported_audio_modes: import_all(&provider.supported_audio_modes()),
            supported_video_modes: import_all(&provider.supported_video_modes()),
        }
    }
}

/// Queries devices and supported modes on a background thread.
///
/// ```no_run
/// let features = mediaplug::Features::new();
/// features.lookup();
/// features.wait_for_finished(-1);
/// for device in features.audio_input_devices() {
///     println!("{} ({})", device.name(), device.id());
/// }
/// ```
pub struct Features {
    shared: Arc<FeaturesShared>,
}

struct FeaturesShared {
    /// `None` resolves the active provider when the lookup runs.
    provider: Option<Arc<ProviderHandle>>,
    status: Mutex<Status>,
    finished: Condvar,
    listeners: Listeners<()>,
}

#[derive(Default)]
struct Status {
    running: bool,
    results: Capabilities,
}

impl Features {
    /// Query whatever provider is active when [`lookup`](Self::lookup) runs.
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_provider(provider: Arc<ProviderHandle>) -> Self {
        Self::build(Some(provider))
    }

    fn build(provider: Option<Arc<ProviderHandle>>) -> Self {
        Self {
            shared: Arc::new(FeaturesShared {
                provider,
                status: Mutex::new(Status::default()),
                finished: Condvar::new(),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Start a query. Ignored while a previous one is still running.
    pub fn lookup(&self) {
        {
            let mut status = self.shared.status.lock();
            if status.running {
                tracing::debug!("feature lookup already running");
                return;
            }
            status.running = true;
        }

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("mediaplug-features".to_string())
            .spawn(move || shared.run());
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "could not spawn feature lookup thread");
            self.shared.complete(Capabilities::default());
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.status.lock().running
    }

    /// Block until the running lookup completes. A negative timeout waits
    /// forever. Returns `false` if the timeout elapsed first; `true` at once
    /// if nothing is running.
    pub fn wait_for_finished(&self, timeout_ms: i64) -> bool {
        let mut status = self.shared.status.lock();
        if timeout_ms < 0 {
            while status.running {
                self.shared.finished.wait(&mut status);
            }
            return true;
        }

        let timeout = Duration::from_millis(timeout_ms.unsigned_abs());
        let result = self
            .shared
            .finished
            .wait_while_for(&mut status, |s| s.running, timeout);
        !result.timed_out() || !status.running
    }

    /// Called on the lookup thread after results are published.
    pub fn on_finished(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.shared.listeners.add(move |_| callback());
        let weak = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.listeners.remove(id);
            }
        })
    }

    /// Snapshot of the last completed lookup.
    pub fn capabilities(&self) -> Capabilities {
        self.shared.status.lock().results.clone()
    }

    pub fn audio_output_devices(&self) -> Vec<Device> {
        self.shared.status.lock().results.audio_output_devices.clone()
    }

    pub fn audio_input_devices(&self) -> Vec<Device> {
        self.shared.status.lock().results.audio_input_devices.clone()
    }

    pub fn video_input_devices(&self) -> Vec<Device> {
        self.shared.status.lock().results.video_input_devices.clone()
    }

    pub fn supported_audio_modes(&self) -> Vec<AudioParams> {
        self.shared.status.lock().results.supported_audio_modes.clone()
    }

    pub fn supported_video_modes(&self) -> Vec<VideoParams> {
        self.shared.status.lock().results.supported_video_modes.clone()
    }
}

impl Default for Features {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Features {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Features")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl FeaturesShared {
    fn run(&self) {
        let provider = match &self.provider {
            Some(provider) => Some(provider.clone()),
            None => registry::active_provider(),
        };
        let results = Capabilities::query(provider.as_deref());
        tracing::debug!(
            audio_out = results.audio_output_devices.len(),
            audio_in = results.audio_input_devices.len(),
            video_in = results.video_input_devices.len(),
            "feature lookup finished"
        );
        self.complete(results);
    }

    fn complete(&self, results: Capabilities) {
        {
            let mut status = self.status.lock();
            status.results = results;
            status.running = false;
        }
        self.finished.notify_all();
        self.listeners.emit(&());
    }
}
