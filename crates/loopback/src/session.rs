use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use mediaplug::provider::{
    PAudioParams, PPayloadInfo, PSessionError, PVideoParams, Recorder, RtpChannelContext,
    RtpSessionContext, SessionContextEvent, SessionEventHandler, VideoWidgetContext,
};

use crate::channel::LoopbackChannel;
use crate::dispatch::Dispatcher;
use crate::negotiate;
use crate::packetizer::{self, RtpHeader};

/// Payload bytes per packet when sending file media (20 ms of 8 kHz audio).
const FILE_CHUNK: usize = 160;

const PREVIEW_FALLBACK: (u32, u32) = (320, 240);

/// Shared recording sink. Writes failures are logged and end the recording.
#[derive(Clone, Default)]
pub(crate) struct RecorderSlot(Arc<Mutex<Option<Recorder>>>);

impl RecorderSlot {
    fn set(&self, recorder: Option<Recorder>) {
        *self.0.lock() = recorder;
    }

    pub(crate) fn record(&self, data: &[u8]) {
        let mut slot = self.0.lock();
        let Some(recorder) = slot.as_mut() else {
            return;
        };
        if let Err(e) = recorder.write_all(data).and_then(|()| recorder.flush()) {
            tracing::warn!(error = %e, "recorder write failed, recording stopped");
            *slot = None;
        }
    }
}

#[derive(Default)]
struct Config {
    audio_output_device: String,
    audio_input_device: String,
    video_input_device: String,
    file_input: Option<PathBuf>,
    file_data: Option<Bytes>,
    output_widget: Option<Arc<dyn VideoWidgetContext>>,
    preview_widget: Option<Arc<dyn VideoWidgetContext>>,
    local_audio_params: Vec<PAudioParams>,
    local_audio_payloads: Vec<PPayloadInfo>,
    local_video_params: Vec<PVideoParams>,
    local_video_payloads: Vec<PPayloadInfo>,
    remote_audio_payloads: Vec<PPayloadInfo>,
    remote_video_payloads: Vec<PPayloadInfo>,
}

impl Config {
    fn wants_media(&self) -> bool {
        !(self.local_audio_params.is_empty()
            && self.local_audio_payloads.is_empty()
            && self.local_video_params.is_empty()
            && self.local_video_payloads.is_empty())
    }

    /// Local payloads, preferring explicit payload lists over raw params.
    fn local_audio(&self) -> Vec<PPayloadInfo> {
        if self.local_audio_payloads.is_empty() {
            negotiate::audio_payloads(&self.local_audio_params)
        } else {
            self.local_audio_payloads.clone()
        }
    }

    fn local_video(&self) -> Vec<PPayloadInfo> {
        if self.local_video_payloads.is_empty() {
            negotiate::video_payloads(&self.local_video_params)
        } else {
            self.local_video_payloads.clone()
        }
    }

    fn negotiate(&self) -> Negotiated {
        let audio = negotiate::intersect(&self.local_audio(), &self.remote_audio_payloads);
        let video = negotiate::intersect(&self.local_video(), &self.remote_video_payloads);
        let audio_params = if self.local_audio_params.is_empty() {
            negotiate::audio_params(&audio)
        } else {
            self.local_audio_params.clone()
        };
        Negotiated {
            audio,
            video,
            audio_params,
            video_params: self.local_video_params.clone(),
        }
    }
}

#[derive(Default)]
struct Negotiated {
    audio: Vec<PPayloadInfo>,
    video: Vec<PPayloadInfo>,
    audio_params: Vec<PAudioParams>,
    video_params: Vec<PVideoParams>,
}

/// Channels of one started run.
struct Run {
    audio: Arc<LoopbackChannel>,
    video: Arc<LoopbackChannel>,
}

impl Run {
    fn close(&self) {
        self.audio.close();
        self.video.close();
    }
}

struct SessionInner {
    dispatcher: Dispatcher,
    config: Mutex<Config>,
    negotiated: Mutex<Negotiated>,
    run: Mutex<Option<Run>>,
    error: Mutex<PSessionError>,
    volumes: Mutex<(i32, i32)>,
    recorder: RecorderSlot,
    handler: Mutex<Option<SessionEventHandler>>,
}

/// Session context of the loopback provider.
///
/// Commands are queued to a per-session dispatcher thread and reported back
/// from there. While started, each channel returns what was written to it.
/// A file input (path or in-memory data) is instead sent as RTP to the
/// recorder, after which the session reports *finished*.
pub(crate) struct LoopbackSession {
    inner: Arc<SessionInner>,
}

impl LoopbackSession {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                dispatcher: Dispatcher::spawn("mediaplug-loopback"),
                config: Mutex::default(),
                negotiated: Mutex::default(),
                run: Mutex::new(None),
                error: Mutex::default(),
                volumes: Mutex::new((100, 100)),
                recorder: RecorderSlot::default(),
                handler: Mutex::new(None),
            }),
        }
    }

    /// Queue `job` on the dispatcher; skipped if the session is gone by then.
    fn post(&self, job: impl FnOnce(&SessionInner) + Send + 'static) {
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        self.inner.dispatcher.post(move || {
            if let Some(inner) = weak.upgrade() {
                job(&inner);
            }
        });
    }
}

impl SessionInner {
    fn emit(&self, event: SessionContextEvent) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    fn fail(&self, code: PSessionError) {
        *self.error.lock() = code;
        self.end_run();
        tracing::warn!(?code, "loopback session failed");
        self.emit(SessionContextEvent::Error);
    }

    fn start_run(&self) {
        if self.run.lock().is_some() {
            tracing::debug!("loopback session already started");
            return;
        }

        let (media, wants_media, negotiated) = {
            let config = self.config.lock();
            let media = match (&config.file_data, &config.file_input) {
                (Some(data), _) => Ok(Some(data.clone())),
                (None, Some(path)) => read_media(path).map(Some),
                (None, None) => Ok(None),
            };
            tracing::debug!(
                audio_in = %config.audio_input_device,
                audio_out = %config.audio_output_device,
                video_in = %config.video_input_device,
                output_widget = config.output_widget.is_some(),
                "loopback session starting"
            );
            (media, config.wants_media(), config.negotiate())
        };

        let media = match media {
            Ok(media) => media,
            Err(()) => return self.fail(PSessionError::System),
        };
        if wants_media && negotiated.audio.is_empty() && negotiated.video.is_empty() {
            tracing::warn!("no payload in common with the remote offer");
            return self.fail(PSessionError::Codec);
        }

        let payload_type = negotiated.audio.first().map_or(0, |p| p.id);
        *self.negotiated.lock() = negotiated;
        *self.error.lock() = PSessionError::Generic;
        *self.run.lock() = Some(Run {
            audio: LoopbackChannel::new("audio", self.dispatcher.clone(), self.recorder.clone()),
            video: LoopbackChannel::new("video", self.dispatcher.clone(), self.recorder.clone()),
        });
        tracing::info!(file = media.is_some(), "loopback session started");
        self.emit(SessionContextEvent::Started);
        self.paint_preview();

        if let Some(media) = media {
            self.send_file(&media, payload_type);
            self.end_run();
            tracing::info!("loopback file input finished");
            self.emit(SessionContextEvent::Finished);
        }
    }

    fn send_file(&self, media: &[u8], payload_type: i32) {
        let mut header = RtpHeader::with_random_ssrc(payload_type.clamp(0, 127) as u8);
        let packets = packetizer::packetize(&mut header, media, FILE_CHUNK, FILE_CHUNK as u32);
        tracing::debug!(packets = packets.len(), ssrc = header.ssrc(), "sending file media");
        for packet in &packets {
            self.recorder.record(packet);
        }
    }

    fn paint_preview(&self) {
        let Some(widget) = self.config.lock().preview_widget.clone() else {
            return;
        };
        let size = widget.desired_size();
        let (width, height) = if size.width == 0 || size.height == 0 {
            PREVIEW_FALLBACK
        } else {
            (size.width, size.height)
        };
        widget.show_frame(RgbaImage::from_pixel(width, height, Rgba([128, 128, 128, 255])));
    }

    /// Close and forget the current run's channels. Returns whether one was
    /// running.
    fn end_run(&self) -> bool {
        let run = self.run.lock().take();
        match run {
            Some(run) => {
                run.close();
                true
            }
            None => false,
        }
    }

    fn stop_run(&self) {
        if self.end_run() {
            tracing::info!("loopback session stopped");
            self.emit(SessionContextEvent::Stopped);
        }
    }

    fn renegotiate(&self) {
        let negotiated = self.config.lock().negotiate();
        *self.negotiated.lock() = negotiated;
        self.emit(SessionContextEvent::PreferencesUpdated);
    }

    fn transmit_audio(&self, index: Option<usize>) {
        if self.run.lock().is_none() {
            return;
        }
        let payload = index.and_then(|i| self.negotiated.lock().audio.get(i).map(|p| p.name.clone()));
        tracing::debug!(?index, ?payload, "loopback audio transmit");
        let level = if index.is_some() { self.volumes.lock().1 } else { 0 };
        self.emit(SessionContextEvent::AudioInputIntensityChanged(level));
    }

    fn transmit_video(&self, index: Option<usize>) {
        if self.run.lock().is_none() {
            return;
        }
        let payload = index.and_then(|i| self.negotiated.lock().video.get(i).map(|p| p.name.clone()));
        tracing::debug!(?index, ?payload, "loopback video transmit");
    }
}

fn read_media(path: &Path) -> Result<Bytes, ()> {
    fs::read(path).map(Bytes::from).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "cannot read file input");
    })
}

impl RtpSessionContext for LoopbackSession {
    fn set_audio_output_device(&self, device_id: &str) {
        self.inner.config.lock().audio_output_device = device_id.to_string();
    }

    fn set_audio_input_device(&self, device_id: &str) {
        self.inner.config.lock().audio_input_device = device_id.to_string();
    }

    fn set_video_input_device(&self, device_id: &str) {
        self.inner.config.lock().video_input_device = device_id.to_string();
    }

    fn set_file_input(&self, file_name: &Path) {
        self.inner.config.lock().file_input = Some(file_name.to_path_buf());
    }

    fn set_file_data_input(&self, data: Bytes) {
        self.inner.config.lock().file_data = Some(data);
    }

    fn set_video_output_widget(&self, widget: Option<Arc<dyn VideoWidgetContext>>) {
        self.inner.config.lock().output_widget = widget;
    }

    fn set_video_preview_widget(&self, widget: Option<Arc<dyn VideoWidgetContext>>) {
        self.inner.config.lock().preview_widget = widget;
    }

    fn set_recorder(&self, recorder: Option<Recorder>) {
        self.inner.recorder.set(recorder);
    }

    fn set_local_audio_params(&self, params: &[PAudioParams]) {
        self.inner.config.lock().local_audio_params = params.to_vec();
    }

    fn set_local_audio_payload_info(&self, info: &[PPayloadInfo]) {
        self.inner.config.lock().local_audio_payloads = info.to_vec();
    }

    fn set_local_video_params(&self, params: &[PVideoParams]) {
        self.inner.config.lock().local_video_params = params.to_vec();
    }

    fn set_local_video_payload_info(&self, info: &[PPayloadInfo]) {
        self.inner.config.lock().local_video_payloads = info.to_vec();
    }

    fn set_remote_audio_payload_info(&self, info: &[PPayloadInfo]) {
        self.inner.config.lock().remote_audio_payloads = info.to_vec();
    }

    fn set_remote_video_payload_info(&self, info: &[PPayloadInfo]) {
        self.inner.config.lock().remote_video_payloads = info.to_vec();
    }

    fn start(&self) {
        self.post(SessionInner::start_run);
    }

    fn update_preferences(&self) {
        self.post(SessionInner::renegotiate);
    }

    fn transmit_audio(&self, params_index: usize) {
        self.post(move |inner| inner.transmit_audio(Some(params_index)));
    }

    fn transmit_video(&self, params_index: usize) {
        self.post(move |inner| inner.transmit_video(Some(params_index)));
    }

    fn pause_audio(&self) {
        self.post(|inner| inner.transmit_audio(None));
    }

    fn pause_video(&self) {
        self.post(|inner| inner.transmit_video(None));
    }

    fn stop(&self) {
        self.post(SessionInner::stop_run);
    }

    fn audio_payload_info(&self) -> Vec<PPayloadInfo> {
        self.inner.negotiated.lock().audio.clone()
    }

    fn video_payload_info(&self) -> Vec<PPayloadInfo> {
        self.inner.negotiated.lock().video.clone()
    }

    fn audio_params(&self) -> Vec<PAudioParams> {
        self.inner.negotiated.lock().audio_params.clone()
    }

    fn video_params(&self) -> Vec<PVideoParams> {
        self.inner.negotiated.lock().video_params.clone()
    }

    fn can_transmit_audio(&self) -> bool {
        self.inner.run.lock().is_some() && !self.inner.negotiated.lock().audio.is_empty()
    }

    fn can_transmit_video(&self) -> bool {
        self.inner.run.lock().is_some() && !self.inner.negotiated.lock().video.is_empty()
    }

    fn output_volume(&self) -> i32 {
        self.inner.volumes.lock().0
    }

    fn set_output_volume(&self, level: i32) {
        self.inner.volumes.lock().0 = level.clamp(0, 100);
    }

    fn input_volume(&self) -> i32 {
        self.inner.volumes.lock().1
    }

    fn set_input_volume(&self, level: i32) {
        self.inner.volumes.lock().1 = level.clamp(0, 100);
    }

    fn error_code(&self) -> PSessionError {
        *self.inner.error.lock()
    }

    fn audio_rtp_channel(&self) -> Option<Arc<dyn RtpChannelContext>> {
        let run = self.inner.run.lock();
        run.as_ref().map(|r| r.audio.clone() as Arc<dyn RtpChannelContext>)
    }

    fn video_rtp_channel(&self) -> Option<Arc<dyn RtpChannelContext>> {
        let run = self.inner.run.lock();
        run.as_ref().map(|r| r.video.clone() as Arc<dyn RtpChannelContext>)
    }

    fn set_event_handler(&self, handler: Option<SessionEventHandler>) {
        *self.inner.handler.lock() = handler;
    }
}

impl Drop for LoopbackSession {
    fn drop(&mut self) {
        self.inner.handler.lock().take();
        self.inner.run.lock().take();
    }
}
