//! In-crate mock provider used by unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::provider::{
    ChannelContextEvent, ChannelEventHandler, PAudioParams, PDevice, PDeviceKind, PPayloadInfo,
    PRtpPacket, PSessionError, PSize, PVideoParams, Plugin, Provider, Recorder,
    RtpChannelContext, RtpSessionContext, SessionContextEvent, SessionEventHandler,
    VideoWidgetContext,
};

#[derive(Debug, Default)]
pub(crate) struct ProviderStats {
    pub inits: AtomicUsize,
    pub drops: AtomicUsize,
}

pub(crate) struct MockProvider {
    name: String,
    fail_init: bool,
    stats: Arc<ProviderStats>,
    sessions: Arc<Mutex<Vec<Arc<MockSession>>>>,
}

impl MockProvider {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_init: false,
            stats: Arc::default(),
            sessions: Arc::default(),
        }
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Every session context this provider has created, oldest first.
    pub fn sessions(&self) -> Arc<Mutex<Vec<Arc<MockSession>>>> {
        self.sessions.clone()
    }

    fn device(kind: PDeviceKind, id: &str) -> PDevice {
        PDevice {
            kind,
            name: format!("Mock {id}"),
            id: id.to_string(),
        }
    }
}

impl Provider for MockProvider {
    fn init(&mut self, _resource_path: &Path) -> bool {
        self.stats.inits.fetch_add(1, Ordering::SeqCst);
        !self.fail_init
    }

    fn credit_name(&self) -> String {
        self.name.clone()
    }

    fn credit_text(&self) -> String {
        format!("{} test provider", self.name)
    }

    fn audio_output_devices(&self) -> Vec<PDevice> {
        vec![Self::device(PDeviceKind::AudioOut, "mock-speaker")]
    }

    fn audio_input_devices(&self) -> Vec<PDevice> {
        vec![Self::device(PDeviceKind::AudioIn, "mock-mic")]
    }

    fn video_input_devices(&self) -> Vec<PDevice> {
        vec![Self::device(PDeviceKind::VideoIn, "mock-camera")]
    }

    fn supported_audio_modes(&self) -> Vec<PAudioParams> {
        vec![PAudioParams {
            codec: "pcmu".to_string(),
            sample_rate: 8000,
            sample_size: 16,
            channels: 1,
        }]
    }

    fn supported_video_modes(&self) -> Vec<PVideoParams> {
        vec![PVideoParams {
            codec: "theora".to_string(),
            size: PSize {
                width: 320,
                height: 240,
            },
            fps: 30,
        }]
    }

    fn create_rtp_session(&self) -> Box<dyn RtpSessionContext> {
        let session = Arc::new(MockSession::default());
        self.sessions.lock().push(session.clone());
        Box::new(session)
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.stats.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out its provider once.
pub(crate) struct MockPlugin {
    provider: Mutex<Option<MockProvider>>,
    stats: Arc<ProviderStats>,
}

impl MockPlugin {
    pub fn new(provider: MockProvider) -> Self {
        Self {
            stats: provider.stats.clone(),
            provider: Mutex::new(Some(provider)),
        }
    }

    pub fn declining() -> Self {
        Self {
            provider: Mutex::new(None),
            stats: Arc::default(),
        }
    }

    pub fn provider_stats(&self) -> Arc<ProviderStats> {
        self.stats.clone()
    }
}

impl Plugin for MockPlugin {
    fn create_provider(&self) -> Option<Box<dyn Provider>> {
        let provider = self.provider.lock().take()?;
        Some(Box::new(provider))
    }
}

/// Everything a [`MockSession`] has been configured with.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionConfig {
    pub local_audio_payloads: Vec<PPayloadInfo>,
    pub local_audio_params: Vec<PAudioParams>,
    pub local_video_payloads: Vec<PPayloadInfo>,
    pub local_video_params: Vec<PVideoParams>,
    pub remote_audio_payloads: Vec<PPayloadInfo>,
    pub remote_video_payloads: Vec<PPayloadInfo>,
    pub file_input: Option<PathBuf>,
    pub file_data: Option<Bytes>,
    pub has_output_widget: bool,
    pub has_preview_widget: bool,
    pub has_recorder: bool,
    pub output_volume: i32,
    pub input_volume: i32,
}

/// Session context driven by the test: nothing happens until [`emit`](Self::emit).
#[derive(Default)]
pub(crate) struct MockSession {
    handler: Mutex<Option<SessionEventHandler>>,
    calls: Mutex<Vec<String>>,
    config: Mutex<SessionConfig>,
    error: Mutex<PSessionError>,
    audio: Mutex<Option<Arc<MockChannel>>>,
    video: Mutex<Option<Arc<MockChannel>>>,
}

impl MockSession {
    /// Device selections and transport commands, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn config(&self) -> SessionConfig {
        self.config.lock().clone()
    }

    pub fn set_error(&self, code: PSessionError) {
        *self.error.lock() = code;
    }

    pub fn audio(&self) -> Option<Arc<MockChannel>> {
        self.audio.lock().clone()
    }

    pub fn video(&self) -> Option<Arc<MockChannel>> {
        self.video.lock().clone()
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Report `event` as the provider would. `Started` creates fresh channel
    /// contexts for the new run first.
    pub fn emit(&self, event: SessionContextEvent) {
        if event == SessionContextEvent::Started {
            *self.audio.lock() = Some(MockChannel::new());
            *self.video.lock() = Some(MockChannel::new());
        }
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl RtpSessionContext for Arc<MockSession> {
    fn set_audio_output_device(&self, device_id: &str) {
        self.record(format!("audio_output:{device_id}"));
    }

    fn set_audio_input_device(&self, device_id: &str) {
        self.record(format!("audio_input:{device_id}"));
    }

    fn set_video_input_device(&self, device_id: &str) {
        self.record(format!("video_input:{device_id}"));
    }

    fn set_file_input(&self, file_name: &Path) {
        self.config.lock().file_input = Some(file_name.to_path_buf());
    }

    fn set_file_data_input(&self, data: Bytes) {
        self.config.lock().file_data = Some(data);
    }

    fn set_video_output_widget(&self, widget: Option<Arc<dyn VideoWidgetContext>>) {
        self.config.lock().has_output_widget = widget.is_some();
    }

    fn set_video_preview_widget(&self, widget: Option<Arc<dyn VideoWidgetContext>>) {
        self.config.lock().has_preview_widget = widget.is_some();
    }

    fn set_recorder(&self, recorder: Option<Recorder>) {
        self.config.lock().has_recorder = recorder.is_some();
    }

    fn set_local_audio_params(&self, params: &[PAudioParams]) {
        self.config.lock().local_audio_params = params.to_vec();
    }

    fn set_local_audio_payload_info(&self, info: &[PPayloadInfo]) {
        self.config.lock().local_audio_payloads = info.to_vec();
    }

    fn set_local_video_params(&self, params: &[PVideoParams]) {
        self.config.lock().local_video_params = params.to_vec();
    }

    fn set_local_video_payload_info(&self, info: &[PPayloadInfo]) {
        self.config.lock().local_video_payloads = info.to_vec();
    }

    fn set_remote_audio_payload_info(&self, info: &[PPayloadInfo]) {
        self.config.lock().remote_audio_payloads = info.to_vec();
    }

    fn set_remote_video_payload_info(&self, info: &[PPayloadInfo]) {
        self.config.lock().remote_video_payloads = info.to_vec();
    }

    fn start(&self) {}

    fn update_preferences(&self) {
        self.record("update_preferences".to_string());
    }

    fn transmit_audio(&self, params_index: usize) {
        self.record(format!("transmit_audio:{params_index}"));
    }

    fn transmit_video(&self, params_index: usize) {
        self.record(format!("transmit_video:{params_index}"));
    }

    fn pause_audio(&self) {
        self.record("pause_audio".to_string());
    }

    fn pause_video(&self) {
        self.record("pause_video".to_string());
    }

    fn stop(&self) {}

    fn audio_payload_info(&self) -> Vec<PPayloadInfo> {
        self.config.lock().remote_audio_payloads.clone()
    }

    fn video_payload_info(&self) -> Vec<PPayloadInfo> {
        self.config.lock().remote_video_payloads.clone()
    }

    fn audio_params(&self) -> Vec<PAudioParams> {
        self.config.lock().local_audio_params.clone()
    }

    fn video_params(&self) -> Vec<PVideoParams> {
        self.config.lock().local_video_params.clone()
    }

    fn can_transmit_audio(&self) -> bool {
        true
    }

    fn can_transmit_video(&self) -> bool {
        false
    }

    fn output_volume(&self) -> i32 {
        self.config.lock().output_volume
    }

    fn set_output_volume(&self, level: i32) {
        self.config.lock().output_volume = level;
    }

    fn input_volume(&self) -> i32 {
        self.config.lock().input_volume
    }

    fn set_input_volume(&self, level: i32) {
        self.config.lock().input_volume = level;
    }

    fn error_code(&self) -> PSessionError {
        *self.error.lock()
    }

    fn audio_rtp_channel(&self) -> Option<Arc<dyn RtpChannelContext>> {
        self.audio().map(|c| c as Arc<dyn RtpChannelContext>)
    }

    fn video_rtp_channel(&self) -> Option<Arc<dyn RtpChannelContext>> {
        self.video().map(|c| c as Arc<dyn RtpChannelContext>)
    }

    fn set_event_handler(&self, handler: Option<SessionEventHandler>) {
        *self.handler.lock() = handler;
    }
}

/// Channel context that records what the layer asks of it.
#[derive(Default)]
pub(crate) struct MockChannel {
    incoming: Mutex<VecDeque<PRtpPacket>>,
    enable_calls: Mutex<Vec<bool>>,
    written: Mutex<Vec<PRtpPacket>>,
    handler: Mutex<Option<ChannelEventHandler>>,
}

impl MockChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_incoming(&self, data: Vec<u8>, port_offset: usize) {
        self.incoming.lock().push_back(PRtpPacket {
            raw_value: Bytes::from(data),
            port_offset,
        });
    }

    pub fn enable_calls(&self) -> Vec<bool> {
        self.enable_calls.lock().clone()
    }

    pub fn written(&self) -> Vec<PRtpPacket> {
        self.written.lock().clone()
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    pub fn handler(&self) -> Option<ChannelEventHandler> {
        self.handler.lock().clone()
    }

    pub fn emit(&self, event: ChannelContextEvent) {
        if let Some(handler) = self.handler() {
            handler(event);
        }
    }
}

impl RtpChannelContext for MockChannel {
    fn set_enabled(&self, enabled: bool) {
        self.enable_calls.lock().push(enabled);
    }

    fn packets_available(&self) -> usize {
        self.incoming.lock().len()
    }

    fn read(&self) -> Option<PRtpPacket> {
        self.incoming.lock().pop_front()
    }

    fn write(&self, packet: &PRtpPacket) {
        self.written.lock().push(packet.clone());
    }

    fn set_event_handler(&self, handler: Option<ChannelEventHandler>) {
        *self.handler.lock() = handler;
    }
}
