use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, ReentrantMutex};

use crate::error::{MediaError, Result};
use crate::listeners::{Listeners, Subscription};
use crate::marshal::{export_all, import_all};
use crate::provider::{
    PAudioParams, PPayloadInfo, PVideoParams, Recorder, RtpSessionContext, SessionContextEvent,
};
use crate::registry::{self, ProviderHandle};
use crate::rtp::RtpChannel;
use crate::types::{AudioParams, PayloadInfo, VideoParams};
use crate::video::VideoWidget;

/// Lifecycle of an [`RtpSession`] as last reported by the provider.
///
/// ```text
/// Idle --started--> Started --stopped--> Stopped
///                           --finished-> Finished
///                           --error----> Error
/// Stopped | Finished | Error --started--> Started
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Started,
    Stopped,
    Finished,
    Error,
}

/// Notifications re-emitted to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Channels are bound and usable.
    Started,
    /// Negotiated payloads/params changed after `update_preferences`.
    PreferencesUpdated,
    /// Local input level, 0..=100.
    AudioInputIntensityChanged(i32),
    /// Channels have been unbound.
    Stopped,
    /// File-backed input reached its end; channels have been unbound.
    Finished,
    /// The provider failed; see [`RtpSession::error_code`]. Channels have been
    /// unbound.
    Error,
}

/// Error code of a failed session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionError {
    #[default]
    Generic,
    System,
    Codec,
}

/// Local media preferences: either concrete payload types or raw parameters
/// for the provider to derive payloads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalPreferences<P> {
    Payloads(Vec<PayloadInfo>),
    Params(Vec<P>),
}

impl From<Vec<AudioParams>> for LocalPreferences<AudioParams> {
    fn from(params: Vec<AudioParams>) -> Self {
        Self::Params(params)
    }
}

impl From<Vec<VideoParams>> for LocalPreferences<VideoParams> {
    fn from(params: Vec<VideoParams>) -> Self {
        Self::Params(params)
    }
}

impl From<Vec<PayloadInfo>> for LocalPreferences<AudioParams> {
    fn from(info: Vec<PayloadInfo>) -> Self {
        Self::Payloads(info)
    }
}

impl From<Vec<PayloadInfo>> for LocalPreferences<VideoParams> {
    fn from(info: Vec<PayloadInfo>) -> Self {
        Self::Payloads(info)
    }
}

/// An audio/video RTP session driven by the active provider.
///
/// Configuration calls are forwarded verbatim to the provider's session
/// context; the provider decides when they take effect. `start`/`stop` only
/// request a transition. The provider reports the outcome asynchronously and
/// the session mirrors it:
///
/// - on *started*, both channels are bound to the provider's channel contexts
///   for this run, then [`SessionEvent::Started`] is emitted;
/// - on *stopped*, *finished* or *error*, both channels are unbound first, then
///   the event is emitted. A caller reacting to the event can no longer reach
///   the torn-down contexts.
///
/// A provider that never reports leaves the session in its current state.
pub struct RtpSession {
    shared: Arc<SessionShared>,
}

struct SessionShared {
    context: Box<dyn RtpSessionContext>,
    audio: RtpChannel,
    video: RtpChannel,
    state: Mutex<SessionState>,
    /// Serializes provider notifications for this session.
    dispatch: ReentrantMutex<()>,
    listeners: Listeners<SessionEvent>,
    // Last: keeps the provider's code loaded until the context is gone.
    _provider: Arc<ProviderHandle>,
}

impl RtpSession {
    /// Create a session on the active provider (running static discovery if
    /// needed).
    pub fn new() -> Result<Self> {
        let provider = registry::active_provider().ok_or(MediaError::NoProvider)?;
        Ok(Self::with_provider(&provider))
    }

    /// Create a session on a specific provider.
    pub fn with_provider(provider: &Arc<ProviderHandle>) -> Self {
        let context = provider.create_rtp_session();
        let shared = Arc::new(SessionShared {
            context,
            audio: RtpChannel::new("audio"),
            video: RtpChannel::new("video"),
            state: Mutex::new(SessionState::Idle),
            dispatch: ReentrantMutex::new(()),
            listeners: Listeners::new(),
            _provider: provider.clone(),
        });

        let weak = Arc::downgrade(&shared);
        shared.context.set_event_handler(Some(Arc::new(move |event: SessionContextEvent| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_event(event);
            }
        })));
        tracing::debug!("rtp session created");

        Self { shared }
    }

    /// Receive session notifications. Callbacks run on the provider's
    /// execution context.
    pub fn subscribe(
        &self,
        callback: impl Fn(SessionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.shared.listeners.add(move |event| callback(*event));
        let weak = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.listeners.remove(id);
            }
        })
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    pub fn set_audio_output_device(&self, device_id: &str) {
        self.shared.context.set_audio_output_device(device_id);
    }

    pub fn set_audio_input_device(&self, device_id: &str) {
        self.shared.context.set_audio_input_device(device_id);
    }

    pub fn set_video_input_device(&self, device_id: &str) {
        self.shared.context.set_video_input_device(device_id);
    }

    /// Use a media file instead of capture devices.
    pub fn set_file_input(&self, file_name: impl AsRef<Path>) {
        self.shared.context.set_file_input(file_name.as_ref());
    }

    /// Use in-memory media file data instead of capture devices.
    pub fn set_file_data_input(&self, data: impl Into<Bytes>) {
        self.shared.context.set_file_data_input(data.into());
    }

    /// Where decoded remote video is painted.
    pub fn set_video_output_widget(&self, widget: Option<&VideoWidget>) {
        self.shared
            .context
            .set_video_output_widget(widget.map(VideoWidget::context));
    }

    /// Where local capture preview is painted.
    pub fn set_video_preview_widget(&self, widget: Option<&VideoWidget>) {
        self.shared
            .context
            .set_video_preview_widget(widget.map(VideoWidget::context));
    }

    /// Sink receiving a recording of the session.
    pub fn set_recorder(&self, recorder: Option<Recorder>) {
        self.shared.context.set_recorder(recorder);
    }

    pub fn set_local_audio_preferences(&self, prefs: impl Into<LocalPreferences<AudioParams>>) {
        match prefs.into() {
            LocalPreferences::Payloads(info) => {
                let info: Vec<PPayloadInfo> = export_all(&info);
                self.shared.context.set_local_audio_payload_info(&info);
            }
            LocalPreferences::Params(params) => {
                let params: Vec<PAudioParams> = export_all(&params);
                self.shared.context.set_local_audio_params(&params);
            }
        }
    }

    pub fn set_local_video_preferences(&self, prefs: impl Into<LocalPreferences<VideoParams>>) {
        match prefs.into() {
            LocalPreferences::Payloads(info) => {
                let info: Vec<PPayloadInfo> = export_all(&info);
                self.shared.context.set_local_video_payload_info(&info);
            }
            LocalPreferences::Params(params) => {
                let params: Vec<PVideoParams> = export_all(&params);
                self.shared.context.set_local_video_params(&params);
            }
        }
    }

    pub fn set_remote_audio_preferences(&self, info: &[PayloadInfo]) {
        let info: Vec<PPayloadInfo> = export_all(info);
        self.shared.context.set_remote_audio_payload_info(&info);
    }

    pub fn set_remote_video_preferences(&self, info: &[PayloadInfo]) {
        let info: Vec<PPayloadInfo> = export_all(info);
        self.shared.context.set_remote_video_payload_info(&info);
    }

    /// Ask the provider to start. Completion is reported as
    /// [`SessionEvent::Started`] or [`SessionEvent::Error`].
    pub fn start(&self) {
        tracing::info!(state = ?self.state(), "rtp session start requested");
        self.shared.context.start();
    }

    /// Renegotiate after preferences changed while started.
    pub fn update_preferences(&self) {
        self.shared.context.update_preferences();
    }

    /// Begin sending audio using the negotiated params at `params_index`.
    pub fn transmit_audio(&self, params_index: usize) {
        self.shared.context.transmit_audio(params_index);
    }

    pub fn transmit_video(&self, params_index: usize) {
        self.shared.context.transmit_video(params_index);
    }

    pub fn pause_audio(&self) {
        self.shared.context.pause_audio();
    }

    pub fn pause_video(&self) {
        self.shared.context.pause_video();
    }

    /// Ask the provider to stop. Channels are unbound when it reports
    /// [`SessionEvent::Stopped`], not here.
    pub fn stop(&self) {
        tracing::info!(state = ?self.state(), "rtp session stop requested");
        self.shared.context.stop();
    }

    pub fn audio_payload_info(&self) -> Vec<PayloadInfo> {
        import_all(&self.shared.context.audio_payload_info())
    }

    pub fn video_payload_info(&self) -> Vec<PayloadInfo> {
        import_all(&self.shared.context.video_payload_info())
    }

    pub fn audio_params(&self) -> Vec<AudioParams> {
        import_all(&self.shared.context.audio_params())
    }

    pub fn video_params(&self) -> Vec<VideoParams> {
        import_all(&self.shared.context.video_params())
    }

    pub fn can_transmit_audio(&self) -> bool {
        self.shared.context.can_transmit_audio()
    }

    pub fn can_transmit_video(&self) -> bool {
        self.shared.context.can_transmit_video()
    }

    /// 0 (mute) to 100.
    pub fn output_volume(&self) -> i32 {
        self.shared.context.output_volume()
    }

    pub fn set_output_volume(&self, level: i32) {
        self.shared.context.set_output_volume(level);
    }

    pub fn input_volume(&self) -> i32 {
        self.shared.context.input_volume()
    }

    pub fn set_input_volume(&self, level: i32) {
        self.shared.context.set_input_volume(level);
    }

    pub fn error_code(&self) -> SessionError {
        self.shared.context.error_code().into()
    }

    pub fn audio_rtp_channel(&self) -> &RtpChannel {
        &self.shared.audio
    }

    pub fn video_rtp_channel(&self) -> &RtpChannel {
        &self.shared.video
    }
}

impl SessionShared {
    fn handle_event(&self, event: SessionContextEvent) {
        let _serial = self.dispatch.lock();

        let public = match event {
            SessionContextEvent::Started => {
                self.audio.set_context(self.context.audio_rtp_channel());
                self.video.set_context(self.context.video_rtp_channel());
                self.transition(SessionState::Started);
                SessionEvent::Started
            }
            SessionContextEvent::Stopped => {
                self.unbind_channels();
                self.transition(SessionState::Stopped);
                SessionEvent::Stopped
            }
            SessionContextEvent::Finished => {
                self.unbind_channels();
                self.transition(SessionState::Finished);
                SessionEvent::Finished
            }
            SessionContextEvent::Error => {
                self.unbind_channels();
                self.transition(SessionState::Error);
                tracing::warn!(code = ?self.context.error_code(), "rtp session error");
                SessionEvent::Error
            }
            SessionContextEvent::PreferencesUpdated => SessionEvent::PreferencesUpdated,
            SessionContextEvent::AudioInputIntensityChanged(level) => {
                SessionEvent::AudioInputIntensityChanged(level)
            }
        };

        self.listeners.emit(&public);
    }

    fn unbind_channels(&self) {
        self.audio.set_context(None);
        self.video.set_context(None);
    }

    fn transition(&self, next: SessionState) {
        let mut state = self.state.lock();
        tracing::debug!(old_state = ?*state, new_state = ?next, "rtp session state transition");
        *state = next;
    }
}

impl Drop for RtpSession {
    fn drop(&mut self) {
        self.shared.context.set_event_handler(None);
        self.shared.unbind_channels();
    }
}

impl std::fmt::Debug for RtpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtpSession")
            .field("state", &self.state())
            .field("audio", &self.shared.audio)
            .field("video", &self.shared.video)
            .finish()
    }
}
