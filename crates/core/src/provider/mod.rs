//! The provider contract.
//!
//! A provider is the swappable backend that does the real work: device I/O,
//! encoding, packetization, RTP transport. This module defines everything a
//! provider implements and everything that crosses the boundary between it and
//! the media layer:
//!
//! - [`Provider`]: the root object, created by a [`Plugin`].
//! - [`RtpSessionContext`]: one negotiated audio/video RTP session.
//! - [`RtpChannelContext`]: the packet pump of one medium inside a session.
//! - [`VideoWidgetContext`]: a rendering sink the provider paints frames into.
//! - [`ProducerContext`] / [`ReceiverContext`]: split send/receive pipelines.
//!
//! Values cross the boundary in the `P`-prefixed representations below, never
//! in the public types of [`crate::types`].
//!
//! ## Notifications
//!
//! Contexts report asynchronous progress through the handler installed with
//! `set_event_handler`. Handlers are invoked from the provider's own execution
//! context, one at a time per context. Context methods must not invoke the
//! handler synchronously from inside a call made by the media layer.

pub mod plugin;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use image::RgbaImage;

pub use plugin::{
    PLUGIN_DECLARATION_SYMBOL, PROVIDER_INTERFACE_VERSION, Plugin, PluginDeclaration,
    RUSTC_VERSION,
};

/// Provider-side device kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PDeviceKind {
    AudioIn,
    AudioOut,
    VideoIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PDevice {
    pub kind: PDeviceKind,
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PAudioParams {
    pub codec: String,
    pub sample_rate: i32,
    pub sample_size: i32,
    pub channels: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PVideoParams {
    pub codec: String,
    pub size: PSize,
    pub fps: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PPayloadParameter {
    pub name: String,
    pub value: String,
}

/// Provider-side payload descriptor. Parameter order is significant here; the
/// public type compares parameters as a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PPayloadInfo {
    pub id: i32,
    pub name: String,
    pub clockrate: i32,
    pub channels: i32,
    pub ptime: i32,
    pub maxptime: i32,
    pub parameters: Vec<PPayloadParameter>,
}

/// An RTP packet as exchanged with the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PRtpPacket {
    pub raw_value: Bytes,
    /// Offset of the RTP header inside `raw_value`.
    pub port_offset: usize,
}

/// Error code reported by a session, producer or receiver context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PSessionError {
    #[default]
    Generic,
    System,
    Codec,
}

/// Notifications from an [`RtpSessionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionContextEvent {
    Started,
    PreferencesUpdated,
    /// Input level in the range 0..=100.
    AudioInputIntensityChanged(i32),
    Stopped,
    /// File-backed input reached its end.
    Finished,
    Error,
}

/// Notifications from an [`RtpChannelContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelContextEvent {
    /// One or more packets are waiting to be read.
    ReadyRead,
    /// This many packets were handed to the transport.
    PacketsWritten(usize),
    /// The context is being torn down; it must not be used again.
    Closed,
}

/// Notifications from a [`ProducerContext`] or [`ReceiverContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    Started,
    Stopped,
    Finished,
    Error,
}

pub type SessionEventHandler = Arc<dyn Fn(SessionContextEvent) + Send + Sync>;
pub type ChannelEventHandler = Arc<dyn Fn(ChannelContextEvent) + Send + Sync>;
pub type PipelineEventHandler = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Recording sink handed to the provider; receives the session's media.
pub type Recorder = Box<dyn Write + Send>;

/// Root object of a media backend.
///
/// Created by a [`Plugin`] and initialized exactly once before any other call.
pub trait Provider: Send + Sync {
    /// Prepare the backend. `resource_path` may be empty (static discovery).
    /// Returns `false` if the backend is unusable.
    fn init(&mut self, resource_path: &Path) -> bool;

    fn credit_name(&self) -> String;
    fn credit_text(&self) -> String;

    fn audio_output_devices(&self) -> Vec<PDevice>;
    fn audio_input_devices(&self) -> Vec<PDevice>;
    fn video_input_devices(&self) -> Vec<PDevice>;
    fn supported_audio_modes(&self) -> Vec<PAudioParams>;
    fn supported_video_modes(&self) -> Vec<PVideoParams>;

    fn create_rtp_session(&self) -> Box<dyn RtpSessionContext>;

    fn create_producer(&self) -> Option<Box<dyn ProducerContext>> {
        None
    }

    fn create_receiver(&self) -> Option<Box<dyn ReceiverContext>> {
        None
    }
}

/// The packet pump of one medium (audio or video) within a session.
pub trait RtpChannelContext: Send + Sync {
    /// Start or stop moving packets.
    fn set_enabled(&self, enabled: bool);

    fn packets_available(&self) -> usize;

    /// Take the next received packet, if any.
    fn read(&self) -> Option<PRtpPacket>;

    fn write(&self, packet: &PRtpPacket);

    /// Install (or with `None`, remove) the notification handler.
    fn set_event_handler(&self, handler: Option<ChannelEventHandler>);
}

/// Rendering sink the provider paints decoded frames into.
///
/// `show_frame` is called from the provider's context; the sink handles any
/// handoff to a UI thread itself.
pub trait VideoWidgetContext: Send + Sync {
    /// Size the sink would like frames to be delivered at.
    fn desired_size(&self) -> PSize;

    fn show_frame(&self, frame: RgbaImage);
}

/// One bidirectional RTP session driven by the provider.
pub trait RtpSessionContext: Send + Sync {
    fn set_audio_output_device(&self, device_id: &str);
    fn set_audio_input_device(&self, device_id: &str);
    fn set_video_input_device(&self, device_id: &str);
    fn set_file_input(&self, file_name: &Path);
    fn set_file_data_input(&self, data: Bytes);
    fn set_video_output_widget(&self, widget: Option<Arc<dyn VideoWidgetContext>>);
    fn set_video_preview_widget(&self, widget: Option<Arc<dyn VideoWidgetContext>>);
    fn set_recorder(&self, recorder: Option<Recorder>);

    fn set_local_audio_params(&self, params: &[PAudioParams]);
    fn set_local_audio_payload_info(&self, info: &[PPayloadInfo]);
    fn set_local_video_params(&self, params: &[PVideoParams]);
    fn set_local_video_payload_info(&self, info: &[PPayloadInfo]);
    fn set_remote_audio_payload_info(&self, info: &[PPayloadInfo]);
    fn set_remote_video_payload_info(&self, info: &[PPayloadInfo]);

    fn start(&self);
    fn update_preferences(&self);
    fn transmit_audio(&self, params_index: usize);
    fn transmit_video(&self, params_index: usize);
    fn pause_audio(&self);
    fn pause_video(&self);
    fn stop(&self);

    fn audio_payload_info(&self) -> Vec<PPayloadInfo>;
    fn video_payload_info(&self) -> Vec<PPayloadInfo>;
    fn audio_params(&self) -> Vec<PAudioParams>;
    fn video_params(&self) -> Vec<PVideoParams>;

    fn can_transmit_audio(&self) -> bool;
    fn can_transmit_video(&self) -> bool;

    /// 0 (mute) to 100.
    fn output_volume(&self) -> i32;
    fn set_output_volume(&self, level: i32);
    fn input_volume(&self) -> i32;
    fn set_input_volume(&self, level: i32);

    fn error_code(&self) -> PSessionError;

    /// Channel contexts of the current run; valid once `Started` was reported.
    fn audio_rtp_channel(&self) -> Option<Arc<dyn RtpChannelContext>>;
    fn video_rtp_channel(&self) -> Option<Arc<dyn RtpChannelContext>>;

    fn set_event_handler(&self, handler: Option<SessionEventHandler>);
}

/// Send-only pipeline: capture, encode, packetize.
pub trait ProducerContext: Send + Sync {
    fn set_audio_input_device(&self, device_id: &str);
    fn set_video_input_device(&self, device_id: &str);
    fn set_file_input(&self, file_name: &Path);
    fn set_file_data_input(&self, data: Bytes);
    fn set_video_widget(&self, widget: Option<Arc<dyn VideoWidgetContext>>);

    fn set_audio_payload_info(&self, info: &[PPayloadInfo]);
    fn set_video_payload_info(&self, info: &[PPayloadInfo]);
    fn set_audio_params(&self, params: &[PAudioParams]);
    fn set_video_params(&self, params: &[PVideoParams]);

    fn start(&self);
    fn transmit_audio(&self, params_index: usize);
    fn transmit_video(&self, params_index: usize);
    fn pause_audio(&self);
    fn pause_video(&self);
    fn stop(&self);

    fn audio_payload_info(&self) -> Vec<PPayloadInfo>;
    fn video_payload_info(&self) -> Vec<PPayloadInfo>;
    fn audio_params(&self) -> Vec<PAudioParams>;
    fn video_params(&self) -> Vec<PVideoParams>;

    fn volume(&self) -> i32;
    fn set_volume(&self, level: i32);
    fn error_code(&self) -> PSessionError;

    fn audio_rtp_channel(&self) -> Option<Arc<dyn RtpChannelContext>>;
    fn video_rtp_channel(&self) -> Option<Arc<dyn RtpChannelContext>>;

    fn set_event_handler(&self, handler: Option<PipelineEventHandler>);
}

/// Receive-only pipeline: depacketize, decode, play out.
pub trait ReceiverContext: Send + Sync {
    fn set_audio_output_device(&self, device_id: &str);
    fn set_video_widget(&self, widget: Option<Arc<dyn VideoWidgetContext>>);
    fn set_recorder(&self, recorder: Option<Recorder>);

    fn set_audio_payload_info(&self, info: &[PPayloadInfo]);
    fn set_video_payload_info(&self, info: &[PPayloadInfo]);
    fn set_audio_params(&self, params: &[PAudioParams]);
    fn set_video_params(&self, params: &[PVideoParams]);

    fn start(&self);
    fn stop(&self);

    fn audio_payload_info(&self) -> Vec<PPayloadInfo>;
    fn video_payload_info(&self) -> Vec<PPayloadInfo>;
    fn audio_params(&self) -> Vec<PAudioParams>;
    fn video_params(&self) -> Vec<PVideoParams>;

    fn volume(&self) -> i32;
    fn set_volume(&self, level: i32);
    fn error_code(&self) -> PSessionError;

    fn audio_rtp_channel(&self) -> Option<Arc<dyn RtpChannelContext>>;
    fn video_rtp_channel(&self) -> Option<Arc<dyn RtpChannelContext>>;

    fn set_event_handler(&self, handler: Option<PipelineEventHandler>);
}
