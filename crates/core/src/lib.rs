pub mod config;
pub mod error;
pub mod features;
mod listeners;
mod marshal;
pub mod provider;
pub mod registry;
pub mod rtp;
pub mod types;
pub mod video;

#[cfg(test)]
mod testing;

pub use config::LoaderConfig;
pub use error::{MediaError, PluginError, Result};
pub use features::{Capabilities, Features};
pub use listeners::Subscription;
pub use registry::{PluginResult, ProviderHandle, ProviderOrigin};
pub use rtp::{
    LocalPreferences, RtpChannel, RtpPacket, RtpSession, SessionError, SessionEvent, SessionState,
};
pub use types::{AudioParams, Device, DeviceKind, PayloadInfo, PayloadParameter, Size, VideoParams};
pub use video::{RenderedFrame, VideoWidget};
