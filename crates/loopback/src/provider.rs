use std::path::{Path, PathBuf};

use mediaplug::provider::{
    PAudioParams, PDevice, PDeviceKind, PSize, PVideoParams, Plugin, Provider, RtpSessionContext,
};

use crate::session::LoopbackSession;

/// Plugin entry for the loopback provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopbackPlugin;

impl Plugin for LoopbackPlugin {
    fn create_provider(&self) -> Option<Box<dyn Provider>> {
        Some(Box::new(LoopbackProvider::default()))
    }
}

/// A provider with no real devices: sessions hand written packets straight
/// back to the reader.
#[derive(Debug, Default)]
pub struct LoopbackProvider {
    resource_path: PathBuf,
}

impl LoopbackProvider {
    pub fn resource_path(&self) -> &Path {
        &self.resource_path
    }

    fn device(kind: PDeviceKind, id: &str, name: &str) -> PDevice {
        PDevice {
            kind,
            name: name.to_string(),
            id: id.to_string(),
        }
    }
}

impl Provider for LoopbackProvider {
    /// Fails only when a resource directory is named but does not exist.
    fn init(&mut self, resource_path: &Path) -> bool {
        if !resource_path.as_os_str().is_empty() && !resource_path.is_dir() {
            tracing::warn!(path = %resource_path.display(), "loopback resource directory missing");
            return false;
        }
        self.resource_path = resource_path.to_path_buf();
        tracing::debug!(path = %resource_path.display(), "loopback provider initialized");
        true
    }

    fn credit_name(&self) -> String {
        "mediaplug loopback".to_string()
    }

    fn credit_text(&self) -> String {
        format!(
            "mediaplug loopback provider {}: RTP written to a channel is read back from it.",
            env!("CARGO_PKG_VERSION")
        )
    }

    fn audio_output_devices(&self) -> Vec<PDevice> {
        vec![Self::device(PDeviceKind::AudioOut, "loopback:out", "Loopback Output")]
    }

    fn audio_input_devices(&self) -> Vec<PDevice> {
        vec![Self::device(PDeviceKind::AudioIn, "loopback:in", "Loopback Input")]
    }

    fn video_input_devices(&self) -> Vec<PDevice> {
        vec![Self::device(PDeviceKind::VideoIn, "loopback:camera", "Loopback Camera")]
    }

    fn supported_audio_modes(&self) -> Vec<PAudioParams> {
        [("pcmu", 8000), ("pcma", 8000), ("speex", 16000)]
            .into_iter()
            .map(|(codec, sample_rate)| PAudioParams {
                codec: codec.to_string(),
                sample_rate,
                sample_size: 16,
                channels: 1,
            })
            .collect()
    }

    fn supported_video_modes(&self) -> Vec<PVideoParams> {
        [(320, 240), (640, 480)]
            .into_iter()
            .map(|(width, height)| PVideoParams {
                codec: "theora".to_string(),
                size: PSize { width, height },
                fps: 30,
            })
            .collect()
    }

    fn create_rtp_session(&self) -> Box<dyn RtpSessionContext> {
        Box::new(LoopbackSession::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_checks_resource_directory() {
        let mut provider = LoopbackProvider::default();
        assert!(provider.init(Path::new("")));
        assert!(provider.init(&std::env::temp_dir()));
        assert_eq!(provider.resource_path(), std::env::temp_dir());
        assert!(!provider.init(Path::new("/nonexistent/mediaplug-resources")));
    }

    #[test]
    fn reports_one_device_per_kind() {
        let provider = LoopbackProvider::default();
        assert_eq!(provider.audio_input_devices()[0].kind, PDeviceKind::AudioIn);
        assert_eq!(provider.audio_output_devices()[0].kind, PDeviceKind::AudioOut);
        assert_eq!(provider.video_input_devices()[0].kind, PDeviceKind::VideoIn);
        assert_eq!(provider.supported_audio_modes()[0].codec, "pcmu");
        assert_eq!(provider.supported_video_modes().len(), 2);
    }

    #[test]
    fn plugin_always_creates_provider() {
        assert!(LoopbackPlugin.create_provider().is_some());
    }
}
