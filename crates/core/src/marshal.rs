//! Conversions between the public value types and the provider's `P` types.
//!
//! All conversions are total and purely structural: nothing is validated here.
//! The provider decides what it accepts and reports problems through the
//! session's error notification.

use crate::provider::{
    PAudioParams, PDevice, PDeviceKind, PPayloadInfo, PPayloadParameter, PRtpPacket,
    PSessionError, PSize, PVideoParams,
};
use crate::rtp::{RtpPacket, SessionError};
use crate::types::{
    AudioParams, Device, DeviceKind, PayloadInfo, PayloadParameter, Size, VideoParams,
};

/// Convert every element of a provider list into its public form.
pub(crate) fn import_all<'a, P: 'a, T: From<&'a P>>(items: &'a [P]) -> Vec<T> {
    items.iter().map(T::from).collect()
}

/// Convert every element of a public list into its provider form.
pub(crate) fn export_all<'a, T: 'a, P: From<&'a T>>(items: &'a [T]) -> Vec<P> {
    items.iter().map(P::from).collect()
}

impl From<&PSize> for Size {
    fn from(s: &PSize) -> Self {
        Size::new(s.width, s.height)
    }
}

impl From<&Size> for PSize {
    fn from(s: &Size) -> Self {
        PSize {
            width: s.width,
            height: s.height,
        }
    }
}

impl From<&PAudioParams> for AudioParams {
    fn from(pp: &PAudioParams) -> Self {
        AudioParams {
            codec: pp.codec.clone(),
            sample_rate: pp.sample_rate,
            sample_size: pp.sample_size,
            channels: pp.channels,
        }
    }
}

impl From<&AudioParams> for PAudioParams {
    fn from(p: &AudioParams) -> Self {
        PAudioParams {
            codec: p.codec.clone(),
            sample_rate: p.sample_rate,
            sample_size: p.sample_size,
            channels: p.channels,
        }
    }
}

impl From<&PVideoParams> for VideoParams {
    fn from(pp: &PVideoParams) -> Self {
        VideoParams {
            codec: pp.codec.clone(),
            size: Size::from(&pp.size),
            fps: pp.fps,
        }
    }
}

impl From<&VideoParams> for PVideoParams {
    fn from(p: &VideoParams) -> Self {
        PVideoParams {
            codec: p.codec.clone(),
            size: PSize::from(&p.size),
            fps: p.fps,
        }
    }
}

impl From<&PPayloadParameter> for PayloadParameter {
    fn from(pp: &PPayloadParameter) -> Self {
        PayloadParameter {
            name: pp.name.clone(),
            value: pp.value.clone(),
        }
    }
}

impl From<&PayloadParameter> for PPayloadParameter {
    fn from(p: &PayloadParameter) -> Self {
        PPayloadParameter {
            name: p.name.clone(),
            value: p.value.clone(),
        }
    }
}

impl From<&PPayloadInfo> for PayloadInfo {
    fn from(pp: &PPayloadInfo) -> Self {
        PayloadInfo {
            id: pp.id,
            name: pp.name.clone(),
            clockrate: pp.clockrate,
            channels: pp.channels,
            ptime: pp.ptime,
            maxptime: pp.maxptime,
            parameters: import_all(&pp.parameters),
        }
    }
}

impl From<&PayloadInfo> for PPayloadInfo {
    fn from(p: &PayloadInfo) -> Self {
        PPayloadInfo {
            id: p.id,
            name: p.name.clone(),
            clockrate: p.clockrate,
            channels: p.channels,
            ptime: p.ptime,
            maxptime: p.maxptime,
            parameters: export_all(&p.parameters),
        }
    }
}

impl From<PDeviceKind> for DeviceKind {
    fn from(kind: PDeviceKind) -> Self {
        match kind {
            PDeviceKind::AudioIn => DeviceKind::AudioIn,
            PDeviceKind::AudioOut => DeviceKind::AudioOut,
            PDeviceKind::VideoIn => DeviceKind::VideoIn,
        }
    }
}

impl From<&PDevice> for Device {
    fn from(pd: &PDevice) -> Self {
        Device::new(pd.kind.into(), &pd.id, &pd.name)
    }
}

impl From<&PRtpPacket> for RtpPacket {
    fn from(pp: &PRtpPacket) -> Self {
        RtpPacket::new(pp.raw_value.clone(), pp.port_offset)
    }
}

impl From<&RtpPacket> for PRtpPacket {
    fn from(p: &RtpPacket) -> Self {
        PRtpPacket {
            raw_value: p.raw_value(),
            port_offset: p.port_offset(),
        }
    }
}

impl From<PSessionError> for SessionError {
    fn from(e: PSessionError) -> Self {
        match e {
            PSessionError::Generic => SessionError::Generic,
            PSessionError::System => SessionError::System,
            PSessionError::Codec => SessionError::Codec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speex_payload() -> PayloadInfo {
        let mut p = PayloadInfo::new(97, "speex", 16000, 1)
            .with_parameter("vbr", "on")
            .with_parameter("mode", "any");
        p.ptime = 20;
        p.maxptime = 60;
        p
    }

    #[test]
    fn audio_params_round_trip() {
        let p = AudioParams::new("speex", 16000, 16, 1);
        let exported = PAudioParams::from(&p);
        assert_eq!(exported.sample_rate, 16000);
        assert_eq!(AudioParams::from(&exported), p);
    }

    #[test]
    fn video_params_round_trip() {
        let p = VideoParams::new("theora", Size::new(320, 240), 30);
        let exported = PVideoParams::from(&p);
        assert_eq!(exported.size, PSize { width: 320, height: 240 });
        assert_eq!(VideoParams::from(&exported), p);
    }

    #[test]
    fn payload_round_trip_preserves_parameter_order() {
        let p = speex_payload();
        let exported = PPayloadInfo::from(&p);
        let names: Vec<&str> = exported.parameters.iter().map(|x| x.name.as_str()).collect();
        assert_eq!(names, ["vbr", "mode"]);

        let back = PayloadInfo::from(&exported);
        assert_eq!(back, p);
        assert_eq!(back.parameters, p.parameters);
        assert_eq!(PPayloadInfo::from(&back), exported);
    }

    #[test]
    fn null_payload_survives_export() {
        let exported = PPayloadInfo::from(&PayloadInfo::default());
        assert_eq!(exported.id, -1);
        assert!(PayloadInfo::from(&exported).is_null());
    }

    #[test]
    fn no_validation_is_applied() {
        let odd = AudioParams::new("", -5, 0, 999);
        assert_eq!(AudioParams::from(&PAudioParams::from(&odd)), odd);
    }

    #[test]
    fn device_import() {
        let pd = PDevice {
            kind: PDeviceKind::AudioOut,
            name: "Speakers".to_string(),
            id: "hw:0".to_string(),
        };
        let d = Device::from(&pd);
        assert_eq!(d.kind(), DeviceKind::AudioOut);
        assert_eq!(d.id(), "hw:0");
        assert_eq!(d.name(), "Speakers");
    }

    #[test]
    fn packet_round_trip() {
        let p = RtpPacket::new(vec![0, 0, 0x80, 0x60], 2);
        let exported = PRtpPacket::from(&p);
        assert_eq!(exported.port_offset, 2);
        assert_eq!(RtpPacket::from(&exported), p);
    }

    #[test]
    fn list_helpers() {
        let list = vec![speex_payload(), PayloadInfo::new(0, "PCMU", 8000, 1)];
        let exported: Vec<PPayloadInfo> = export_all(&list);
        let imported: Vec<PayloadInfo> = import_all(&exported);
        assert_eq!(imported, list);
    }
}
