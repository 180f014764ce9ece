//! Payload negotiation between local preferences and a remote offer.

use mediaplug::provider::{PAudioParams, PPayloadInfo, PPayloadParameter, PVideoParams};

/// First dynamic payload type (RFC 3551 §3).
const DYNAMIC_PT_BASE: i32 = 96;

const AUDIO_PTIME: i32 = 20;

/// Local payloads that the remote also offers, with the remote's payload id.
///
/// Matching is on encoding name (ASCII case-insensitive) and clock rate. With
/// no remote offer, the local list stands as is.
pub(crate) fn intersect(local: &[PPayloadInfo], remote: &[PPayloadInfo]) -> Vec<PPayloadInfo> {
    if remote.is_empty() {
        return local.to_vec();
    }
    local
        .iter()
        .filter_map(|ours| {
            remote
                .iter()
                .find(|theirs| {
                    theirs.name.eq_ignore_ascii_case(&ours.name) && theirs.clockrate == ours.clockrate
                })
                .map(|theirs| PPayloadInfo {
                    id: theirs.id,
                    ..ours.clone()
                })
        })
        .collect()
}

/// Payload types for raw audio parameters. PCMU and PCMA keep their static
/// ids; everything else gets a dynamic one.
pub(crate) fn audio_payloads(params: &[PAudioParams]) -> Vec<PPayloadInfo> {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let (id, name) = match p.codec.to_ascii_lowercase().as_str() {
                "pcmu" => (0, "PCMU".to_string()),
                "pcma" => (8, "PCMA".to_string()),
                _ => (DYNAMIC_PT_BASE + i as i32, p.codec.clone()),
            };
            PPayloadInfo {
                id,
                name,
                clockrate: p.sample_rate,
                channels: p.channels,
                ptime: AUDIO_PTIME,
                maxptime: -1,
                parameters: Vec::new(),
            }
        })
        .collect()
}

/// Dynamic payload types for raw video parameters, 90 kHz clock, with the
/// frame size carried as parameters.
pub(crate) fn video_payloads(params: &[PVideoParams]) -> Vec<PPayloadInfo> {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| PPayloadInfo {
            id: DYNAMIC_PT_BASE + i as i32,
            name: p.codec.to_ascii_uppercase(),
            clockrate: 90000,
            channels: -1,
            ptime: -1,
            maxptime: -1,
            parameters: vec![
                PPayloadParameter {
                    name: "width".to_string(),
                    value: p.size.width.to_string(),
                },
                PPayloadParameter {
                    name: "height".to_string(),
                    value: p.size.height.to_string(),
                },
            ],
        })
        .collect()
}

/// Raw parameters implied by negotiated audio payloads.
pub(crate) fn audio_params(payloads: &[PPayloadInfo]) -> Vec<PAudioParams> {
    payloads
        .iter()
        .map(|p| PAudioParams {
            codec: p.name.to_ascii_lowercase(),
            sample_rate: p.clockrate,
            sample_size: 16,
            channels: if p.channels > 0 { p.channels } else { 1 },
        })
        .collect()
}
