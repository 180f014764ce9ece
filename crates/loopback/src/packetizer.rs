//! RTP framing for media the loopback provider sends on its own.

/// RTP fixed header state (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Version is always 2; padding, extension and CSRC count are always 0.
#[derive(Debug)]
pub(crate) struct RtpHeader {
    pt: u8,
    ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpHeader {
    pub(crate) fn new(pt: u8, ssrc: u32) -> Self {
        Self {
            pt: pt & 0x7f,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Random SSRC, as RFC 3550 §8.1 asks of independent senders.
    pub(crate) fn with_random_ssrc(pt: u8) -> Self {
        Self::new(pt, rand::random::<u32>())
    }

    pub(crate) fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Serialize the header and advance the sequence number.
    pub(crate) fn write(&mut self, marker: bool) -> [u8; 12] {
        let mut header = [0u8; 12];
        header[0] = 2 << 6;
        header[1] = ((marker as u8) << 7) | self.pt;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        header
    }

    pub(crate) fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(increment);
    }
}

/// Split `media` into RTP packets carrying at most `chunk` payload bytes each.
///
/// Every packet advances the timestamp by `ticks_per_packet`; the marker bit
/// is set on the last one. Empty input yields no packets.
pub(crate) fn packetize(
    header: &mut RtpHeader,
    media: &[u8],
    chunk: usize,
    ticks_per_packet: u32,
) -> Vec<Vec<u8>> {
    let chunk = chunk.max(1);
    let count = media.len().div_ceil(chunk);
    media
        .chunks(chunk)
        .enumerate()
        .map(|(i, payload)| {
            let mut packet = Vec::with_capacity(12 + payload.len());
            packet.extend_from_slice(&header.write(i + 1 == count));
            packet.extend_from_slice(payload);
            header.advance_timestamp(ticks_per_packet);
            packet
        })
        .collect()
}
