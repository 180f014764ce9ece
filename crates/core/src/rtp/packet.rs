use bytes::Bytes;

/// An RTP packet as seen by callers: an immutable, shared byte buffer plus the
/// offset of the RTP header within it.
///
/// Some backends prepend their own framing before the RTP header; `port_offset`
/// tells the reader where RTP begins. The layer never parses the bytes.
///
/// Cloning shares the buffer. Equality compares content, not identity.
/// `RtpPacket::null()` (also the `Default`) is the "no packet" sentinel returned
/// by reads on an unbound or empty channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtpPacket {
    data: Option<Bytes>,
    port_offset: usize,
}

impl RtpPacket {
    pub fn new(raw_value: impl Into<Bytes>, port_offset: usize) -> Self {
        Self {
            data: Some(raw_value.into()),
            port_offset,
        }
    }

    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    /// The whole buffer, including any framing before `port_offset`.
    /// Empty for the null packet.
    pub fn raw_value(&self) -> Bytes {
        self.data.clone().unwrap_or_default()
    }

    pub fn port_offset(&self) -> usize {
        self.port_offset
    }

    /// The bytes from the RTP header onward. Empty if the offset lies past the
    /// end of the buffer.
    pub fn rtp_bytes(&self) -> &[u8] {
        match &self.data {
            Some(data) => data.get(self.port_offset..).unwrap_or(&[]),
            None => &[],
        }
    }
}
