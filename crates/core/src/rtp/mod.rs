//! RTP session surface: sessions, their per-medium channels, and packets.

mod channel;
mod packet;
mod session;

pub use channel::RtpChannel;
pub use packet::RtpPacket;
pub use session::{LocalPreferences, RtpSession, SessionError, SessionEvent, SessionState};
