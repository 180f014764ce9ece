//! Loopback media provider for `mediaplug`.
//!
//! Every RTP packet written to a channel while its transport is enabled comes
//! back out of the same channel. Useful for exercising the media layer without
//! real devices, as a template for real providers, and as a dynamic plugin:
//! built as a `cdylib` it exports the plugin declaration, so
//! `mediaplug::registry::load_plugin("libmediaplug_loopback.so", "")` works.

mod channel;
mod dispatch;
mod negotiate;
mod packetizer;
mod provider;
mod session;

pub use provider::{LoopbackPlugin, LoopbackProvider};

mediaplug::declare_plugin!(LoopbackPlugin);

/// Add the loopback plugin to the static discovery list.
pub fn register_static() {
    mediaplug::registry::register_static_plugin(LoopbackPlugin);
}
