use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::listeners::{Listeners, Subscription};
use crate::provider::{ChannelContextEvent, PRtpPacket, RtpChannelContext};
use crate::rtp::RtpPacket;

/// Caller-facing packet pump for one medium of an [`RtpSession`](crate::rtp::RtpSession).
///
/// The channel owns no transport. While its session is started it is bound to
/// the provider's channel context for the current run; otherwise it is
/// unbound and every operation is a harmless no-op:
///
/// | Operation | Unbound | Bound |
/// |-----------|---------|-------|
/// | [`packets_available`](Self::packets_available) | `0` | delegated |
/// | [`read`](Self::read) | null packet | delegated |
/// | [`write`](Self::write) | dropped | enables transport, then delegated |
///
/// ## Demand activation
///
/// The provider is only asked to move packets while someone cares. Each
/// [`on_ready_read`](Self::on_ready_read) subscription is one unit of interest:
/// the first one enables the transport and releasing the last one disables it.
/// A write on a bound channel also enables the transport; that stays on until
/// interest next drops to zero or the channel is rebound.
pub struct RtpChannel {
    shared: Arc<ChannelShared>,
}

struct ChannelShared {
    label: &'static str,
    state: Mutex<ChannelState>,
    ready_read: Listeners<()>,
    packets_written: Listeners<usize>,
}

#[derive(Default)]
struct ChannelState {
    context: Option<Weak<dyn RtpChannelContext>>,
    /// Bumped on every rebind; events tagged with an older value are stale.
    generation: u64,
    enabled: bool,
    interest: usize,
}

impl ChannelState {
    /// The live bound context. A context that has been dropped behind our back
    /// is treated as an explicit detach.
    fn bound(&mut self, label: &'static str) -> Option<Arc<dyn RtpChannelContext>> {
        let context = self.context.as_ref()?.upgrade();
        if context.is_none() {
            tracing::debug!(channel = label, "channel context vanished, unbinding");
            self.detach();
        }
        context
    }

    fn detach(&mut self) {
        self.context = None;
        self.enabled = false;
        self.generation += 1;
    }

    fn enable(&mut self, context: &Arc<dyn RtpChannelContext>, label: &'static str) {
        self.enabled = true;
        context.set_enabled(true);
        tracing::debug!(channel = label, "transport enabled");
    }
}

impl RtpChannel {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            shared: Arc::new(ChannelShared {
                label,
                state: Mutex::new(ChannelState::default()),
                ready_read: Listeners::new(),
                packets_written: Listeners::new(),
            }),
        }
    }

    /// Packets waiting to be read; 0 while unbound.
    pub fn packets_available(&self) -> usize {
        let mut state = self.shared.state.lock();
        match state.bound(self.shared.label) {
            Some(context) => context.packets_available(),
            None => 0,
        }
    }

    /// Take the next received packet, or the null packet if unbound or empty.
    pub fn read(&self) -> RtpPacket {
        let mut state = self.shared.state.lock();
        let Some(context) = state.bound(self.shared.label) else {
            return RtpPacket::null();
        };
        match context.read() {
            Some(packet) => RtpPacket::from(&packet),
            None => RtpPacket::null(),
        }
    }

    /// Send a packet. Silently dropped while unbound or for the null packet.
    pub fn write(&self, packet: &RtpPacket) {
        if packet.is_null() {
            return;
        }
        let mut state = self.shared.state.lock();
        let Some(context) = state.bound(self.shared.label) else {
            tracing::trace!(channel = self.shared.label, "write on unbound channel dropped");
            return;
        };
        if !state.enabled {
            state.enable(&context, self.shared.label);
        }
        context.write(&PRtpPacket::from(packet));
    }

    /// Be notified when packets are ready to read.
    ///
    /// The returned guard holds one unit of listener interest; see the type
    /// docs. Callbacks run on the provider's execution context.
    pub fn on_ready_read(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.shared.ready_read.add(move |_| callback());
        {
            let mut state = self.shared.state.lock();
            state.interest += 1;
            if state.interest == 1 && !state.enabled {
                if let Some(context) = state.bound(self.shared.label) {
                    state.enable(&context, self.shared.label);
                }
            }
        }

        let weak = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.release_interest(id);
            }
        })
    }

    /// Be notified when the provider reports packets handed to the transport.
    /// Does not count as listener interest.
    pub fn on_packets_written(
        &self,
        callback: impl Fn(usize) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.shared.packets_written.add(move |count| callback(*count));
        let weak = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.packets_written.remove(id);
            }
        })
    }

    /// Whether a provider context is currently bound.
    pub fn is_bound(&self) -> bool {
        let mut state = self.shared.state.lock();
        state.bound(self.shared.label).is_some()
    }

    /// Whether the bound transport has been told to move packets.
    pub fn is_enabled(&self) -> bool {
        self.shared.state.lock().enabled
    }

    /// Number of outstanding [`on_ready_read`](Self::on_ready_read) subscriptions.
    pub fn listener_count(&self) -> usize {
        self.shared.state.lock().interest
    }

    /// Rebind to `context` (or unbind with `None`).
    ///
    /// The old context loses its event handler and the enabled flag is
    /// cleared; a new context is enabled at once if interest is outstanding.
    /// Runs under the state lock, so a concurrent read or write sees either
    /// the old binding or the new one.
    pub(crate) fn set_context(&self, context: Option<Arc<dyn RtpChannelContext>>) {
        let label = self.shared.label;
        let mut state = self.shared.state.lock();

        if let Some(old) = state.context.take() {
            if let Some(old) = old.upgrade() {
                old.set_event_handler(None);
            }
            state.detach();
            tracing::debug!(channel = label, "channel unbound");
        }

        let Some(context) = context else {
            return;
        };

        state.generation += 1;
        let generation = state.generation;
        state.context = Some(Arc::downgrade(&context));

        let weak = Arc::downgrade(&self.shared);
        context.set_event_handler(Some(Arc::new(move |event: ChannelContextEvent| {
            if let Some(shared) = weak.upgrade() {
                shared.on_context_event(generation, event);
            }
        })));
        tracing::debug!(channel = label, interest = state.interest, "channel bound");

        if state.interest > 0 {
            state.enable(&context, label);
        }
    }
}

impl ChannelShared {
    fn release_interest(&self, id: u64) {
        if !self.ready_read.remove(id) {
            return;
        }
        let mut state = self.state.lock();
        state.interest = state.interest.saturating_sub(1);
        if state.interest == 0 {
            if let Some(context) = state.bound(self.label) {
                state.enabled = false;
                context.set_enabled(false);
                tracing::debug!(channel = self.label, "transport disabled, no listeners");
            }
        }
    }

    fn on_context_event(&self, generation: u64, event: ChannelContextEvent) {
        {
            let mut state = self.state.lock();
            if state.generation != generation || state.context.is_none() {
                return;
            }
            if event == ChannelContextEvent::Closed {
                tracing::debug!(channel = self.label, "channel context closed");
                state.detach();
                return;
            }
        }

        match event {
            ChannelContextEvent::ReadyRead => self.ready_read.emit(&()),
            ChannelContextEvent::PacketsWritten(count) => {
                tracing::trace!(channel = self.label, count, "packets written");
                self.packets_written.emit(&count);
            }
            ChannelContextEvent::Closed => {}
        }
    }
}

impl Drop for RtpChannel {
    fn drop(&mut self) {
        self.set_context(None);
    }
}

impl std::fmt::Debug for RtpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("RtpChannel")
            .field("label", &self.shared.label)
            .field("bound", &state.context.is_some())
            .field("enabled", &state.enabled)
            .field("interest", &state.interest)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChannel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bound_channel() -> (RtpChannel, Arc<MockChannel>) {
        let channel = RtpChannel::new("audio");
        let context = MockChannel::new();
        channel.set_context(Some(context.clone()));
        (channel, context)
    }

    #[test]
    fn unbound_channel_returns_sentinels() {
        let channel = RtpChannel::new("audio");
        assert_eq!(channel.packets_available(), 0);
        assert!(channel.read().is_null());
        channel.write(&RtpPacket::new(vec![1, 2, 3], 0));
        assert!(!channel.is_bound());
        assert!(!channel.is_enabled());
    }

    #[test]
    fn bound_channel_delegates_reads() {
        let (channel, context) = bound_channel();
        context.push_incoming(vec![0x80, 0x00, 0x00, 0x01], 0);
        assert_eq!(channel.packets_available(), 1);

        let packet = channel.read();
        assert_eq!(packet.raw_value().as_ref(), &[0x80, 0x00, 0x00, 0x01]);
        assert!(channel.read().is_null());
    }

    #[test]
    fn reads_do_not_enable_transport() {
        let (channel, context) = bound_channel();
        let _ = channel.packets_available();
        let _ = channel.read();
        assert!(!channel.is_enabled());
        assert!(context.enable_calls().is_empty());
    }

    #[test]
    fn first_listener_enables_last_disables() {
        let (channel, context) = bound_channel();

        let a = channel.on_ready_read(|| {});
        let b = channel.on_ready_read(|| {});
        assert!(channel.is_enabled());
        assert_eq!(context.enable_calls(), vec![true]);
        assert_eq!(channel.listener_count(), 2);

        drop(a);
        assert!(channel.is_enabled());
        b.unsubscribe();
        assert!(!channel.is_enabled());
        assert_eq!(context.enable_calls(), vec![true, false]);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn first_write_enables_once() {
        let (channel, context) = bound_channel();
        channel.write(&RtpPacket::new(vec![1], 0));
        channel.write(&RtpPacket::new(vec![2], 0));

        assert!(channel.is_enabled());
        assert_eq!(context.enable_calls(), vec![true]);
        assert_eq!(context.written().len(), 2);
    }

    #[test]
    fn write_after_listener_does_not_reenable() {
        let (channel, context) = bound_channel();
        let _sub = channel.on_ready_read(|| {});
        channel.write(&RtpPacket::new(vec![1], 0));
        assert_eq!(context.enable_calls(), vec![true]);
    }

    #[test]
    fn listener_after_write_does_not_reenable() {
        let (channel, context) = bound_channel();
        channel.write(&RtpPacket::new(vec![1], 0));
        let sub = channel.on_ready_read(|| {});
        assert_eq!(context.enable_calls(), vec![true]);

        drop(sub);
        assert_eq!(context.enable_calls(), vec![true, false]);
        assert!(!channel.is_enabled());
    }

    #[test]
    fn null_packet_write_is_ignored() {
        let (channel, context) = bound_channel();
        channel.write(&RtpPacket::null());
        assert!(context.written().is_empty());
        assert!(!channel.is_enabled());
    }

    #[test]
    fn interest_registered_before_binding_enables_on_bind() {
        let channel = RtpChannel::new("video");
        let _sub = channel.on_ready_read(|| {});
        assert!(!channel.is_enabled());

        let context = MockChannel::new();
        channel.set_context(Some(context.clone()));
        assert!(channel.is_enabled());
        assert_eq!(context.enable_calls(), vec![true]);
    }

    #[test]
    fn unbinding_clears_enabled_and_handler() {
        let (channel, context) = bound_channel();
        let _sub = channel.on_ready_read(|| {});
        assert!(context.has_handler());

        channel.set_context(None);
        assert!(!channel.is_enabled());
        assert!(!context.has_handler());
        assert_eq!(channel.packets_available(), 0);
    }

    #[test]
    fn ready_read_is_forwarded() {
        let (channel, context) = bound_channel();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let _sub = channel.on_ready_read(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        context.emit(ChannelContextEvent::ReadyRead);
        context.emit(ChannelContextEvent::ReadyRead);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn packets_written_is_forwarded_without_interest() {
        let (channel, context) = bound_channel();
        let total = Arc::new(AtomicUsize::new(0));
        let t = total.clone();
        let _sub = channel.on_packets_written(move |n| {
            t.fetch_add(n, Ordering::SeqCst);
        });
        assert_eq!(channel.listener_count(), 0);
        assert!(!channel.is_enabled());

        context.emit(ChannelContextEvent::PacketsWritten(3));
        assert_eq!(total.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn events_from_previous_context_are_ignored() {
        let (channel, old) = bound_channel();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let _sub = channel.on_ready_read(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        let stale_handler = old.handler().expect("handler installed");
        channel.set_context(Some(MockChannel::new()));
        stale_handler(ChannelContextEvent::ReadyRead);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_context_is_treated_as_detach() {
        let channel = RtpChannel::new("audio");
        let context = MockChannel::new();
        channel.set_context(Some(context.clone()));
        let _sub = channel.on_ready_read(|| {});
        assert!(channel.is_enabled());

        drop(context);
        assert!(!channel.is_bound());
        assert!(!channel.is_enabled());
        assert!(channel.read().is_null());
    }

    #[test]
    fn closed_event_is_treated_as_detach() {
        let (channel, context) = bound_channel();
        let _sub = channel.on_ready_read(|| {});
        context.emit(ChannelContextEvent::Closed);

        assert!(!channel.is_enabled());
        assert_eq!(channel.packets_available(), 0);
        channel.write(&RtpPacket::new(vec![1], 0));
        assert!(context.written().is_empty());
    }

    #[test]
    fn releasing_interest_while_unbound_does_not_touch_old_context() {
        let (channel, context) = bound_channel();
        let sub = channel.on_ready_read(|| {});
        channel.set_context(None);
        drop(sub);
        assert_eq!(context.enable_calls(), vec![true]);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn listener_may_read_from_callback() {
        let channel = Arc::new(RtpChannel::new("audio"));
        let context = MockChannel::new();
        channel.set_context(Some(context.clone()));

        let got = Arc::new(Mutex::new(Vec::new()));
        let (c, g) = (Arc::downgrade(&channel), got.clone());
        let _sub = channel.on_ready_read(move || {
            if let Some(channel) = c.upgrade() {
                g.lock().push(channel.read());
            }
        });

        context.push_incoming(vec![7, 7], 0);
        context.emit(ChannelContextEvent::ReadyRead);
        assert_eq!(got.lock().len(), 1);
        assert_eq!(got.lock()[0].raw_value().as_ref(), &[7, 7]);
    }
}
