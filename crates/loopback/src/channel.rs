use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use mediaplug::provider::{ChannelContextEvent, ChannelEventHandler, PRtpPacket, RtpChannelContext};

use crate::dispatch::Dispatcher;
use crate::session::RecorderSlot;

/// Received packets kept before the oldest are discarded.
const QUEUE_LIMIT: usize = 256;

/// One medium of a loopback run: every packet written while enabled is handed
/// to the recorder and then queued for reading.
pub(crate) struct LoopbackChannel {
    label: &'static str,
    dispatcher: Dispatcher,
    recorder: RecorderSlot,
    state: Mutex<ChannelState>,
    handler: Arc<Mutex<Option<ChannelEventHandler>>>,
}

#[derive(Default)]
struct ChannelState {
    enabled: bool,
    queue: VecDeque<PRtpPacket>,
    dropped: u64,
}

impl LoopbackChannel {
    pub(crate) fn new(label: &'static str, dispatcher: Dispatcher, recorder: RecorderSlot) -> Arc<Self> {
        Arc::new(Self {
            label,
            dispatcher,
            recorder,
            state: Mutex::new(ChannelState::default()),
            handler: Arc::default(),
        })
    }

    /// Tell the layer this channel is going away. Called on the dispatcher.
    pub(crate) fn close(&self) {
        let handler = self.handler.lock().take();
        if let Some(handler) = handler {
            handler(ChannelContextEvent::Closed);
        }
        let state = self.state.lock();
        tracing::debug!(channel = self.label, dropped = state.dropped, "loopback channel closed");
    }

    fn notify(&self, events: &'static [ChannelContextEvent]) {
        let handler = self.handler.clone();
        self.dispatcher.post(move || {
            let current = handler.lock().clone();
            if let Some(current) = current {
                for event in events {
                    current(*event);
                }
            }
        });
    }
}

impl RtpChannelContext for LoopbackChannel {
    fn set_enabled(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
        tracing::debug!(channel = self.label, enabled, "loopback transport toggled");
    }

    fn packets_available(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn read(&self) -> Option<PRtpPacket> {
        self.state.lock().queue.pop_front()
    }

    fn write(&self, packet: &PRtpPacket) {
        {
            let mut state = self.state.lock();
            if !state.enabled {
                state.dropped += 1;
                return;
            }
            if state.queue.len() == QUEUE_LIMIT {
                state.queue.pop_front();
                state.dropped += 1;
            }
            state.queue.push_back(packet.clone());
        }
        self.recorder.record(&packet.raw_value);
        tracing::trace!(channel = self.label, len = packet.raw_value.len(), "packet looped back");
        self.notify(&[
            ChannelContextEvent::PacketsWritten(1),
            ChannelContextEvent::ReadyRead,
        ]);
    }

    fn set_event_handler(&self, handler: Option<ChannelEventHandler>) {
        *self.handler.lock() = handler;
    }
}
