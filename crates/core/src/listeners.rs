//! Callback lists and the [`Subscription`] guard returned to callers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A list of callbacks invoked with a shared event value.
///
/// Callbacks are cloned out before invocation, so a callback may subscribe or
/// unsubscribe (itself included) without deadlocking.
pub(crate) struct Listeners<T> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Callback<T>)>>,
}

impl<T> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, Arc::new(callback)));
        id
    }

    /// Returns whether `id` was registered.
    pub(crate) fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|(i, _)| *i == id) {
            Some(pos) => {
                entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn emit(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self.entries.lock().iter().map(|(_, c)| c.clone()).collect();
        for callback in snapshot {
            callback(value);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Keeps a callback registered for as long as it is alive.
///
/// Dropping the guard (or calling [`unsubscribe`](Self::unsubscribe))
/// removes the callback. For [`RtpChannel::on_ready_read`](crate::rtp::RtpChannel::on_ready_read)
/// the guard also carries one unit of listener interest.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Remove the callback now.
    pub fn unsubscribe(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_reaches_all_callbacks() {
        let listeners = Listeners::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let t = total.clone();
            listeners.add(move |v| {
                t.fetch_add(*v as usize, Ordering::SeqCst);
            });
        }
        listeners.emit(&2);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn remove_is_idempotent() {
        let listeners = Listeners::<()>::new();
        let id = listeners.add(|_| {});
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn callback_may_remove_itself() {
        let listeners = Arc::new(Listeners::<()>::new());
        let own_id = Arc::new(AtomicU64::new(0));
        let (l, i) = (listeners.clone(), own_id.clone());
        let id = listeners.add(move |_| {
            l.remove(i.load(Ordering::SeqCst));
        });
        own_id.store(id, Ordering::SeqCst);

        listeners.emit(&());
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn subscription_releases_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let c = count.clone();
        drop(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
