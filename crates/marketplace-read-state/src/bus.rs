//! Argument-less "read state changed" signal between independent views.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use thiserror::Error;

/// Failure reported by a subscriber while handling a signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriberError {
    #[error("subscriber_failed:{message}")]
    Failed { message: String },
    #[error("subscriber_panicked")]
    Panicked,
}

impl SubscriberError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

type Handler = Box<dyn Fn() -> Result<(), SubscriberError> + Send + Sync>;

/// A handler plus the flag its subscription clears on detach, so a publish
/// already iterating its snapshot skips it.
struct HandlerEntry {
    id: u64,
    alive: AtomicBool,
    handler: Handler,
}

/// Outcome of one [`NotificationBus::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

impl PublishReport {
    #[must_use]
    pub const fn attempted(self) -> usize {
        self.delivered + self.failed
    }
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    handlers: Mutex<Vec<Arc<HandlerEntry>>>,
}

impl BusInner {
    fn lock_handlers(&self) -> MutexGuard<'_, Vec<Arc<HandlerEntry>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn detach(&self, id: u64) {
        let mut handlers = self.lock_handlers();
        handlers.retain(|entry| {
            if entry.id != id {
                return true;
            }
            entry.alive.store(false, Ordering::SeqCst);
            false
        });
        tracing::debug!(
            subscriber_id = id,
            subscriber_count = handlers.len(),
            "bus subscriber detached"
        );
    }
}

/// Broadcasts a payload-free signal; receivers re-query their own state.
///
/// Cloning yields another handle to the same subscriber set.
#[derive(Clone, Default)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl NotificationBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn() -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handlers = self.inner.lock_handlers();
        handlers.push(Arc::new(HandlerEntry {
            id,
            alive: AtomicBool::new(true),
            handler: Box::new(handler),
        }));
        tracing::debug!(
            subscriber_id = id,
            subscriber_count = handlers.len(),
            "bus subscriber attached"
        );
        Subscription {
            id,
            bus: Some(Arc::downgrade(&self.inner)),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock_handlers().len()
    }

    /// Invokes every handler attached at the time of the call, once each.
    ///
    /// A handler detached by an earlier handler in the same publish is
    /// skipped. A failing or panicking handler does not stop the others.
    pub fn publish(&self) -> PublishReport {
        let handlers = self.inner.lock_handlers().clone();
        tracing::debug!(subscriber_count = handlers.len(), "read state changed");

        let mut report = PublishReport::default();
        for entry in handlers {
            if !entry.alive.load(Ordering::SeqCst) {
                continue;
            }
            let result = catch_unwind(AssertUnwindSafe(|| (entry.handler)()))
                .unwrap_or(Err(SubscriberError::Panicked));
            match result {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(
                        subscriber_id = entry.id,
                        reason = %error,
                        "bus subscriber failed"
                    );
                }
            }
        }
        report
    }
}

/// Keeps a handler attached. Dropping it detaches the handler.
#[must_use = "dropping a Subscription detaches its handler"]
pub struct Subscription {
    id: u64,
    bus: Option<Weak<BusInner>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(inner) = self.bus.take().and_then(|bus| bus.upgrade()) {
            inner.detach(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.bus.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counter(bus: &NotificationBus) -> (Arc<AtomicUsize>, Subscription) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let subscription = bus.subscribe(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (calls, subscription)
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = NotificationBus::new();
        assert_eq!(bus.publish(), PublishReport::default());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn each_subscriber_runs_once_per_publish() {
        let bus = NotificationBus::new();
        let subscribers = (0..4).map(|_| counter(&bus)).collect::<Vec<_>>();

        let report = bus.publish();
        assert_eq!(report.delivered, 4);
        assert_eq!(report.failed, 0);
        for (calls, _) in &subscribers {
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }

        bus.publish();
        bus.publish();
        for (calls, _) in &subscribers {
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        }
    }

    #[test]
    fn dropping_or_unsubscribing_detaches() {
        let bus = NotificationBus::new();
        let (first_calls, first) = counter(&bus);
        let (second_calls, second) = counter(&bus);
        assert_eq!(bus.subscriber_count(), 2);

        drop(first);
        second.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);

        bus.publish();
        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[allow(clippy::panic)]
    fn failing_handlers_are_isolated() {
        let bus = NotificationBus::new();
        let (before_calls, _before) = counter(&bus);
        let _failing = bus.subscribe(|| Err(SubscriberError::failed("view gone")));
        let _panicking = bus.subscribe(|| panic!("handler bug"));
        let (after_calls, _after) = counter(&bus);

        let report = bus.publish();
        assert_eq!(report, PublishReport { delivered: 2, failed: 2 });
        assert_eq!(before_calls.load(Ordering::SeqCst), 1);
        assert_eq!(after_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handlers_may_publish_and_unsubscribe_reentrantly() {
        let bus = NotificationBus::new();
        let nested = bus.clone();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let held = Arc::clone(&slot);
        let subscription = bus.subscribe(move || {
            let taken = held.lock().unwrap().take();
            if let Some(own) = taken {
                own.unsubscribe();
                nested.publish();
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(subscription);

        assert_eq!(bus.publish().delivered, 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn handler_detached_mid_publish_is_not_invoked() {
        let bus = NotificationBus::new();
        let victim_slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let held = Arc::clone(&victim_slot);
        let _detacher = bus.subscribe(move || {
            if let Some(victim) = held.lock().unwrap().take() {
                victim.unsubscribe();
            }
            Ok(())
        });
        let (victim_calls, victim) = counter(&bus);
        *victim_slot.lock().unwrap() = Some(victim);

        let report = bus.publish();
        assert_eq!(report, PublishReport { delivered: 1, failed: 0 });
        assert_eq!(victim_calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn subscription_outliving_bus_drops_cleanly() {
        let bus = NotificationBus::new();
        let (_calls, subscription) = counter(&bus);
        drop(bus);
        drop(subscription);
    }
}
