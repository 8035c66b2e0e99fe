//! Panel focus and the mark-as-read side effect of entering a domain.

use std::fmt;
use std::str::FromStr;

use marketplace_records::{Domain, SharedRecordStore, TransportError, UnknownDomain};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::aggregator::UnreadAggregator;
use crate::bus::NotificationBus;
use crate::count::UnreadCount;

/// Dashboard view currently in focus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Panel {
    /// Non-notification landing view.
    #[default]
    Overview,
    Domain(Domain),
}

impl Panel {
    #[must_use]
    pub const fn domain(self) -> Option<Domain> {
        match self {
            Self::Domain(domain) => Some(domain),
            Self::Overview => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Domain(domain) => domain.as_str(),
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Panel {
    type Err = UnknownDomain;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("overview") {
            return Ok(Self::Overview);
        }
        value.parse().map(Self::Domain)
    }
}

#[derive(Debug, Clone)]
pub enum MarkReadOutcome {
    Acknowledged,
    /// The store rejected or never received the mutation. The slot is stale.
    Failed { error: TransportError },
    /// The background task ended without an outcome.
    Interrupted { reason: String },
}

impl MarkReadOutcome {
    #[must_use]
    pub const fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged)
    }
}

/// Background mark-as-read for one domain. Dropping it detaches the task.
#[derive(Debug)]
pub struct MarkReadTask {
    domain: Domain,
    handle: JoinHandle<MarkReadOutcome>,
}

impl MarkReadTask {
    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the mutation and its publish to settle.
    pub async fn wait(self) -> MarkReadOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(error) => MarkReadOutcome::Interrupted {
                reason: error.to_string(),
            },
        }
    }
}

/// Result of [`FocusCoordinator::select`].
#[derive(Debug)]
pub struct FocusTransition {
    pub from: Panel,
    pub to: Panel,
    /// Present when entering the panel consumed a non-zero count.
    pub mark_read: Option<MarkReadTask>,
}

pub struct FocusCoordinator {
    active: Panel,
    aggregator: UnreadAggregator,
    store: SharedRecordStore,
    bus: NotificationBus,
}

impl FocusCoordinator {
    #[must_use]
    pub fn new(aggregator: UnreadAggregator, store: SharedRecordStore, bus: NotificationBus) -> Self {
        Self {
            active: Panel::Overview,
            aggregator,
            store,
            bus,
        }
    }

    #[must_use]
    pub fn active(&self) -> Panel {
        self.active
    }

    /// Focuses `panel`. Entering a domain with known unread records zeroes its
    /// count at once and spawns the store mutation on the current runtime.
    pub fn select(&mut self, panel: Panel) -> FocusTransition {
        let from = std::mem::replace(&mut self.active, panel);
        tracing::debug!(from = %from, to = %panel, "panel focused");
        let mark_read = panel.domain().and_then(|domain| self.consume(domain));
        FocusTransition {
            from,
            to: panel,
            mark_read,
        }
    }

    fn consume(&self, domain: Domain) -> Option<MarkReadTask> {
        match self.aggregator.count(domain) {
            UnreadCount::Known(count) if count > 0 => {}
            UnreadCount::Known(_) | UnreadCount::Unknown => return None,
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(%domain, "no async runtime; mark-as-read skipped");
            return None;
        };

        let consumed_at = self.aggregator.consume(domain);
        let aggregator = self.aggregator.clone();
        let store = std::sync::Arc::clone(&self.store);
        let bus = self.bus.clone();
        let handle = runtime.spawn(async move {
            let owner_id = aggregator.owner_id().to_string();
            let outcome = match store.mark_all_read(&owner_id, domain).await {
                Ok(()) => {
                    tracing::info!(%domain, %owner_id, "domain marked read");
                    MarkReadOutcome::Acknowledged
                }
                Err(error) => {
                    let stale = aggregator.mark_stale_since(domain, consumed_at);
                    tracing::warn!(
                        %domain,
                        %owner_id,
                        reason = %error,
                        stale,
                        "mark-as-read failed"
                    );
                    MarkReadOutcome::Failed { error }
                }
            };
            bus.publish();
            outcome
        });
        Some(MarkReadTask { domain, handle })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::Utc;
    use marketplace_records::{MemoryRecordStore, Record};

    use super::*;

    fn record(id: &str, domain: Domain) -> Record {
        Record {
            id: id.to_string(),
            owner_id: "owner_1".to_string(),
            domain,
            status: "pending".to_string(),
            read_by_owner: false,
            read_by_operator: true,
            created_at: Utc::now(),
            payload: serde_json::Value::Null,
        }
    }

    async fn coordinator(
        store: Arc<MemoryRecordStore>,
    ) -> (FocusCoordinator, UnreadAggregator, NotificationBus) {
        let bus = NotificationBus::new();
        let aggregator = UnreadAggregator::new("owner_1", store.clone());
        aggregator.refresh_all().await;
        let coordinator = FocusCoordinator::new(aggregator.clone(), store, bus.clone());
        (coordinator, aggregator, bus)
    }

    fn publish_counter(bus: &NotificationBus) -> (Arc<AtomicUsize>, crate::bus::Subscription) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let subscription = bus.subscribe(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (calls, subscription)
    }

    #[test]
    fn panels_parse_from_labels() {
        assert_eq!("overview".parse::<Panel>(), Ok(Panel::Overview));
        assert_eq!(
            "recycling".parse::<Panel>(),
            Ok(Panel::Domain(Domain::Recycling))
        );
        assert!("billing".parse::<Panel>().is_err());
        assert_eq!(Panel::Domain(Domain::Orders).to_string(), "orders");
    }

    #[tokio::test]
    async fn entering_unread_domain_consumes_and_publishes_once() {
        let store = Arc::new(MemoryRecordStore::with_records([
            record("o1", Domain::Orders),
            record("o2", Domain::Orders),
        ]));
        let (mut coordinator, aggregator, bus) = coordinator(store.clone()).await;
        let (published, _subscription) = publish_counter(&bus);

        let transition = coordinator.select(Panel::Domain(Domain::Orders));
        assert_eq!(transition.from, Panel::Overview);
        assert_eq!(aggregator.count(Domain::Orders), UnreadCount::Known(0));

        let task = transition.mark_read.expect("mark-as-read should be spawned");
        assert_eq!(task.domain(), Domain::Orders);
        assert!(task.wait().await.is_acknowledged());
        assert_eq!(published.load(Ordering::SeqCst), 1);
        assert_eq!(store.mark_all_read_calls(), 1);
        assert!(store.get("o1").await.is_some_and(|r| r.read_by_owner));
    }

    #[tokio::test]
    async fn no_mutation_for_overview_zero_or_unknown() {
        let store = Arc::new(MemoryRecordStore::with_records([record(
            "r1",
            Domain::Recycling,
        )]));
        store.fail_next_fetch(Domain::Recycling).await;
        let (mut coordinator, aggregator, _bus) = coordinator(store.clone()).await;
        assert_eq!(aggregator.count(Domain::Recycling), UnreadCount::Unknown);

        assert!(coordinator.select(Panel::Overview).mark_read.is_none());
        assert!(
            coordinator
                .select(Panel::Domain(Domain::Fabrication))
                .mark_read
                .is_none()
        );
        assert!(
            coordinator
                .select(Panel::Domain(Domain::Recycling))
                .mark_read
                .is_none()
        );
        assert_eq!(store.mark_all_read_calls(), 0);
    }

    #[tokio::test]
    async fn reselecting_a_consumed_domain_does_not_fire_again() {
        let store = Arc::new(MemoryRecordStore::with_records([record(
            "f1",
            Domain::Fabrication,
        )]));
        store
            .set_mark_read_delay(Some(Duration::from_millis(30)))
            .await;
        let (mut coordinator, _aggregator, _bus) = coordinator(store.clone()).await;

        let first = coordinator.select(Panel::Domain(Domain::Fabrication));
        let second = coordinator.select(Panel::Domain(Domain::Fabrication));
        assert!(second.mark_read.is_none());
        assert_eq!(second.from, Panel::Domain(Domain::Fabrication));

        first
            .mark_read
            .expect("first entry fires")
            .wait()
            .await;
        assert_eq!(store.mark_all_read_calls(), 1);
    }

    #[tokio::test]
    async fn failed_mutation_marks_stale_and_still_publishes() {
        let store = Arc::new(MemoryRecordStore::with_records([record(
            "r1",
            Domain::Recycling,
        )]));
        let (mut coordinator, aggregator, bus) = coordinator(store.clone()).await;
        let (published, _subscription) = publish_counter(&bus);
        store.fail_next_mark_read().await;

        let outcome = coordinator
            .select(Panel::Domain(Domain::Recycling))
            .mark_read
            .expect("mark-as-read should be spawned")
            .wait()
            .await;

        assert!(matches!(outcome, MarkReadOutcome::Failed { .. }));
        assert_eq!(published.load(Ordering::SeqCst), 1);
        assert_eq!(aggregator.count(Domain::Recycling), UnreadCount::Known(0));
        assert!(aggregator.is_stale(Domain::Recycling));

        aggregator.refresh(Domain::Recycling).await;
        assert_eq!(aggregator.count(Domain::Recycling), UnreadCount::Known(1));
    }

    #[tokio::test]
    async fn failure_after_a_newer_refresh_leaves_the_slot_fresh() {
        let store = Arc::new(MemoryRecordStore::with_records([
            record("r1", Domain::Recycling),
            record("r2", Domain::Recycling),
        ]));
        store
            .set_mark_read_delay(Some(Duration::from_millis(30)))
            .await;
        let (mut coordinator, aggregator, _bus) = coordinator(store.clone()).await;
        store.fail_next_mark_read().await;

        let task = coordinator
            .select(Panel::Domain(Domain::Recycling))
            .mark_read
            .expect("mark-as-read should be spawned");
        assert_eq!(
            aggregator.refresh(Domain::Recycling).await,
            UnreadCount::Known(2)
        );

        assert!(matches!(task.wait().await, MarkReadOutcome::Failed { .. }));
        assert_eq!(aggregator.count(Domain::Recycling), UnreadCount::Known(2));
        assert!(!aggregator.is_stale(Domain::Recycling));
    }

    #[tokio::test]
    async fn refresh_in_flight_during_entry_does_not_resurrect_the_count() {
        let store = Arc::new(MemoryRecordStore::with_records([
            record("o1", Domain::Orders),
            record("o2", Domain::Orders),
        ]));
        let (mut coordinator, aggregator, _bus) = coordinator(store.clone()).await;
        store
            .set_fetch_delay(Domain::Orders, Duration::from_millis(40))
            .await;
        store
            .set_mark_read_delay(Some(Duration::from_millis(80)))
            .await;

        let in_flight = tokio::spawn({
            let aggregator = aggregator.clone();
            async move { aggregator.refresh(Domain::Orders).await }
        });
        tokio::task::yield_now().await;
        let task = coordinator
            .select(Panel::Domain(Domain::Orders))
            .mark_read
            .expect("mark-as-read should be spawned");

        in_flight.await.expect("refresh task");
        assert_eq!(aggregator.count(Domain::Orders), UnreadCount::Known(0));
        assert!(
            coordinator
                .select(Panel::Domain(Domain::Orders))
                .mark_read
                .is_none()
        );

        assert!(task.wait().await.is_acknowledged());
        assert_eq!(store.mark_all_read_calls(), 1);
    }

    #[tokio::test]
    async fn dropped_task_still_completes() {
        let store = Arc::new(MemoryRecordStore::with_records([record(
            "o1",
            Domain::Orders,
        )]));
        let (mut coordinator, _aggregator, bus) = coordinator(store.clone()).await;
        let (published, _subscription) = publish_counter(&bus);

        drop(coordinator.select(Panel::Domain(Domain::Orders)));
        for _ in 0..50 {
            if published.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(published.load(Ordering::SeqCst), 1);
        assert!(store.get("o1").await.is_some_and(|r| r.read_by_owner));
    }
}
