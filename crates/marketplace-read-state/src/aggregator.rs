//! Per-domain unread counts for one owner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use marketplace_records::{Domain, ReadSide, SharedRecordStore};
use serde::Serialize;

use crate::count::UnreadCount;
use crate::source::DomainReadStateSource;

/// One domain's count as displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnreadSlot {
    pub count: UnreadCount,
    /// A background mark-as-read failed after the count was consumed. The
    /// displayed zero may understate the store until the next refresh.
    pub stale: bool,
}

/// Slot plus a counter bumped by every write, so a load that started before
/// a `consume` or `mark_stale` cannot overwrite it.
#[derive(Debug, Clone, Copy, Default)]
struct SlotState {
    slot: UnreadSlot,
    generation: u64,
}

impl SlotState {
    fn write(&mut self, slot: UnreadSlot) -> u64 {
        self.slot = slot;
        self.generation += 1;
        self.generation
    }
}

/// Cloneable handle over the owner's three domain slots.
#[derive(Clone)]
pub struct UnreadAggregator {
    owner_id: Arc<str>,
    sources: Arc<[DomainReadStateSource]>,
    slots: Arc<Mutex<HashMap<Domain, SlotState>>>,
}

impl UnreadAggregator {
    #[must_use]
    pub fn new(owner_id: impl Into<String>, store: SharedRecordStore) -> Self {
        let owner_id: String = owner_id.into();
        let sources = Domain::ALL
            .iter()
            .map(|domain| DomainReadStateSource::new(*domain, Arc::clone(&store)))
            .collect::<Vec<_>>();
        let slots = Domain::ALL
            .iter()
            .map(|domain| (*domain, SlotState::default()))
            .collect();
        Self {
            owner_id: Arc::from(owner_id),
            sources: Arc::from(sources),
            slots: Arc::new(Mutex::new(slots)),
        }
    }

    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    #[must_use]
    pub fn count(&self, domain: Domain) -> UnreadCount {
        self.slot(domain).count
    }

    #[must_use]
    pub fn slot(&self, domain: Domain) -> UnreadSlot {
        self.lock_slots()
            .get(&domain)
            .map(|state| state.slot)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_stale(&self, domain: Domain) -> bool {
        self.slot(domain).stale
    }

    /// Slots in [`Domain::ALL`] order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Domain, UnreadSlot)> {
        let slots = self.lock_slots();
        Domain::ALL
            .iter()
            .map(|domain| {
                let slot = slots.get(domain).map(|state| state.slot);
                (*domain, slot.unwrap_or_default())
            })
            .collect()
    }

    /// Sum over all domains; unknown if any domain is.
    #[must_use]
    pub fn total(&self) -> UnreadCount {
        UnreadCount::sum(self.snapshot().into_iter().map(|(_, slot)| slot.count))
    }

    /// Reloads one domain and replaces only its slot.
    ///
    /// The loaded count is dropped if the slot was consumed or marked stale
    /// while the load was in flight; the current count is returned instead.
    pub async fn refresh(&self, domain: Domain) -> UnreadCount {
        let Some(source) = self.sources.iter().find(|source| source.domain() == domain) else {
            return UnreadCount::Unknown;
        };
        let started_at = self.generation(domain);
        let count = source.load(&self.owner_id).await.unread(ReadSide::Owner);

        let mut slots = self.lock_slots();
        let state = slots.entry(domain).or_default();
        if state.generation != started_at {
            tracing::debug!(
                %domain,
                owner_id = %self.owner_id,
                %count,
                "superseded unread count dropped"
            );
            return state.slot.count;
        }
        state.write(UnreadSlot {
            count,
            stale: false,
        });
        tracing::debug!(%domain, owner_id = %self.owner_id, %count, "unread count refreshed");
        count
    }

    /// Reloads every domain concurrently. Completion order is unspecified.
    pub async fn refresh_all(&self) {
        join_all(Domain::ALL.iter().map(|domain| self.refresh(*domain))).await;
    }

    /// Optimistically zeroes a domain ahead of its mark-as-read mutation.
    ///
    /// Returns the slot generation this consume produced, for
    /// [`UnreadAggregator::mark_stale_since`].
    pub fn consume(&self, domain: Domain) -> u64 {
        let mut slots = self.lock_slots();
        let state = slots.entry(domain).or_default();
        state.write(UnreadSlot {
            count: UnreadCount::Known(0),
            stale: state.slot.stale,
        })
    }

    /// Flags the consumed count as possibly wrong. The count is kept.
    pub fn mark_stale(&self, domain: Domain) {
        let mut slots = self.lock_slots();
        let state = slots.entry(domain).or_default();
        state.write(UnreadSlot {
            stale: true,
            ..state.slot
        });
    }

    /// Marks the slot stale only if nothing has written it since the consume
    /// that returned `consumed_at`. Returns whether it did.
    pub fn mark_stale_since(&self, domain: Domain, consumed_at: u64) -> bool {
        let mut slots = self.lock_slots();
        let state = slots.entry(domain).or_default();
        if state.generation != consumed_at {
            return false;
        }
        state.write(UnreadSlot {
            stale: true,
            ..state.slot
        });
        true
    }

    fn generation(&self, domain: Domain) -> u64 {
        self.lock_slots()
            .get(&domain)
            .map_or(0, |state| state.generation)
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<Domain, SlotState>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use marketplace_records::{MemoryRecordStore, Record};

    use super::*;

    fn record(id: &str, domain: Domain, read: bool) -> Record {
        Record {
            id: id.to_string(),
            owner_id: "owner_1".to_string(),
            domain,
            status: "pending".to_string(),
            read_by_owner: read,
            read_by_operator: true,
            created_at: Utc::now(),
            payload: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn slots_start_unknown() {
        let aggregator = UnreadAggregator::new("owner_1", MemoryRecordStore::shared());
        for domain in Domain::ALL {
            assert_eq!(aggregator.count(domain), UnreadCount::Unknown);
            assert!(!aggregator.is_stale(domain));
        }
        assert_eq!(aggregator.total(), UnreadCount::Unknown);
    }

    #[tokio::test]
    async fn refresh_all_fills_each_domain() {
        let store = Arc::new(MemoryRecordStore::with_records([
            record("o1", Domain::Orders, false),
            record("o2", Domain::Orders, false),
            record("f1", Domain::Fabrication, true),
            record("r1", Domain::Recycling, false),
        ]));
        let aggregator = UnreadAggregator::new("owner_1", store);
        aggregator.refresh_all().await;

        assert_eq!(aggregator.count(Domain::Orders), UnreadCount::Known(2));
        assert_eq!(aggregator.count(Domain::Fabrication), UnreadCount::Known(0));
        assert_eq!(aggregator.count(Domain::Recycling), UnreadCount::Known(1));
        assert_eq!(aggregator.total(), UnreadCount::Known(3));
    }

    #[tokio::test]
    async fn slow_load_does_not_clobber_siblings() {
        let store = Arc::new(MemoryRecordStore::with_records([
            record("o1", Domain::Orders, false),
            record("r1", Domain::Recycling, false),
            record("r2", Domain::Recycling, false),
        ]));
        store
            .set_fetch_delay(Domain::Orders, Duration::from_millis(40))
            .await;
        let aggregator = UnreadAggregator::new("owner_1", store);

        aggregator.refresh_all().await;

        assert_eq!(aggregator.count(Domain::Orders), UnreadCount::Known(1));
        assert_eq!(aggregator.count(Domain::Fabrication), UnreadCount::Known(0));
        assert_eq!(aggregator.count(Domain::Recycling), UnreadCount::Known(2));
    }

    #[tokio::test]
    async fn failed_load_is_unknown_not_zero() {
        let store = Arc::new(MemoryRecordStore::with_records([record(
            "o1",
            Domain::Orders,
            false,
        )]));
        store.fail_next_fetch(Domain::Orders).await;
        let aggregator = UnreadAggregator::new("owner_1", store);

        aggregator.refresh_all().await;
        assert_eq!(aggregator.count(Domain::Orders), UnreadCount::Unknown);
        assert_eq!(aggregator.count(Domain::Recycling), UnreadCount::Known(0));

        aggregator.refresh(Domain::Orders).await;
        assert_eq!(aggregator.count(Domain::Orders), UnreadCount::Known(1));
    }

    #[tokio::test]
    async fn consume_then_stale_keeps_zero_until_refresh() {
        let store = Arc::new(MemoryRecordStore::with_records([record(
            "r1",
            Domain::Recycling,
            false,
        )]));
        let aggregator = UnreadAggregator::new("owner_1", store);
        aggregator.refresh(Domain::Recycling).await;

        aggregator.consume(Domain::Recycling);
        aggregator.mark_stale(Domain::Recycling);
        assert_eq!(aggregator.count(Domain::Recycling), UnreadCount::Known(0));
        assert!(aggregator.is_stale(Domain::Recycling));

        aggregator.refresh(Domain::Recycling).await;
        assert_eq!(aggregator.count(Domain::Recycling), UnreadCount::Known(1));
        assert!(!aggregator.is_stale(Domain::Recycling));
    }

    #[tokio::test]
    async fn load_started_before_consume_does_not_undo_it() {
        let store = Arc::new(MemoryRecordStore::with_records([
            record("o1", Domain::Orders, false),
            record("o2", Domain::Orders, false),
        ]));
        let aggregator = UnreadAggregator::new("owner_1", store.clone());
        aggregator.refresh(Domain::Orders).await;
        store
            .set_fetch_delay(Domain::Orders, Duration::from_millis(40))
            .await;

        let in_flight = tokio::spawn({
            let aggregator = aggregator.clone();
            async move { aggregator.refresh(Domain::Orders).await }
        });
        tokio::task::yield_now().await;
        aggregator.consume(Domain::Orders);

        let returned = in_flight.await.expect("refresh task");
        assert_eq!(returned, UnreadCount::Known(0));
        assert_eq!(aggregator.count(Domain::Orders), UnreadCount::Known(0));
        assert!(!aggregator.is_stale(Domain::Orders));

        aggregator.refresh(Domain::Orders).await;
        assert_eq!(aggregator.count(Domain::Orders), UnreadCount::Known(2));
    }

    #[tokio::test]
    async fn stale_mark_is_skipped_once_a_refresh_has_landed() {
        let store = Arc::new(MemoryRecordStore::with_records([record(
            "r1",
            Domain::Recycling,
            false,
        )]));
        let aggregator = UnreadAggregator::new("owner_1", store);
        aggregator.refresh(Domain::Recycling).await;

        let consumed_at = aggregator.consume(Domain::Recycling);
        aggregator.refresh(Domain::Recycling).await;

        assert!(!aggregator.mark_stale_since(Domain::Recycling, consumed_at));
        assert!(!aggregator.is_stale(Domain::Recycling));
        assert_eq!(aggregator.count(Domain::Recycling), UnreadCount::Known(1));

        let consumed_at = aggregator.consume(Domain::Recycling);
        assert!(aggregator.mark_stale_since(Domain::Recycling, consumed_at));
        assert!(aggregator.is_stale(Domain::Recycling));
    }

    #[tokio::test]
    async fn clones_share_slots() {
        let aggregator = UnreadAggregator::new("owner_1", MemoryRecordStore::shared());
        let handle = aggregator.clone();
        handle.consume(Domain::Fabrication);
        assert_eq!(
            aggregator.count(Domain::Fabrication),
            UnreadCount::Known(0)
        );
    }
}
