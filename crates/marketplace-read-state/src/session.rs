//! One owner's dashboard view over a shared store and notification bus.

use std::sync::Arc;

use marketplace_records::{ActorRole, Domain, NewRecord, Record, SharedRecordStore, TransportError};

use crate::aggregator::{UnreadAggregator, UnreadSlot};
use crate::bus::NotificationBus;
use crate::count::UnreadCount;
use crate::focus::{FocusCoordinator, FocusTransition, Panel};

/// One owner's mounted dashboard: sources, counts and panel focus.
///
/// The session never subscribes to the bus; it only publishes.
pub struct DashboardSession {
    owner_id: String,
    store: SharedRecordStore,
    bus: NotificationBus,
    aggregator: UnreadAggregator,
    coordinator: FocusCoordinator,
}

impl DashboardSession {
    #[must_use]
    pub fn mount(
        owner_id: impl Into<String>,
        store: SharedRecordStore,
        bus: NotificationBus,
    ) -> Self {
        let owner_id = owner_id.into();
        let aggregator = UnreadAggregator::new(owner_id.clone(), Arc::clone(&store));
        let coordinator =
            FocusCoordinator::new(aggregator.clone(), Arc::clone(&store), bus.clone());
        tracing::debug!(%owner_id, "dashboard mounted");
        Self {
            owner_id,
            store,
            bus,
            aggregator,
            coordinator,
        }
    }

    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub async fn load(&self) {
        self.aggregator.refresh_all().await;
    }

    pub async fn refresh(&self, domain: Domain) -> UnreadCount {
        self.aggregator.refresh(domain).await
    }

    pub fn select(&mut self, panel: Panel) -> FocusTransition {
        self.coordinator.select(panel)
    }

    #[must_use]
    pub fn active_panel(&self) -> Panel {
        self.coordinator.active()
    }

    #[must_use]
    pub fn counts(&self) -> Vec<(Domain, UnreadSlot)> {
        self.aggregator.snapshot()
    }

    #[must_use]
    pub fn count(&self, domain: Domain) -> UnreadCount {
        self.aggregator.count(domain)
    }

    #[must_use]
    pub fn total(&self) -> UnreadCount {
        self.aggregator.total()
    }

    /// Owner self-service submission. The new record starts read by the owner
    /// and unread by the operator.
    pub async fn submit(&self, mut record: NewRecord) -> Result<Record, TransportError> {
        record.owner_id.clone_from(&self.owner_id);
        let domain = record.domain;
        let result = self.store.create_record(record, ActorRole::Owner).await;
        match &result {
            Ok(created) => {
                tracing::info!(
                    %domain,
                    owner_id = %self.owner_id,
                    record_id = %created.id,
                    "record submitted"
                );
                self.aggregator.refresh(domain).await;
            }
            Err(error) => {
                tracing::warn!(
                    %domain,
                    owner_id = %self.owner_id,
                    reason = %error,
                    "submission failed"
                );
            }
        }
        self.bus.publish();
        result
    }

    /// Tears the session down. Spawned mark-as-read tasks keep running.
    pub fn unmount(self) {
        tracing::debug!(owner_id = %self.owner_id, "dashboard unmounted");
    }
}
