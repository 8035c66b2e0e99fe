//! Administrative mutations on owners' records.

use marketplace_records::{
    ActorRole, Domain, NewRecord, ReadSide, Record, RecordAction, SharedRecordStore,
    TransportError,
};

use crate::bus::NotificationBus;

/// Operator side of the marketplace. Every mutation publishes once after it
/// settles, whether it succeeded or not.
#[derive(Clone)]
pub struct OperatorDesk {
    store: SharedRecordStore,
    bus: NotificationBus,
}

impl OperatorDesk {
    #[must_use]
    pub fn new(store: SharedRecordStore, bus: NotificationBus) -> Self {
        Self { store, bus }
    }

    /// Marks every record in `domain` read on the operator side.
    pub async fn acknowledge(&self, domain: Domain) -> Result<(), TransportError> {
        let result = self.store.mark_all_read_by_operator(domain).await;
        self.settle("acknowledge", domain, None, &result);
        result
    }

    /// Replaces a record's status and re-arms the owner's unread flag.
    pub async fn update_status(
        &self,
        record_id: &str,
        domain: Domain,
        status: &str,
    ) -> Result<Record, TransportError> {
        let result = self
            .store
            .apply_action(
                record_id,
                domain,
                ActorRole::Operator,
                RecordAction::StatusChange,
                Some(status),
            )
            .await;
        self.settle("update_status", domain, Some(record_id), &result);
        result
    }

    /// Creates a record on an owner's behalf, unread for that owner.
    pub async fn create_for_owner(&self, record: NewRecord) -> Result<Record, TransportError> {
        let domain = record.domain;
        let result = self.store.create_record(record, ActorRole::Operator).await;
        let record_id = result.as_ref().ok().map(|record| record.id.as_str());
        self.settle("create_for_owner", domain, record_id, &result);
        result
    }

    /// Flags one record unread again for `side`.
    pub async fn reopen(
        &self,
        record_id: &str,
        domain: Domain,
        side: ReadSide,
    ) -> Result<(), TransportError> {
        let result = self.store.mark_one_unread(record_id, domain, side).await;
        self.settle("reopen", domain, Some(record_id), &result);
        result
    }

    fn settle<T>(
        &self,
        operation: &'static str,
        domain: Domain,
        record_id: Option<&str>,
        result: &Result<T, TransportError>,
    ) {
        match result {
            Ok(_) => tracing::info!(operation, %domain, record_id, "operator mutation applied"),
            Err(error) => tracing::warn!(
                operation,
                %domain,
                record_id,
                reason = %error,
                "operator mutation failed"
            ),
        }
        self.bus.publish();
    }
}
