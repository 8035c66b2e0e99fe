//! Record store contract shared by the in-memory and REST backends.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::record::{Domain, NewRecord, ReadSide, Record};
use crate::transition::{ActorRole, RecordAction};

/// Network, auth, and decoding failures talking to the record store.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("record_store_base_url_missing")]
    BaseUrlMissing,
    #[error("record_store_invalid_path")]
    InvalidPath,
    #[error("record_store_request_failed:{message}")]
    Request { message: String },
    #[error("record_store_http_{status}:{body}")]
    Http { status: StatusCode, body: String },
    #[error("record_store_decode_failed:{message}")]
    Decode { message: String },
    #[error("record_store_not_found:{record_id}")]
    NotFound { record_id: String },
}

impl TransportError {
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Http { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

/// Remote managed data store holding request records.
///
/// Every method is a single round trip. Nothing is transactional across
/// domains.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records for one owner in one domain, newest first.
    async fn fetch_records(
        &self,
        owner_id: &str,
        domain: Domain,
    ) -> Result<Vec<Record>, TransportError>;

    /// Records of every owner in one domain, newest first.
    async fn fetch_domain(&self, domain: Domain) -> Result<Vec<Record>, TransportError>;

    /// Sets `read_by_owner` to true where owner and domain match and the flag
    /// is currently false. Running it twice is a no-op the second time.
    async fn mark_all_read(&self, owner_id: &str, domain: Domain) -> Result<(), TransportError>;

    /// Operator-side counterpart of [`RecordStore::mark_all_read`] across all owners.
    async fn mark_all_read_by_operator(&self, domain: Domain) -> Result<(), TransportError>;

    async fn mark_one_unread(
        &self,
        record_id: &str,
        domain: Domain,
        side: ReadSide,
    ) -> Result<(), TransportError>;

    /// Applies the flag transition for `(actor, action)` to one record and
    /// optionally replaces its status, in one update.
    async fn apply_action(
        &self,
        record_id: &str,
        domain: Domain,
        actor: ActorRole,
        action: RecordAction,
        status: Option<&str>,
    ) -> Result<Record, TransportError>;

    async fn create_record(
        &self,
        record: NewRecord,
        actor: ActorRole,
    ) -> Result<Record, TransportError>;
}

pub type SharedRecordStore = Arc<dyn RecordStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_classified() {
        let unauthorized = TransportError::Http {
            status: StatusCode::UNAUTHORIZED,
            body: "jwt expired".to_string(),
        };
        assert!(unauthorized.is_auth());

        let unavailable = TransportError::Http {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "<empty>".to_string(),
        };
        assert!(!unavailable.is_auth());
        assert!(
            !TransportError::Request {
                message: "connection refused".to_string()
            }
            .is_auth()
        );
    }

    #[test]
    fn error_display_is_machine_readable() {
        let error = TransportError::NotFound {
            record_id: "rec_9".to_string(),
        };
        assert_eq!(error.to_string(), "record_store_not_found:rec_9");
    }
}
