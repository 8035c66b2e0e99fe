//! Per-domain read-state loading.

use marketplace_records::{Domain, ReadSide, Record, SharedRecordStore};

use crate::count::{UnreadCount, unread_count};

/// Result of loading one domain for one owner.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainLoad {
    /// Records newest first.
    Loaded(Vec<Record>),
    /// The store could not be reached; no records are known.
    Unavailable { reason: String },
}

impl DomainLoad {
    /// Loaded records, or an empty slice when unavailable.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        match self {
            Self::Loaded(records) => records,
            Self::Unavailable { .. } => &[],
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    #[must_use]
    pub fn unread(&self, side: ReadSide) -> UnreadCount {
        match self {
            Self::Loaded(records) => UnreadCount::Known(unread_count(records, side)),
            Self::Unavailable { .. } => UnreadCount::Unknown,
        }
    }
}

/// Loads one domain's records.
#[derive(Clone)]
pub struct DomainReadStateSource {
    domain: Domain,
    store: SharedRecordStore,
}

impl DomainReadStateSource {
    #[must_use]
    pub fn new(domain: Domain, store: SharedRecordStore) -> Self {
        Self { domain, store }
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub async fn load(&self, owner_id: &str) -> DomainLoad {
        match self.store.fetch_records(owner_id, self.domain).await {
            Ok(records) => {
                tracing::debug!(
                    domain = %self.domain,
                    owner_id,
                    records = records.len(),
                    "domain records loaded"
                );
                DomainLoad::Loaded(records)
            }
            Err(error) => {
                tracing::warn!(
                    domain = %self.domain,
                    owner_id,
                    reason = %error,
                    "domain records unavailable"
                );
                DomainLoad::Unavailable {
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Owner-side unread count from a fresh load.
    pub async fn unread(&self, owner_id: &str) -> UnreadCount {
        self.load(owner_id).await.unread(ReadSide::Owner)
    }
}
