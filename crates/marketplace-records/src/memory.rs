//! In-memory record store with fault injection for tests and local demos.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::record::{Domain, NewRecord, ReadSide, Record};
use crate::store::{RecordStore, TransportError};
use crate::transition::{ActorRole, RecordAction};

#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<MemoryRecordStoreInner>,
    fetch_calls: AtomicUsize,
    mark_all_read_calls: AtomicUsize,
}

#[derive(Default)]
struct MemoryRecordStoreInner {
    records: HashMap<String, Record>,
    offline: bool,
    failing_fetches: HashSet<Domain>,
    fail_next_mark_read: bool,
    fetch_delays: HashMap<Domain, Duration>,
    mark_read_delay: Option<Duration>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self {
            inner: Mutex::new(MemoryRecordStoreInner {
                records,
                ..MemoryRecordStoreInner::default()
            }),
            ..Self::default()
        }
    }

    pub async fn insert(&self, record: Record) {
        let mut inner = self.inner.lock().await;
        inner.records.insert(record.id.clone(), record);
    }

    pub async fn get(&self, record_id: &str) -> Option<Record> {
        self.inner.lock().await.records.get(record_id).cloned()
    }

    /// Every call fails with a transport error while offline.
    pub async fn set_offline(&self, offline: bool) {
        self.inner.lock().await.offline = offline;
    }

    /// The next fetch touching `domain` fails once.
    pub async fn fail_next_fetch(&self, domain: Domain) {
        self.inner.lock().await.failing_fetches.insert(domain);
    }

    pub async fn fail_next_mark_read(&self) {
        self.inner.lock().await.fail_next_mark_read = true;
    }

    pub async fn set_fetch_delay(&self, domain: Domain, delay: Duration) {
        self.inner.lock().await.fetch_delays.insert(domain, delay);
    }

    pub async fn set_mark_read_delay(&self, delay: Option<Duration>) {
        self.inner.lock().await.mark_read_delay = delay;
    }

    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn mark_all_read_calls(&self) -> usize {
        self.mark_all_read_calls.load(Ordering::SeqCst)
    }

    async fn begin_fetch(&self, domain: Domain) -> Result<(), TransportError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = {
            let mut inner = self.inner.lock().await;
            if inner.offline || inner.failing_fetches.remove(&domain) {
                return Err(offline_error());
            }
            inner.fetch_delays.get(&domain).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn select(&self, predicate: impl Fn(&Record) -> bool) -> Vec<Record> {
        let inner = self.inner.lock().await;
        let mut records = inner
            .records
            .values()
            .filter(|record| predicate(record))
            .cloned()
            .collect::<Vec<_>>();
        records.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        records
    }

    async fn check_online(&self) -> Result<(), TransportError> {
        if self.inner.lock().await.offline {
            return Err(offline_error());
        }
        Ok(())
    }
}

fn offline_error() -> TransportError {
    TransportError::Request {
        message: "memory record store offline".to_string(),
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_records(
        &self,
        owner_id: &str,
        domain: Domain,
    ) -> Result<Vec<Record>, TransportError> {
        self.begin_fetch(domain).await?;
        Ok(self
            .select(|record| record.owner_id == owner_id && record.domain == domain)
            .await)
    }

    async fn fetch_domain(&self, domain: Domain) -> Result<Vec<Record>, TransportError> {
        self.begin_fetch(domain).await?;
        Ok(self.select(|record| record.domain == domain).await)
    }

    async fn mark_all_read(&self, owner_id: &str, domain: Domain) -> Result<(), TransportError> {
        self.mark_all_read_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.inner.lock().await.mark_read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().await;
        if inner.offline {
            return Err(offline_error());
        }
        if std::mem::take(&mut inner.fail_next_mark_read) {
            return Err(TransportError::Http {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: "injected mark_all_read failure".to_string(),
            });
        }
        for record in inner.records.values_mut().filter(|record| {
            record.owner_id == owner_id && record.domain == domain && !record.read_by_owner
        }) {
            record.read_by_owner = true;
        }
        Ok(())
    }

    async fn mark_all_read_by_operator(&self, domain: Domain) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        if inner.offline {
            return Err(offline_error());
        }
        for record in inner
            .records
            .values_mut()
            .filter(|record| record.domain == domain && !record.read_by_operator)
        {
            record.read_by_operator = true;
        }
        Ok(())
    }

    async fn mark_one_unread(
        &self,
        record_id: &str,
        domain: Domain,
        side: ReadSide,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        if inner.offline {
            return Err(offline_error());
        }
        let record = inner
            .records
            .get_mut(record_id)
            .filter(|record| record.domain == domain)
            .ok_or_else(|| TransportError::NotFound {
                record_id: record_id.to_string(),
            })?;
        record.set_read(side, false);
        Ok(())
    }

    async fn apply_action(
        &self,
        record_id: &str,
        domain: Domain,
        actor: ActorRole,
        action: RecordAction,
        status: Option<&str>,
    ) -> Result<Record, TransportError> {
        let mut inner = self.inner.lock().await;
        if inner.offline {
            return Err(offline_error());
        }
        let record = inner
            .records
            .get_mut(record_id)
            .filter(|record| record.domain == domain)
            .ok_or_else(|| TransportError::NotFound {
                record_id: record_id.to_string(),
            })?;
        record.apply_action(actor, action);
        if let Some(status) = status {
            record.status = status.to_string();
        }
        Ok(record.clone())
    }

    async fn create_record(
        &self,
        record: NewRecord,
        actor: ActorRole,
    ) -> Result<Record, TransportError> {
        self.check_online().await?;
        let record = record.into_record(
            format!("rec_{}", Uuid::new_v4().simple()),
            actor,
            Utc::now(),
        );
        self.insert(record.clone()).await;
        Ok(record)
    }
}
