//! Navigation-bar unread badge that follows the bus independently of any
//! dashboard session.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use marketplace_records::{Domain, ReadSide, SharedRecordStore};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::bus::{NotificationBus, SubscriberError, Subscription};
use crate::count::{UnreadCount, unread_count};

/// Whose unread records the badge counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeScope {
    /// Owner-side unread across the owner's three domains.
    Owner(String),
    /// Operator-side unread across all owners.
    Operator,
}

impl BadgeScope {
    #[must_use]
    pub fn side(&self) -> ReadSide {
        match self {
            Self::Owner(_) => ReadSide::Owner,
            Self::Operator => ReadSide::Operator,
        }
    }

    async fn load(&self, store: &SharedRecordStore, domain: Domain) -> UnreadCount {
        let result = match self {
            Self::Owner(owner_id) => store.fetch_records(owner_id, domain).await,
            Self::Operator => store.fetch_domain(domain).await,
        };
        match result {
            Ok(records) => UnreadCount::Known(unread_count(&records, self.side())),
            Err(error) => {
                tracing::warn!(%domain, scope = ?self, reason = %error, "badge load failed");
                UnreadCount::Unknown
            }
        }
    }

    async fn total(&self, store: &SharedRecordStore) -> UnreadCount {
        UnreadCount::sum(
            join_all(Domain::ALL.iter().map(|domain| self.load(store, *domain))).await,
        )
    }
}

struct BadgeState {
    scope: BadgeScope,
    store: SharedRecordStore,
    sender: watch::Sender<UnreadCount>,
    issued: AtomicU64,
}

impl BadgeState {
    /// Later refreshes win over earlier ones that settle after them.
    async fn refresh(&self) -> UnreadCount {
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let count = self.scope.total(&self.store).await;
        if self.issued.load(Ordering::SeqCst) == ticket {
            self.sender.send_replace(count);
        }
        count
    }
}

/// Unread total for one scope, re-derived from the store on every bus signal.
///
/// Dropping the badge detaches it from the bus.
pub struct UnreadBadge {
    state: Arc<BadgeState>,
    _subscription: Subscription,
}

impl UnreadBadge {
    pub fn attach(bus: &NotificationBus, store: SharedRecordStore, scope: BadgeScope) -> Self {
        let (sender, _) = watch::channel(UnreadCount::Unknown);
        let state = Arc::new(BadgeState {
            scope,
            store,
            sender,
            issued: AtomicU64::new(0),
        });
        let handler_state = Arc::clone(&state);
        let subscription = bus.subscribe(move || {
            let runtime = Handle::try_current()
                .map_err(|_| SubscriberError::failed("badge refresh needs an async runtime"))?;
            let state = Arc::clone(&handler_state);
            runtime.spawn(async move {
                state.refresh().await;
            });
            Ok(())
        });
        Self {
            state,
            _subscription: subscription,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &BadgeScope {
        &self.state.scope
    }

    /// Re-queries the store now and updates watchers.
    pub async fn refresh(&self) -> UnreadCount {
        self.state.refresh().await
    }

    #[must_use]
    pub fn current(&self) -> UnreadCount {
        *self.state.sender.borrow()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<UnreadCount> {
        self.state.sender.subscribe()
    }
}
