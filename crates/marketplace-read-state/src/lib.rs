//! Unread counts per marketplace domain, mark-as-read on panel focus, and the
//! in-process bus that tells independent views to re-query.
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod aggregator;
pub mod badge;
pub mod bus;
pub mod count;
pub mod focus;
pub mod operator;
pub mod session;
pub mod source;

pub use aggregator::{UnreadAggregator, UnreadSlot};
pub use badge::{BadgeScope, UnreadBadge};
pub use bus::{NotificationBus, PublishReport, SubscriberError, Subscription};
pub use count::{UnreadCount, unread_count};
pub use focus::{FocusCoordinator, FocusTransition, MarkReadOutcome, MarkReadTask, Panel};
pub use operator::OperatorDesk;
pub use session::DashboardSession;
pub use source::{DomainLoad, DomainReadStateSource};
