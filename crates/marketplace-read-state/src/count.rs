//! Tri-state unread counts.

use std::fmt;

use marketplace_records::{ReadSide, Record};
use serde::Serialize;

/// Unread count for a domain as last observed.
///
/// `Known(0)` means caught up. `Unknown` means the last load failed or has not
/// run yet, and must never be shown as caught up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "count", rename_all = "snake_case")]
pub enum UnreadCount {
    #[default]
    Unknown,
    Known(usize),
}

impl UnreadCount {
    #[must_use]
    pub const fn known(self) -> Option<usize> {
        match self {
            Self::Known(count) => Some(count),
            Self::Unknown => None,
        }
    }

    #[must_use]
    pub const fn has_unread(self) -> bool {
        matches!(self, Self::Known(count) if count > 0)
    }

    #[must_use]
    pub const fn is_caught_up(self) -> bool {
        matches!(self, Self::Known(0))
    }

    /// Any unknown part makes the total unknown.
    #[must_use]
    pub fn sum(counts: impl IntoIterator<Item = UnreadCount>) -> UnreadCount {
        counts
            .into_iter()
            .try_fold(0_usize, |total, count| {
                count.known().map(|count| total.saturating_add(count))
            })
            .map_or(Self::Unknown, Self::Known)
    }
}

impl fmt::Display for UnreadCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(count) => write!(f, "{count}"),
            Self::Unknown => f.write_str("?"),
        }
    }
}

/// Number of records whose `side` flag is still false.
#[must_use]
pub fn unread_count(records: &[Record], side: ReadSide) -> usize {
    records
        .iter()
        .filter(|record| !record.is_read_by(side))
        .count()
}
