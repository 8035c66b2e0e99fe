//! Read-flag transition table.
//!
//! Every mutation of a record is described by who performed it and what they
//! did. The table below decides which side's flag is marked read and which
//! side is re-armed (marked unread) so it has to acknowledge the new state.

use crate::record::ReadSide;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorRole {
    Owner,
    Operator,
}

impl ActorRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Operator => "operator",
        }
    }

    /// The read flag this actor acknowledges by acting.
    #[must_use]
    pub const fn side(self) -> ReadSide {
        match self {
            Self::Owner => ReadSide::Owner,
            Self::Operator => ReadSide::Operator,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordAction {
    Create,
    View,
    StatusChange,
}

impl RecordAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::View => "view",
            Self::StatusChange => "status_change",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagTransition {
    pub mark_read: Option<ReadSide>,
    pub mark_unread: Option<ReadSide>,
}

impl FlagTransition {
    /// Flag assignments in application order: read first, then unread.
    pub fn assignments(self) -> impl Iterator<Item = (ReadSide, bool)> {
        self.mark_read
            .map(|side| (side, true))
            .into_iter()
            .chain(self.mark_unread.map(|side| (side, false)))
    }
}

pub const TRANSITIONS: [(ActorRole, RecordAction, FlagTransition); 6] = [
    (
        ActorRole::Owner,
        RecordAction::Create,
        FlagTransition {
            mark_read: Some(ReadSide::Owner),
            mark_unread: Some(ReadSide::Operator),
        },
    ),
    (
        ActorRole::Owner,
        RecordAction::View,
        FlagTransition {
            mark_read: Some(ReadSide::Owner),
            mark_unread: None,
        },
    ),
    (
        ActorRole::Owner,
        RecordAction::StatusChange,
        FlagTransition {
            mark_read: Some(ReadSide::Owner),
            mark_unread: Some(ReadSide::Operator),
        },
    ),
    (
        ActorRole::Operator,
        RecordAction::Create,
        FlagTransition {
            mark_read: Some(ReadSide::Operator),
            mark_unread: Some(ReadSide::Owner),
        },
    ),
    (
        ActorRole::Operator,
        RecordAction::View,
        FlagTransition {
            mark_read: Some(ReadSide::Operator),
            mark_unread: None,
        },
    ),
    (
        ActorRole::Operator,
        RecordAction::StatusChange,
        FlagTransition {
            mark_read: Some(ReadSide::Operator),
            mark_unread: Some(ReadSide::Owner),
        },
    ),
];

/// Looks up the flag change for an actor performing an action.
#[must_use]
pub fn transition(actor: ActorRole, action: RecordAction) -> FlagTransition {
    TRANSITIONS
        .iter()
        .find(|(row_actor, row_action, _)| *row_actor == actor && *row_action == action)
        .map(|(_, _, change)| *change)
        // Every pair has a row.
        .unwrap_or(FlagTransition {
            mark_read: Some(actor.side()),
            mark_unread: None,
        })
}
