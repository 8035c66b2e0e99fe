//! Request records and the domains they belong to.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transition::{ActorRole, FlagTransition, RecordAction, transition};

/// Independent request categories shown on the owner dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Orders,
    Fabrication,
    Recycling,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Orders, Domain::Fabrication, Domain::Recycling];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Fabrication => "fabrication",
            Self::Recycling => "recycling",
        }
    }

    /// Backing table in the managed data store.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Fabrication => "fabrication_requests",
            Self::Recycling => "recycling_requests",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown domain: {0}")]
pub struct UnknownDomain(pub String);

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "orders" | "order" => Ok(Self::Orders),
            "fabrication" | "fabrication_requests" => Ok(Self::Fabrication),
            "recycling" | "recycling_requests" => Ok(Self::Recycling),
            other => Err(UnknownDomain(other.to_string())),
        }
    }
}

/// Which party's acknowledgement a read flag tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSide {
    Owner,
    Operator,
}

impl ReadSide {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Operator => "operator",
        }
    }

    /// Column holding this side's flag.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Owner => "read_by_owner",
            Self::Operator => "read_by_operator",
        }
    }

    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Owner => Self::Operator,
            Self::Operator => Self::Owner,
        }
    }
}

/// A request record as stored for one owner in one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub owner_id: String,
    pub domain: Domain,
    pub status: String,
    pub read_by_owner: bool,
    pub read_by_operator: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

impl Record {
    #[must_use]
    pub fn is_read_by(&self, side: ReadSide) -> bool {
        match side {
            ReadSide::Owner => self.read_by_owner,
            ReadSide::Operator => self.read_by_operator,
        }
    }

    pub fn set_read(&mut self, side: ReadSide, read: bool) {
        match side {
            ReadSide::Owner => self.read_by_owner = read,
            ReadSide::Operator => self.read_by_operator = read,
        }
    }

    pub fn apply(&mut self, change: FlagTransition) {
        for (side, read) in change.assignments() {
            self.set_read(side, read);
        }
    }

    pub fn apply_action(&mut self, actor: ActorRole, action: RecordAction) {
        self.apply(transition(actor, action));
    }
}

/// Submission data for a record that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub owner_id: String,
    pub domain: Domain,
    pub status: String,
    pub payload: Value,
}

impl NewRecord {
    #[must_use]
    pub fn new(owner_id: impl Into<String>, domain: Domain) -> Self {
        Self {
            owner_id: owner_id.into(),
            domain,
            status: "pending".to_string(),
            payload: Value::Null,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Materializes the record with flags initialised for the creating actor.
    #[must_use]
    pub fn into_record(self, id: String, actor: ActorRole, created_at: DateTime<Utc>) -> Record {
        let mut record = Record {
            id,
            owner_id: self.owner_id,
            domain: self.domain,
            status: self.status,
            read_by_owner: true,
            read_by_operator: true,
            created_at,
            payload: self.payload,
        };
        record.apply_action(actor, RecordAction::Create);
        record
    }
}
