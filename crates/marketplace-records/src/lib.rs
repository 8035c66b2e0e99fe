//! Marketplace request records, their read flags, and record store backends.
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod memory;
pub mod record;
pub mod rest;
pub mod store;
pub mod transition;

pub use config::{ConfigError, RecordStoreConfig};
pub use memory::MemoryRecordStore;
pub use record::{Domain, NewRecord, ReadSide, Record, UnknownDomain};
pub use rest::RestRecordStore;
pub use store::{RecordStore, SharedRecordStore, TransportError};
pub use transition::{ActorRole, FlagTransition, RecordAction, TRANSITIONS, transition};
