//! Larder Core - Suggestion Cache Types
//!
//! Data structures shared by the store, the frequency tracker, and the
//! backfill. This crate holds no storage or ranking logic.

pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod identity;
pub mod inventory;
pub mod suggestion;

pub use clock::{Clock, SystemClock};
pub use config::SuggestConfig;
pub use entry::{CacheEntry, FieldType};
pub use error::{ConfigError, LarderError, LarderResult, StorageError, ValidationError};
pub use identity::{EntryId, LocationId, TenantId, Timestamp};
pub use inventory::{InventoryRecord, InventorySource, LocationGraph, LocationNode};
pub use suggestion::{
    BackfillReport, CacheStatistics, FieldTypeStats, RecordOutcome, Suggestion, TopValue,
};

/// Trim a user-supplied value. Returns `None` when nothing is left.
pub fn normalize_value(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
