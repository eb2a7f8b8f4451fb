//! Result types handed back to the API layer

use crate::{CacheEntry, FieldType, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A ranked autocomplete candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub value: String,
    pub frequency: u64,
    pub last_used_at: Timestamp,
}

impl From<CacheEntry> for Suggestion {
    fn from(entry: CacheEntry) -> Self {
        Self {
            value: entry.value,
            frequency: entry.frequency,
            last_used_at: entry.last_used_at,
        }
    }
}

/// A top entry in cache statistics. Unlike [`Suggestion`] it names its field type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopValue {
    pub field_type: FieldType,
    pub value: String,
    pub frequency: u64,
    pub last_used_at: Timestamp,
}

impl From<CacheEntry> for TopValue {
    fn from(entry: CacheEntry) -> Self {
        Self {
            field_type: entry.field_type,
            value: entry.value,
            frequency: entry.frequency,
            last_used_at: entry.last_used_at,
        }
    }
}

/// Per-field-type aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTypeStats {
    pub count: usize,
    pub total_frequency: u64,
}

/// Snapshot of one tenant's cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub total_entries: usize,
    pub by_field_type: BTreeMap<FieldType, FieldTypeStats>,
    pub top_values: Vec<TopValue>,
}

/// What `record_usage` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// The value was blank after trimming; nothing was written.
    Skipped,
    /// The entry was created or incremented.
    Recorded {
        value: String,
        frequency: u64,
        /// Entries evicted from the scope by the capacity check.
        evicted: usize,
    },
}

impl RecordOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }

    /// Frequency after the write, if anything was written.
    pub fn frequency(&self) -> Option<u64> {
        match self {
            Self::Recorded { frequency, .. } => Some(*frequency),
            Self::Skipped => None,
        }
    }
}

/// Number of entries a backfill newly created, per field type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackfillReport {
    created: BTreeMap<FieldType, usize>,
}

impl BackfillReport {
    /// A report that lists every given field type with a zero count.
    pub fn with_field_types<I>(field_types: I) -> Self
    where
        I: IntoIterator<Item = FieldType>,
    {
        Self {
            created: field_types.into_iter().map(|ft| (ft, 0)).collect(),
        }
    }

    pub fn add_created(&mut self, field_type: &FieldType) {
        *self.created.entry(field_type.clone()).or_default() += 1;
    }

    pub fn created(&self, field_type: &str) -> usize {
        self.created.get(field_type).copied().unwrap_or(0)
    }

    pub fn total_created(&self) -> usize {
        self.created.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldType, usize)> {
        self.created.iter().map(|(ft, n)| (ft, *n))
    }
}
