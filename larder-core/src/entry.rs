//! The cache entry and its field-type tag

use crate::{EntryId, TenantId, Timestamp};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Name of a suggestion category.
///
/// Field types are open-ended: any string is valid. The well-known ones used
/// by the inventory forms have constructors below.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldType(String);

impl FieldType {
    pub const CATEGORY: &'static str = "category";
    pub const UNIT: &'static str = "unit";
    pub const LOCATION_PATH: &'static str = "location_path";
    pub const NAME_PREFIX: &'static str = "name_prefix";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Item category (Food, Tools, Cleaning, ...).
    pub fn category() -> Self {
        Self::new(Self::CATEGORY)
    }

    /// Unit of measure (kg, liter, count, ...).
    pub fn unit() -> Self {
        Self::new(Self::UNIT)
    }

    /// Full storage location path ("Kitchen > Fridge > Top Shelf").
    pub fn location_path() -> Self {
        Self::new(Self::LOCATION_PATH)
    }

    /// Common item name prefixes.
    pub fn name_prefix() -> Self {
        Self::new(Self::NAME_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for FieldType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FieldType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A cached suggestion value with its usage frequency.
///
/// At most one entry exists per `(tenant_id, field_type, value)`; the store
/// that owns the entry enforces that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub entry_id: EntryId,
    pub tenant_id: TenantId,
    pub field_type: FieldType,
    /// Trimmed value. Exact lookups are case-sensitive.
    pub value: String,
    /// Usage count, always >= 1.
    pub frequency: u64,
    pub last_used_at: Timestamp,
    pub created_at: Timestamp,
}

impl CacheEntry {
    /// Create a fresh entry first seen at `at`.
    pub fn new(
        tenant_id: TenantId,
        field_type: FieldType,
        value: impl Into<String>,
        frequency: u64,
        at: Timestamp,
    ) -> Self {
        Self {
            entry_id: EntryId::now_v7(),
            tenant_id,
            field_type,
            value: value.into(),
            frequency: frequency.max(1),
            last_used_at: at,
            created_at: at,
        }
    }

    /// Record one more use at `at`.
    pub fn touch(&mut self, at: Timestamp) {
        self.frequency = self.frequency.saturating_add(1);
        self.last_used_at = at;
    }

    /// Case-insensitive substring match used for suggestion filtering.
    ///
    /// `needle_lower` must already be lowercased.
    pub fn matches_lowercase(&self, needle_lower: &str) -> bool {
        needle_lower.is_empty() || self.value.to_lowercase().contains(needle_lower)
    }
}
