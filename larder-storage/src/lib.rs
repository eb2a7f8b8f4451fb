//! Larder Storage - Suggestion Cache Store
//!
//! Defines the persistence contract the frequency tracker consumes, plus an
//! in-memory implementation for tests and embedded use and a durable
//! LMDB-backed implementation.

pub mod entry_key;
pub mod lmdb_backend;

pub use entry_key::EntryKey;
pub use lmdb_backend::{LmdbStoreError, LmdbSuggestionStore};

use larder_core::{
    CacheEntry, EntryId, FieldType, LarderResult, StorageError, TenantId, Timestamp,
};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

// ============================================================================
// QUERY TYPES
// ============================================================================

/// Selection criteria for [`SuggestionStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    /// Restrict to one field type; `None` selects every field type of the tenant.
    pub field_type: Option<FieldType>,
    /// Lowercased substring the value must contain.
    contains_lower: Option<String>,
    /// Inclusive lower bound on frequency.
    pub min_frequency: u64,
    /// Exclusive upper bound on frequency.
    pub below_frequency: Option<u64>,
}

impl EntryFilter {
    /// Every entry of the tenant.
    pub fn all() -> Self {
        Self {
            field_type: None,
            contains_lower: None,
            min_frequency: 1,
            below_frequency: None,
        }
    }

    /// Every entry of one field type.
    pub fn field(field_type: FieldType) -> Self {
        Self {
            field_type: Some(field_type),
            ..Self::all()
        }
    }

    /// Restrict to `field_type` when given.
    pub fn scoped(field_type: Option<FieldType>) -> Self {
        Self {
            field_type,
            ..Self::all()
        }
    }

    /// Case-insensitive substring filter. Only the empty query matches
    /// everything; whitespace is part of the needle.
    pub fn containing(mut self, query: &str) -> Self {
        self.contains_lower = (!query.is_empty()).then(|| query.to_lowercase());
        self
    }

    pub fn min_frequency(mut self, min_frequency: u64) -> Self {
        self.min_frequency = min_frequency;
        self
    }

    pub fn below_frequency(mut self, threshold: u64) -> Self {
        self.below_frequency = Some(threshold);
        self
    }

    pub fn matches(&self, entry: &CacheEntry) -> bool {
        if let Some(field_type) = &self.field_type {
            if &entry.field_type != field_type {
                return false;
            }
        }
        if entry.frequency < self.min_frequency {
            return false;
        }
        if let Some(threshold) = self.below_frequency {
            if entry.frequency >= threshold {
                return false;
            }
        }
        match &self.contains_lower {
            Some(needle) => entry.matches_lowercase(needle),
            None => true,
        }
    }
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Ranking order: frequency descending, then most recently used first.
///
/// The value breaks any remaining tie so results are deterministic.
pub fn rank_order(a: &CacheEntry, b: &CacheEntry) -> Ordering {
    b.frequency
        .cmp(&a.frequency)
        .then_with(|| b.last_used_at.cmp(&a.last_used_at))
        .then_with(|| a.value.cmp(&b.value))
}

/// Eviction order: least frequently used first, oldest use breaking ties.
pub fn eviction_order(a: &CacheEntry, b: &CacheEntry) -> Ordering {
    a.frequency
        .cmp(&b.frequency)
        .then_with(|| a.last_used_at.cmp(&b.last_used_at))
        .then_with(|| a.value.cmp(&b.value))
}

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Persistence contract for suggestion cache entries.
///
/// Every method is scoped by tenant. Timestamps are passed in by the caller;
/// implementations never consult a clock.
///
/// `upsert_increment` and `create_if_absent` must be atomic per key under
/// concurrent callers: two racing calls for the same key may neither lose an
/// increment nor create a duplicate entry.
pub trait SuggestionStore: Send + Sync {
    /// Exact, case-sensitive lookup.
    fn find_one(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
    ) -> LarderResult<Option<CacheEntry>>;

    /// Create the entry with frequency 1, or increment it and set `last_used_at`.
    fn upsert_increment(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
        at: Timestamp,
    ) -> LarderResult<CacheEntry>;

    /// Entries matching `filter`, in [`rank_order`].
    fn list(&self, tenant_id: TenantId, filter: &EntryFilter) -> LarderResult<Vec<CacheEntry>>;

    /// Number of entries in one (tenant, field type) scope.
    fn count(&self, tenant_id: TenantId, field_type: &FieldType) -> LarderResult<usize>;

    /// Delete the named entries of this tenant. Unknown ids are ignored.
    /// Returns how many entries were removed.
    fn delete_many(&self, tenant_id: TenantId, ids: &[EntryId]) -> LarderResult<usize>;

    /// Insert an entry with the given frequency unless the key already exists.
    /// Returns `true` if an entry was created.
    fn create_if_absent(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
        frequency: u64,
        at: Timestamp,
    ) -> LarderResult<bool>;
}

impl<S: SuggestionStore + ?Sized> SuggestionStore for Arc<S> {
    fn find_one(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
    ) -> LarderResult<Option<CacheEntry>> {
        (**self).find_one(tenant_id, field_type, value)
    }

    fn upsert_increment(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
        at: Timestamp,
    ) -> LarderResult<CacheEntry> {
        (**self).upsert_increment(tenant_id, field_type, value, at)
    }

    fn list(&self, tenant_id: TenantId, filter: &EntryFilter) -> LarderResult<Vec<CacheEntry>> {
        (**self).list(tenant_id, filter)
    }

    fn count(&self, tenant_id: TenantId, field_type: &FieldType) -> LarderResult<usize> {
        (**self).count(tenant_id, field_type)
    }

    fn delete_many(&self, tenant_id: TenantId, ids: &[EntryId]) -> LarderResult<usize> {
        (**self).delete_many(tenant_id, ids)
    }

    fn create_if_absent(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
        frequency: u64,
        at: Timestamp,
    ) -> LarderResult<bool> {
        (**self).create_if_absent(tenant_id, field_type, value, frequency, at)
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory store. Every mutation runs under a single write lock, which
/// makes the per-key operations atomic.
#[derive(Debug, Default)]
pub struct InMemorySuggestionStore {
    entries: Arc<RwLock<HashMap<EntryKey, CacheEntry>>>,
}

impl InMemorySuggestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries across all tenants.
    pub fn len(&self) -> LarderResult<usize> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> LarderResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Put an entry as-is, replacing any entry with the same key.
    ///
    /// Lets callers seed exact frequencies and timestamps.
    pub fn insert_entry(&self, entry: CacheEntry) -> LarderResult<()> {
        let key = EntryKey::new(entry.tenant_id, entry.field_type.clone(), entry.value.clone());
        self.entries
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .insert(key, entry);
        Ok(())
    }
}

impl SuggestionStore for InMemorySuggestionStore {
    fn find_one(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
    ) -> LarderResult<Option<CacheEntry>> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        let key = EntryKey::new(tenant_id, field_type.clone(), value);
        Ok(entries.get(&key).cloned())
    }

    fn upsert_increment(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
        at: Timestamp,
    ) -> LarderResult<CacheEntry> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        let key = EntryKey::new(tenant_id, field_type.clone(), value);
        let entry = entries
            .entry(key)
            .and_modify(|entry| entry.touch(at))
            .or_insert_with(|| CacheEntry::new(tenant_id, field_type.clone(), value, 1, at));
        Ok(entry.clone())
    }

    fn list(&self, tenant_id: TenantId, filter: &EntryFilter) -> LarderResult<Vec<CacheEntry>> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut selected: Vec<CacheEntry> = entries
            .values()
            .filter(|entry| entry.tenant_id == tenant_id && filter.matches(entry))
            .cloned()
            .collect();
        selected.sort_by(rank_order);
        Ok(selected)
    }

    fn count(&self, tenant_id: TenantId, field_type: &FieldType) -> LarderResult<usize> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries
            .keys()
            .filter(|key| key.tenant_id() == tenant_id && key.field_type() == field_type)
            .count())
    }

    fn delete_many(&self, tenant_id: TenantId, ids: &[EntryId]) -> LarderResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let wanted: HashSet<EntryId> = ids.iter().copied().collect();
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| !(entry.tenant_id == tenant_id && wanted.contains(&entry.entry_id)));
        Ok(before - entries.len())
    }

    fn create_if_absent(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
        frequency: u64,
        at: Timestamp,
    ) -> LarderResult<bool> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        let key = EntryKey::new(tenant_id, field_type.clone(), value);
        if entries.contains_key(&key) {
            return Ok(false);
        }
        entries.insert(
            key,
            CacheEntry::new(tenant_id, field_type.clone(), value, frequency, at),
        );
        Ok(true)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::thread;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).single().expect("valid timestamp")
    }

    fn tenant() -> TenantId {
        TenantId::new(1)
    }

    fn seed(
        store: &InMemorySuggestionStore,
        field_type: &FieldType,
        value: &str,
        frequency: u64,
        last_used_at: Timestamp,
    ) {
        let mut entry = CacheEntry::new(tenant(), field_type.clone(), value, frequency, t0());
        entry.last_used_at = last_used_at;
        store.insert_entry(entry).expect("insert should succeed");
    }

    #[test]
    fn test_upsert_creates_then_increments() {
        let store = InMemorySuggestionStore::new();
        let ft = FieldType::category();

        let first = store
            .upsert_increment(tenant(), &ft, "Food", t0())
            .expect("upsert should succeed");
        assert_eq!(first.frequency, 1);

        let later = t0() + Duration::minutes(5);
        let second = store
            .upsert_increment(tenant(), &ft, "Food", later)
            .expect("upsert should succeed");
        assert_eq!(second.frequency, 2);
        assert_eq!(second.last_used_at, later);
        assert_eq!(second.created_at, t0());
        assert_eq!(second.entry_id, first.entry_id);
        assert_eq!(store.count(tenant(), &ft).expect("count"), 1);
    }

    #[test]
    fn test_find_one_is_case_sensitive() {
        let store = InMemorySuggestionStore::new();
        let ft = FieldType::category();
        store.upsert_increment(tenant(), &ft, "Food", t0()).expect("upsert");

        assert!(store.find_one(tenant(), &ft, "Food").expect("find").is_some());
        assert!(store.find_one(tenant(), &ft, "food").expect("find").is_none());
    }

    #[test]
    fn test_tenants_are_isolated() {
        let store = InMemorySuggestionStore::new();
        let ft = FieldType::unit();
        store.upsert_increment(TenantId::new(1), &ft, "kg", t0()).expect("upsert");
        store.upsert_increment(TenantId::new(2), &ft, "kg", t0()).expect("upsert");

        let listed = store.list(TenantId::new(1), &EntryFilter::field(ft.clone())).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].frequency, 1);
        assert_eq!(store.count(TenantId::new(3), &ft).expect("count"), 0);
    }

    #[test]
    fn test_list_orders_by_frequency_then_recency() {
        let store = InMemorySuggestionStore::new();
        let ft = FieldType::category();
        seed(&store, &ft, "A", 5, t0());
        seed(&store, &ft, "C", 3, t0());
        seed(&store, &ft, "D", 3, t0() + Duration::hours(1));
        seed(&store, &ft, "E", 1, t0());

        let values: Vec<String> = store
            .list(tenant(), &EntryFilter::field(ft))
            .expect("list")
            .into_iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(values, vec!["A", "D", "C", "E"]);
    }

    #[test]
    fn test_list_filters() {
        let store = InMemorySuggestionStore::new();
        let ft = FieldType::location_path();
        seed(&store, &ft, "Kitchen > Fridge", 4, t0());
        seed(&store, &ft, "Kitchen > Pantry", 1, t0());
        seed(&store, &ft, "Garage", 9, t0());
        seed(&store, &FieldType::category(), "Kitchenware", 2, t0());

        let filter = EntryFilter::field(ft.clone()).containing("KITCHEN");
        assert_eq!(store.list(tenant(), &filter).expect("list").len(), 2);

        let filter = EntryFilter::field(ft.clone()).containing("kitchen").min_frequency(2);
        let listed = store.list(tenant(), &filter).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].value, "Kitchen > Fridge");

        let all_low = EntryFilter::all().below_frequency(3);
        assert_eq!(store.list(tenant(), &all_low).expect("list").len(), 2);
    }

    #[test]
    fn test_containing_does_not_trim_query() {
        let store = InMemorySuggestionStore::new();
        let ft = FieldType::location_path();
        seed(&store, &ft, "Kitchen", 5, t0());
        seed(&store, &ft, "Kitchen > Fridge", 1, t0());

        let trailing = EntryFilter::field(ft.clone()).containing("Kitchen ");
        let listed = store.list(tenant(), &trailing).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].value, "Kitchen > Fridge");

        let blank = EntryFilter::field(ft.clone()).containing("  ");
        assert!(store.list(tenant(), &blank).expect("list").is_empty());

        let empty = EntryFilter::field(ft).containing("");
        assert_eq!(store.list(tenant(), &empty).expect("list").len(), 2);
    }

    #[test]
    fn test_delete_many_only_removes_named_entries_of_tenant() {
        let store = InMemorySuggestionStore::new();
        let ft = FieldType::unit();
        let kg = store.upsert_increment(tenant(), &ft, "kg", t0()).expect("upsert");
        store.upsert_increment(tenant(), &ft, "g", t0()).expect("upsert");
        let other = store
            .upsert_increment(TenantId::new(2), &ft, "kg", t0())
            .expect("upsert");

        let removed = store
            .delete_many(tenant(), &[kg.entry_id, other.entry_id, EntryId::now_v7()])
            .expect("delete");
        assert_eq!(removed, 1);
        assert_eq!(store.count(tenant(), &ft).expect("count"), 1);
        assert_eq!(store.count(TenantId::new(2), &ft).expect("count"), 1);
        assert_eq!(store.delete_many(tenant(), &[]).expect("delete"), 0);
    }

    #[test]
    fn test_create_if_absent_never_overwrites() {
        let store = InMemorySuggestionStore::new();
        let ft = FieldType::category();
        store.upsert_increment(tenant(), &ft, "Food", t0()).expect("upsert");

        assert!(!store.create_if_absent(tenant(), &ft, "Food", 40, t0()).expect("create"));
        assert!(store.create_if_absent(tenant(), &ft, "Tools", 7, t0()).expect("create"));

        let food = store.find_one(tenant(), &ft, "Food").expect("find").expect("present");
        assert_eq!(food.frequency, 1);
        let tools = store.find_one(tenant(), &ft, "Tools").expect("find").expect("present");
        assert_eq!(tools.frequency, 7);
    }

    #[test]
    fn test_concurrent_upserts_do_not_lose_increments() {
        let store = Arc::new(InMemorySuggestionStore::new());
        let ft = FieldType::category();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let ft = ft.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        store
                            .upsert_increment(tenant(), &ft, "Food", Utc::now())
                            .expect("upsert should succeed");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread should not panic");
        }

        assert_eq!(store.count(tenant(), &ft).expect("count"), 1);
        let entry = store.find_one(tenant(), &ft, "Food").expect("find").expect("present");
        assert_eq!(entry.frequency, 400);
    }

    #[test]
    fn test_eviction_order_puts_least_used_oldest_first() {
        let ft = FieldType::category();
        let mut old = CacheEntry::new(tenant(), ft.clone(), "old", 1, t0());
        old.last_used_at = t0();
        let mut recent = CacheEntry::new(tenant(), ft.clone(), "recent", 1, t0());
        recent.last_used_at = t0() + Duration::seconds(1);
        let busy = CacheEntry::new(tenant(), ft, "busy", 9, t0());

        let mut entries = vec![busy, recent, old];
        entries.sort_by(eviction_order);
        let values: Vec<&str> = entries.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["old", "recent", "busy"]);
    }
}
