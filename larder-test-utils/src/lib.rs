//! Larder Test Utilities
//!
//! Centralized test infrastructure for the Larder workspace:
//! - Proptest generators for cache entry inputs
//! - A manually advanced clock
//! - In-memory inventory and location fixtures
//! - A store that fails every call
//! - Custom assertions for cache-specific validation

// Re-export the in-memory store from its source crate
pub use larder_storage::InMemorySuggestionStore;

// Re-export core types for convenience
pub use larder_core::{
    CacheEntry, Clock, EntryId, FieldType, InventoryRecord, InventorySource, LarderError,
    LarderResult, LocationGraph, LocationId, LocationNode, StorageError, SuggestConfig, TenantId,
    Timestamp,
};

use chrono::Duration;
use larder_storage::{EntryFilter, SuggestionStore};
use std::collections::HashMap;
use std::sync::Mutex;

// ============================================================================
// CLOCK
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += step;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================================================
// INVENTORY FIXTURES
// ============================================================================

/// In-memory inventory grouped by tenant.
#[derive(Debug, Clone, Default)]
pub struct InventoryFixture {
    records: HashMap<TenantId, Vec<InventoryRecord>>,
    failure: Option<String>,
}

impl InventoryFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose every read fails with `SourceUnavailable`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            records: HashMap::new(),
            failure: Some(reason.into()),
        }
    }

    pub fn with(mut self, tenant_id: TenantId, record: InventoryRecord) -> Self {
        self.push(tenant_id, record);
        self
    }

    pub fn push(&mut self, tenant_id: TenantId, record: InventoryRecord) {
        self.records.entry(tenant_id).or_default().push(record);
    }
}

impl InventorySource for InventoryFixture {
    fn records(&self, tenant_id: TenantId) -> LarderResult<Vec<InventoryRecord>> {
        if let Some(reason) = &self.failure {
            return Err(StorageError::SourceUnavailable {
                reason: reason.clone(),
            }
            .into());
        }
        Ok(self.records.get(&tenant_id).cloned().unwrap_or_default())
    }
}

/// In-memory location tree.
#[derive(Debug, Clone, Default)]
pub struct LocationFixture {
    nodes: HashMap<LocationId, LocationNode>,
}

impl LocationFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, node: LocationNode) -> Self {
        self.nodes.insert(node.id, node);
        self
    }

    /// A straight chain `names[0] > names[1] > ...` with ids starting at
    /// `first_id`. Returns the fixture and the id of the deepest node.
    pub fn chain(first_id: i64, names: &[&str]) -> (Self, LocationId) {
        let mut fixture = Self::new();
        let mut parent: Option<LocationId> = None;
        let mut last = LocationId::new(first_id);
        for (offset, name) in names.iter().enumerate() {
            let id = LocationId::new(first_id + offset as i64);
            fixture.nodes.insert(
                id,
                LocationNode {
                    id,
                    name: (*name).to_string(),
                    parent_id: parent,
                },
            );
            parent = Some(id);
            last = id;
        }
        (fixture, last)
    }
}

impl LocationGraph for LocationFixture {
    fn node(&self, id: LocationId) -> LarderResult<Option<LocationNode>> {
        Ok(self.nodes.get(&id).cloned())
    }
}

// ============================================================================
// FAILING STORE
// ============================================================================

/// A store whose every operation fails, for error propagation tests.
#[derive(Debug, Clone)]
pub struct FailingStore {
    reason: String,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::with_reason("storage offline")
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> LarderResult<T> {
        Err(StorageError::TransactionFailed {
            reason: self.reason.clone(),
        }
        .into())
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionStore for FailingStore {
    fn find_one(&self, _: TenantId, _: &FieldType, _: &str) -> LarderResult<Option<CacheEntry>> {
        self.fail()
    }

    fn upsert_increment(
        &self,
        _: TenantId,
        _: &FieldType,
        _: &str,
        _: Timestamp,
    ) -> LarderResult<CacheEntry> {
        self.fail()
    }

    fn list(&self, _: TenantId, _: &EntryFilter) -> LarderResult<Vec<CacheEntry>> {
        self.fail()
    }

    fn count(&self, _: TenantId, _: &FieldType) -> LarderResult<usize> {
        self.fail()
    }

    fn delete_many(&self, _: TenantId, _: &[EntryId]) -> LarderResult<usize> {
        self.fail()
    }

    fn create_if_absent(
        &self,
        _: TenantId,
        _: &FieldType,
        _: &str,
        _: u64,
        _: Timestamp,
    ) -> LarderResult<bool> {
        self.fail()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache inputs.

    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    /// Generate a tenant id from a small pool, so tenants repeat.
    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        (1i64..8).prop_map(TenantId::new)
    }

    /// Generate one of the well-known field types or a custom one.
    pub fn arb_field_type() -> impl Strategy<Value = FieldType> {
        prop_oneof![
            Just(FieldType::category()),
            Just(FieldType::unit()),
            Just(FieldType::location_path()),
            Just(FieldType::name_prefix()),
            "[a-z_]{1,12}".prop_map(FieldType::new),
        ]
    }

    /// Generate a trimmed, non-empty suggestion value.
    pub fn arb_value() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 >]{0,20}[A-Za-z0-9]".prop_map(|s| s)
    }

    /// Generate a value that is empty after trimming.
    pub fn arb_blank_value() -> impl Strategy<Value = String> {
        "[ \t\n]{0,8}".prop_map(|s| s)
    }

    /// Generate a Timestamp within 2020-2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate an inventory record with optional fields drawn from small pools,
    /// so duplicates are common.
    pub fn arb_inventory_record() -> impl Strategy<Value = InventoryRecord> {
        (
            prop::option::of(prop_oneof![Just("Food"), Just("Tools"), Just("Cleaning")]),
            prop::option::of(prop_oneof![Just("kg"), Just("count"), Just("liter")]),
            prop::option::of(1i64..5),
        )
            .prop_map(|(category, unit, location)| InventoryRecord {
                category: category.map(str::to_string),
                unit: unit.map(str::to_string),
                location_id: location.map(LocationId::new),
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;
    use chrono::TimeZone;

    /// A fixed, round reference time.
    pub fn epoch() -> Timestamp {
        chrono::Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// A typical household location tree.
    ///
    /// ids: 1 Kitchen, 2 Kitchen > Fridge, 3 Kitchen > Fridge > Top Shelf,
    /// 4 Garage, 5 Garage > Workbench.
    pub fn household_locations() -> LocationFixture {
        LocationFixture::new()
            .with(LocationNode::root(LocationId::new(1), "Kitchen"))
            .with(LocationNode::child(LocationId::new(2), "Fridge", LocationId::new(1)))
            .with(LocationNode::child(LocationId::new(3), "Top Shelf", LocationId::new(2)))
            .with(LocationNode::root(LocationId::new(4), "Garage"))
            .with(LocationNode::child(LocationId::new(5), "Workbench", LocationId::new(4)))
    }

    /// An entry with exact frequency and last use, ready for `insert_entry`.
    pub fn entry(
        tenant_id: TenantId,
        field_type: FieldType,
        value: &str,
        frequency: u64,
        last_used_at: Timestamp,
    ) -> CacheEntry {
        let mut entry = CacheEntry::new(tenant_id, field_type, value, frequency, epoch());
        entry.last_used_at = last_used_at;
        entry
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertions for cache-specific validation.

    use super::*;
    use std::collections::HashSet;

    /// Assert that a LarderResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &LarderResult<T>) {
        match result {
            Err(LarderError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a LarderResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &LarderResult<T>) {
        match result {
            Err(LarderError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert entries are in frequency-descending, recency-descending order.
    #[track_caller]
    pub fn assert_rank_ordered(entries: &[CacheEntry]) {
        for pair in entries.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let ordered = a.frequency > b.frequency
                || (a.frequency == b.frequency && a.last_used_at >= b.last_used_at);
            assert!(ordered, "Entries out of rank order: {:?} before {:?}", a.value, b.value);
        }
    }

    /// Assert no two entries share a (tenant, field type, value) key.
    #[track_caller]
    pub fn assert_unique_keys(entries: &[CacheEntry]) {
        let mut seen = HashSet::new();
        for entry in entries {
            let key = (entry.tenant_id, entry.field_type.clone(), entry.value.clone());
            assert!(seen.insert(key), "Duplicate cache entry for {:?}", entry.value);
        }
    }

    /// Assert a scope holds at most `max_size` entries.
    #[track_caller]
    pub fn assert_within_capacity<S: SuggestionStore>(
        store: &S,
        tenant_id: TenantId,
        field_type: &FieldType,
        max_size: usize,
    ) {
        let count = store
            .count(tenant_id, field_type)
            .unwrap_or_else(|e| panic!("count failed: {e}"));
        assert!(
            count <= max_size,
            "Scope {}/{} holds {} entries, capacity {}",
            tenant_id,
            field_type,
            count,
            max_size
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(fixtures::epoch());
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), fixtures::epoch() + Duration::minutes(5));
    }

    #[test]
    fn test_inventory_fixture_is_tenant_scoped() {
        let fixture = InventoryFixture::new()
            .with(TenantId::new(1), InventoryRecord::new().with_category("Food"))
            .with(TenantId::new(2), InventoryRecord::new().with_unit("kg"));
        assert_eq!(fixture.records(TenantId::new(1)).expect("records").len(), 1);
        assert!(fixture.records(TenantId::new(3)).expect("records").is_empty());
    }

    #[test]
    fn test_failing_inventory_fixture() {
        let fixture = InventoryFixture::failing("offline");
        assertions::assert_storage_error(&fixture.records(TenantId::new(1)));
    }

    #[test]
    fn test_location_chain() {
        let (graph, leaf) = LocationFixture::chain(10, &["Basement", "Shelf", "Box"]);
        assert_eq!(leaf, LocationId::new(12));
        let node = graph.node(leaf).expect("node").expect("present");
        assert_eq!(node.parent_id, Some(LocationId::new(11)));
        let root = graph.node(LocationId::new(10)).expect("node").expect("present");
        assert!(root.parent_id.is_none());
    }

    #[test]
    fn test_failing_store_fails_everything() {
        let store = FailingStore::new();
        let tenant = TenantId::new(1);
        let ft = FieldType::category();
        assertions::assert_storage_error(&store.find_one(tenant, &ft, "x"));
        assertions::assert_storage_error(&store.count(tenant, &ft));
        assertions::assert_storage_error(&store.delete_many(tenant, &[]));
    }

    #[test]
    fn test_household_locations_fixture() {
        let graph = fixtures::household_locations();
        let shelf = graph.node(LocationId::new(3)).expect("node").expect("present");
        assert_eq!(shelf.name, "Top Shelf");
    }

    proptest! {
        #[test]
        fn prop_arb_value_is_trimmed(value in generators::arb_value()) {
            prop_assert!(!value.is_empty());
            prop_assert_eq!(value.trim(), value.as_str());
        }

        #[test]
        fn prop_arb_blank_value_is_blank(value in generators::arb_blank_value()) {
            prop_assert!(value.trim().is_empty());
        }
    }
}
