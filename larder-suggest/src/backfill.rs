//! Seeding the cache from existing inventory.
//!
//! A backfill counts how often each category, unit, and location path occurs
//! across a tenant's inventory and creates the missing cache entries with
//! those counts. Entries that already exist are never touched, so running it
//! again over unchanged inventory creates nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use larder_core::{
    normalize_value, BackfillReport, Clock, FieldType, InventorySource, LarderError,
    LarderResult, LocationGraph, LocationId, TenantId,
};
use larder_storage::SuggestionStore;

use crate::path::PathResolver;
use crate::tracker::FrequencyTracker;

/// Occurrence counts per distinct value of each seeded field type.
#[derive(Debug, Default)]
struct Tally {
    categories: BTreeMap<String, u64>,
    units: BTreeMap<String, u64>,
    location_paths: BTreeMap<String, u64>,
}

impl Tally {
    fn bump(counts: &mut BTreeMap<String, u64>, raw: Option<&str>) {
        if let Some(value) = raw.and_then(normalize_value) {
            *counts.entry(value.to_string()).or_default() += 1;
        }
    }

    fn into_field_types(self) -> [(FieldType, BTreeMap<String, u64>); 3] {
        [
            (FieldType::category(), self.categories),
            (FieldType::unit(), self.units),
            (FieldType::location_path(), self.location_paths),
        ]
    }
}

/// Seeds a store from historical inventory data.
pub struct Backfill<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: SuggestionStore> Backfill<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// A backfill writing through the same store and clock as `tracker`.
    pub fn for_tracker(tracker: &FrequencyTracker<S>) -> Self {
        Self::new(Arc::clone(tracker.store()), Arc::clone(tracker.clock()))
    }

    /// Scan `source` for `tenant_id` and create missing category, unit, and
    /// location path entries.
    ///
    /// Locations that do not exist contribute nothing. Locations whose parent
    /// chain is cyclic or too deep are logged and skipped. Storage and source
    /// failures abort the backfill and propagate.
    ///
    /// Returns the number of entries newly created per field type.
    pub fn initialize_from_source<I, G>(
        &self,
        tenant_id: TenantId,
        source: &I,
        resolver: &PathResolver<G>,
    ) -> LarderResult<BackfillReport>
    where
        I: InventorySource + ?Sized,
        G: LocationGraph,
    {
        let records = source.records(tenant_id)?;
        let mut tally = Tally::default();
        let mut paths: HashMap<LocationId, Option<String>> = HashMap::new();

        for record in &records {
            Tally::bump(&mut tally.categories, record.category.as_deref());
            Tally::bump(&mut tally.units, record.unit.as_deref());

            let Some(location_id) = record.location_id else {
                continue;
            };
            let path = match paths.get(&location_id) {
                Some(cached) => cached.clone(),
                None => {
                    let resolved = resolve_or_skip(resolver, tenant_id, location_id)?;
                    paths.insert(location_id, resolved.clone());
                    resolved
                }
            };
            Tally::bump(&mut tally.location_paths, path.as_deref());
        }

        let now = self.clock.now();
        let field_types = tally.into_field_types();
        let mut report =
            BackfillReport::with_field_types(field_types.iter().map(|(ft, _)| ft.clone()));
        for (field_type, counts) in &field_types {
            for (value, frequency) in counts {
                if self
                    .store
                    .create_if_absent(tenant_id, field_type, value, *frequency, now)?
                {
                    report.add_created(field_type);
                }
            }
        }

        tracing::info!(
            tenant_id = %tenant_id,
            records = records.len(),
            categories = report.created(FieldType::CATEGORY),
            units = report.created(FieldType::UNIT),
            location_paths = report.created(FieldType::LOCATION_PATH),
            "Backfilled suggestion cache from inventory"
        );
        Ok(report)
    }
}

/// Resolve a location path, turning malformed hierarchy data into a skip.
fn resolve_or_skip<G: LocationGraph>(
    resolver: &PathResolver<G>,
    tenant_id: TenantId,
    location_id: LocationId,
) -> LarderResult<Option<String>> {
    match resolver.resolve_path(location_id) {
        Ok(path) => Ok(path),
        Err(LarderError::Validation(e)) => {
            tracing::warn!(
                tenant_id = %tenant_id,
                location_id = %location_id,
                error = %e,
                "Skipping location with malformed hierarchy"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl<S: SuggestionStore> FrequencyTracker<S> {
    /// Seed this tracker's store from existing inventory.
    ///
    /// See [`Backfill::initialize_from_source`].
    pub fn initialize_from_source<I, G>(
        &self,
        tenant_id: TenantId,
        source: &I,
        resolver: &PathResolver<G>,
    ) -> LarderResult<BackfillReport>
    where
        I: InventorySource + ?Sized,
        G: LocationGraph,
    {
        Backfill::for_tracker(self).initialize_from_source(tenant_id, source, resolver)
    }
}
