//! Frequency tracking, ranking, and size control.
//!
//! Two independent mechanisms bound the cache:
//!
//! - **Capacity eviction** runs after every recorded use and trims one
//!   (tenant, field type) scope back to `max_size`, least frequently used
//!   first.
//! - **Low-frequency cleanup** runs only when asked and drops every entry
//!   used fewer than `min_frequency_threshold` times.

use std::collections::BTreeMap;
use std::sync::Arc;

use larder_core::{
    normalize_value, CacheStatistics, Clock, EntryId, FieldType, FieldTypeStats, LarderResult,
    RecordOutcome, Suggestion, SuggestConfig, SystemClock, TenantId, TopValue,
};
use larder_storage::{eviction_order, EntryFilter, SuggestionStore};

/// Parameters of a suggestion lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionQuery {
    /// Case-insensitive substring filter. Empty matches everything.
    pub query: String,
    /// Maximum results; `None` uses the configured default.
    pub limit: Option<usize>,
    /// Minimum frequency; values below 1 are treated as 1.
    pub min_frequency: u64,
}

impl SuggestionQuery {
    pub fn new() -> Self {
        Self {
            query: String::new(),
            limit: None,
            min_frequency: 1,
        }
    }

    pub fn matching(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn min_frequency(mut self, min_frequency: u64) -> Self {
        self.min_frequency = min_frequency;
        self
    }
}

impl Default for SuggestionQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// Records value usage and serves frequency-ranked suggestions.
///
/// Holds no entry state of its own: every call round-trips through the
/// store, which owns the entries and their uniqueness.
pub struct FrequencyTracker<S> {
    store: Arc<S>,
    config: SuggestConfig,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for FrequencyTracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: SuggestionStore> FrequencyTracker<S> {
    /// Tracker with default configuration and the system clock.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: SuggestConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Tracker with a validated configuration.
    pub fn with_config(store: Arc<S>, config: SuggestConfig) -> LarderResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(store)
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SuggestConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Record one use of `value` for `field_type`.
    ///
    /// The value is trimmed first. A blank value is ignored and reported as
    /// [`RecordOutcome::Skipped`]. Otherwise the entry is created or
    /// incremented, then the scope is trimmed back to capacity.
    pub fn record_usage(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
    ) -> LarderResult<RecordOutcome> {
        let Some(value) = normalize_value(value) else {
            return Ok(RecordOutcome::Skipped);
        };

        let entry = self
            .store
            .upsert_increment(tenant_id, field_type, value, self.clock.now())?;
        tracing::debug!(
            tenant_id = %tenant_id,
            field_type = %field_type,
            frequency = entry.frequency,
            "Recorded suggestion usage"
        );

        let evicted = self.evict_if_over_capacity(tenant_id, field_type)?;
        Ok(RecordOutcome::Recorded {
            value: entry.value,
            frequency: entry.frequency,
            evicted,
        })
    }

    /// Ranked suggestions for one field type.
    ///
    /// Ordered by frequency (descending), most recent use first among equals,
    /// truncated to the requested limit. A limit of 0 yields no suggestions.
    pub fn get_suggestions(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        query: &SuggestionQuery,
    ) -> LarderResult<Vec<Suggestion>> {
        let limit = query.limit.unwrap_or(self.config.default_suggestion_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let filter = EntryFilter::field(field_type.clone())
            .containing(&query.query)
            .min_frequency(query.min_frequency.max(1));

        let mut entries = self.store.list(tenant_id, &filter)?;
        entries.truncate(limit);
        Ok(entries.into_iter().map(Suggestion::from).collect())
    }

    /// The top `limit` values for a field type, values only.
    pub fn get_top_suggestions(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        limit: usize,
    ) -> LarderResult<Vec<String>> {
        let suggestions =
            self.get_suggestions(tenant_id, field_type, &SuggestionQuery::new().limit(limit))?;
        Ok(suggestions.into_iter().map(|s| s.value).collect())
    }

    /// Trim one scope back to `max_size` entries.
    ///
    /// Victims are the entries with the smallest `(frequency, last_used_at)`.
    /// Returns the number of entries removed.
    pub fn evict_if_over_capacity(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
    ) -> LarderResult<usize> {
        let max_size = self.config.max_size;
        if self.store.count(tenant_id, field_type)? <= max_size {
            return Ok(0);
        }

        let mut entries = self
            .store
            .list(tenant_id, &EntryFilter::field(field_type.clone()))?;
        let excess = entries.len().saturating_sub(max_size);
        if excess == 0 {
            return Ok(0);
        }

        entries.sort_by(eviction_order);
        let victims: Vec<EntryId> = entries.iter().take(excess).map(|e| e.entry_id).collect();
        let removed = self.store.delete_many(tenant_id, &victims)?;

        tracing::debug!(
            tenant_id = %tenant_id,
            field_type = %field_type,
            removed,
            max_size,
            "Evicted least frequently used suggestions"
        );
        Ok(removed)
    }

    /// Delete entries used fewer than `min_frequency_threshold` times,
    /// optionally only for one field type. Returns how many were removed.
    pub fn cleanup_low_frequency(
        &self,
        tenant_id: TenantId,
        field_type: Option<&FieldType>,
    ) -> LarderResult<usize> {
        let filter = EntryFilter::scoped(field_type.cloned())
            .below_frequency(self.config.min_frequency_threshold);
        let victims: Vec<EntryId> = self
            .store
            .list(tenant_id, &filter)?
            .iter()
            .map(|e| e.entry_id)
            .collect();

        let removed = self.store.delete_many(tenant_id, &victims)?;
        tracing::info!(
            tenant_id = %tenant_id,
            field_type = field_type.map(FieldType::as_str).unwrap_or("*"),
            removed,
            threshold = self.config.min_frequency_threshold,
            "Cleaned up low-frequency suggestions"
        );
        Ok(removed)
    }

    /// Entry counts, total frequencies per field type, and the most used
    /// values, optionally restricted to one field type.
    pub fn get_statistics(
        &self,
        tenant_id: TenantId,
        field_type: Option<&FieldType>,
    ) -> LarderResult<CacheStatistics> {
        let entries = self
            .store
            .list(tenant_id, &EntryFilter::scoped(field_type.cloned()))?;

        let mut by_field_type: BTreeMap<FieldType, FieldTypeStats> = BTreeMap::new();
        for entry in &entries {
            let stats = by_field_type.entry(entry.field_type.clone()).or_default();
            stats.count += 1;
            stats.total_frequency = stats.total_frequency.saturating_add(entry.frequency);
        }

        let total_entries = entries.len();
        let top_values: Vec<TopValue> = entries
            .into_iter()
            .take(self.config.top_values_limit)
            .map(TopValue::from)
            .collect();

        Ok(CacheStatistics {
            total_entries,
            by_field_type,
            top_values,
        })
    }
}
