//! Larder Suggest - Frequency-Ranked Autocomplete
//!
//! Tracks how often values are entered into inventory form fields and serves
//! them back as ranked suggestions:
//!
//! - [`FrequencyTracker`] records usage, ranks candidates, and keeps every
//!   (tenant, field type) scope within capacity by LFU eviction
//! - [`PathResolver`] turns a location id into a `"Kitchen > Fridge"` path
//! - [`Backfill`] seeds the cache from existing inventory
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use larder_core::{FieldType, TenantId};
//! use larder_storage::InMemorySuggestionStore;
//! use larder_suggest::{FrequencyTracker, SuggestionQuery};
//!
//! let tracker = FrequencyTracker::new(Arc::new(InMemorySuggestionStore::new()));
//! let household = TenantId::new(1);
//!
//! tracker.record_usage(household, &FieldType::category(), "Food")?;
//! let suggestions = tracker.get_suggestions(
//!     household,
//!     &FieldType::category(),
//!     &SuggestionQuery::new().matching("fo"),
//! )?;
//! assert_eq!(suggestions[0].value, "Food");
//! # Ok::<(), larder_core::LarderError>(())
//! ```

pub mod backfill;
pub mod path;
pub mod tracker;

pub use backfill::Backfill;
pub use path::PathResolver;
pub use tracker::{FrequencyTracker, SuggestionQuery};
