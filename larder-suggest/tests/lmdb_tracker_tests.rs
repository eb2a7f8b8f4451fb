//! End-to-end tests of the tracker over the LMDB store.
//!
//! Each test opens a fresh environment in a temporary directory.

use std::sync::Arc;
use std::thread;

use chrono::Duration;
use larder_core::{FieldType, InventoryRecord, LocationId, SuggestConfig, TenantId};
use larder_storage::{LmdbSuggestionStore, SuggestionStore};
use larder_suggest::{FrequencyTracker, PathResolver, SuggestionQuery};
use larder_test_utils::{assertions, fixtures, InventoryFixture, ManualClock};
use tempfile::TempDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Route tracker logs to the test harness. Set `RUST_LOG` to see them.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("larder_suggest=debug"));
    // Another test may have installed the subscriber already.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn open(dir: &TempDir) -> Arc<LmdbSuggestionStore> {
    init_tracing();
    Arc::new(LmdbSuggestionStore::new(dir.path(), 16).expect("Failed to open LMDB store"))
}

fn household() -> TenantId {
    TenantId::new(3)
}

#[test]
fn usage_survives_reopen() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let ft = FieldType::category();
    {
        let tracker = FrequencyTracker::new(open(&dir));
        tracker.record_usage(household(), &ft, "Food").expect("record");
        tracker.record_usage(household(), &ft, "Food").expect("record");
        tracker.record_usage(household(), &ft, "Tools").expect("record");
    }

    let tracker = FrequencyTracker::new(open(&dir));
    let suggestions = tracker
        .get_suggestions(household(), &ft, &SuggestionQuery::new())
        .expect("suggestions");
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].value, "Food");
    assert_eq!(suggestions[0].frequency, 2);
}

#[test]
fn concurrent_usage_loses_no_increments() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let tracker = FrequencyTracker::new(open(&dir));
    let ft = FieldType::unit();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let tracker = tracker.clone();
            let ft = ft.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    tracker.record_usage(household(), &ft, "kg").expect("record");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let entry = tracker
        .store()
        .find_one(household(), &ft, "kg")
        .expect("find")
        .expect("present");
    assert_eq!(entry.frequency, 100);
    assert_eq!(tracker.store().count(household(), &ft).expect("count"), 1);
}

#[test]
fn eviction_and_cleanup_on_disk() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let clock = Arc::new(ManualClock::new(fixtures::epoch()));
    let config = SuggestConfig {
        max_size: 2,
        ..SuggestConfig::default()
    };
    let tracker = FrequencyTracker::with_config(open(&dir), config)
        .expect("valid config")
        .with_clock(clock.clone());
    let ft = FieldType::location_path();

    tracker.record_usage(household(), &ft, "Garage").expect("record");
    clock.advance(Duration::seconds(1));
    tracker.record_usage(household(), &ft, "Kitchen").expect("record");
    tracker.record_usage(household(), &ft, "Kitchen").expect("record");
    clock.advance(Duration::seconds(1));
    tracker.record_usage(household(), &ft, "Attic").expect("record");

    let remaining = tracker.get_top_suggestions(household(), &ft, 10).expect("top");
    assert_eq!(remaining, vec!["Kitchen".to_string(), "Attic".to_string()]);

    let removed = tracker.cleanup_low_frequency(household(), None).expect("cleanup");
    assert_eq!(removed, 1);
    let remaining = tracker.get_top_suggestions(household(), &ft, 10).expect("top");
    assert_eq!(remaining, vec!["Kitchen".to_string()]);
}

#[test]
fn backfill_then_record_on_disk() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let tracker = FrequencyTracker::new(open(&dir));
    let resolver = PathResolver::new(fixtures::household_locations());
    let source = InventoryFixture::new()
        .with(
            household(),
            InventoryRecord::new()
                .with_category("Food")
                .with_location(LocationId::new(2)),
        )
        .with(
            household(),
            InventoryRecord::new()
                .with_category("Food")
                .with_location(LocationId::new(2)),
        );

    let report = tracker
        .initialize_from_source(household(), &source, &resolver)
        .expect("backfill");
    assert_eq!(report.created(FieldType::CATEGORY), 1);
    assert_eq!(report.created(FieldType::LOCATION_PATH), 1);

    tracker
        .record_usage(household(), &FieldType::category(), "Food")
        .expect("record");
    let food = tracker
        .store()
        .find_one(household(), &FieldType::category(), "Food")
        .expect("find")
        .expect("present");
    assert_eq!(food.frequency, 3);

    let path = tracker
        .store()
        .find_one(household(), &FieldType::location_path(), "Kitchen > Fridge")
        .expect("find")
        .expect("present");
    assert_eq!(path.frequency, 2);
}

#[test]
fn field_type_with_nul_is_rejected_on_disk() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let tracker = FrequencyTracker::new(open(&dir));
    let bad = FieldType::new("unit\0x");

    assertions::assert_validation_error(&tracker.record_usage(household(), &bad, "kg"));
    assertions::assert_validation_error(&tracker.get_top_suggestions(household(), &bad, 5));
}
