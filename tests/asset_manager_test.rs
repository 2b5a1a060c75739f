//! Integration tests for the asset lease manager.
//!
//! These tests validate the lease contract end to end:
//! - Asynchronous loading through the task scheduler
//! - Name deduplication and loader invocation counts
//! - Typed pinning with state and type checks
//! - The processing gate
//! - Reload-by-replacement: old leases keep the old value
//! - Move-only loader results
//! - Unloading with frame-deferred record recycling

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use frameloom::config::SchedulerConfig;
use frameloom::core::{AssetError, AssetManager, AssetState, TaskScheduler};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn make_manager(workers: usize) -> (Arc<TaskScheduler>, AssetManager) {
    let scheduler = Arc::new(
        TaskScheduler::new(
            &SchedulerConfig::new()
                .with_worker_count(workers)
                .with_max_queue_depth(256),
        )
        .unwrap(),
    );
    let manager = AssetManager::new(Arc::clone(&scheduler), 2);
    (scheduler, manager)
}

/// A deliberately move-only payload: holds uniquely owned storage and does
/// not implement `Clone`.
struct GeometryBlob {
    vertices: Box<[f32]>,
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn test_load_transitions_to_loaded() {
    let (scheduler, manager) = make_manager(2);

    let handle = manager
        .load("config/window", |name, _| Ok(format!("contents of {name}")))
        .unwrap();
    scheduler.wait_for_all().unwrap();

    assert_eq!(manager.state(handle), AssetState::Loaded);
    let lease = manager.pin::<String>(handle).unwrap();
    assert_eq!(&*lease, "contents of config/window");
    scheduler.shutdown();
}

#[test]
fn test_loader_receives_name_and_handle() {
    let (scheduler, manager) = make_manager(2);

    let handle = manager
        .load("mirror", |name, handle| Ok((name.to_owned(), handle.index())))
        .unwrap();
    scheduler.wait_for_all().unwrap();

    let lease = manager.pin::<(String, u32)>(handle).unwrap();
    assert_eq!(lease.0, "mirror");
    assert_eq!(lease.1, handle.index());
    scheduler.shutdown();
}

#[test]
fn test_duplicate_load_does_not_redispatch() {
    let (scheduler, manager) = make_manager(2);
    let invocations = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&invocations);
    let first = manager
        .load("shared", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(1_u32)
        })
        .unwrap();
    scheduler.wait_for_all().unwrap();

    let second = manager.load("shared", |_, _| Ok(2_u32)).unwrap();
    scheduler.wait_for_all().unwrap();

    assert_eq!(first, second);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(*manager.pin::<u32>(first).unwrap(), 1);
    scheduler.shutdown();
}

#[test]
fn test_pin_with_wrong_type_fails() {
    let (scheduler, manager) = make_manager(2);

    let handle = manager.load("typed", |_, _| Ok(7_u32)).unwrap();
    scheduler.wait_for_all().unwrap();

    match manager.pin::<String>(handle) {
        Err(AssetError::TypeMismatch { requested, stored }) => {
            assert!(requested.contains("String"));
            assert!(stored.contains("u32"));
        }
        other => panic!("expected TypeMismatch, got {:?}", other.map(|_| ())),
    }
    scheduler.shutdown();
}

#[test]
fn test_pin_during_processing_fails() {
    let (scheduler, manager) = make_manager(2);

    let handle = manager.load("gated", |_, _| Ok(5_u32)).unwrap();
    scheduler.wait_for_all().unwrap();

    manager.begin_processing(handle).unwrap();
    assert_eq!(manager.state(handle), AssetState::Processing);
    assert!(matches!(
        manager.pin::<u32>(handle),
        Err(AssetError::NotLoaded)
    ));

    manager.finish_processing(handle).unwrap();
    assert_eq!(*manager.pin::<u32>(handle).unwrap(), 5);

    // Gate misuse is an explicit error.
    assert!(manager.finish_processing(handle).is_err());
    scheduler.shutdown();
}

#[test]
fn test_reload_swaps_value_without_disturbing_leases() {
    let (scheduler, manager) = make_manager(2);
    let version = Arc::new(AtomicU32::new(1));

    let source = Arc::clone(&version);
    let handle = manager
        .load("reloadable", move |_, _| {
            Ok(source.load(Ordering::SeqCst))
        })
        .unwrap();
    scheduler.wait_for_all().unwrap();

    let before = manager.pin::<u32>(handle).unwrap();
    assert_eq!(*before, 1);

    version.store(2, Ordering::SeqCst);
    manager.reload(handle).unwrap();
    scheduler.wait_for_all().unwrap();

    // The old lease still observes the value it pinned.
    assert_eq!(*before, 1);
    // A fresh pin observes the reloaded value.
    let after = manager.pin::<u32>(handle).unwrap();
    assert_eq!(*after, 2);
    scheduler.shutdown();
}

#[test]
fn test_lease_outlives_unload() {
    let (scheduler, manager) = make_manager(2);

    let handle = manager.load("ephemeral", |_, _| Ok(11_u32)).unwrap();
    scheduler.wait_for_all().unwrap();

    let lease = manager.pin::<u32>(handle).unwrap();
    assert!(manager.unload(handle, 1));
    assert_eq!(manager.process_unloads(4), 1);

    // The record is gone, the lease is not.
    assert_eq!(manager.state(handle), AssetState::Unloaded);
    assert!(matches!(
        manager.pin::<u32>(handle),
        Err(AssetError::NotLoaded)
    ));
    assert_eq!(*lease, 11);
    scheduler.shutdown();
}

#[test]
fn test_unload_frees_the_name_for_reuse() {
    let (scheduler, manager) = make_manager(2);

    let first = manager.load("recycled-name", |_, _| Ok(1_u32)).unwrap();
    scheduler.wait_for_all().unwrap();
    assert!(manager.unload(first, 0));

    let second = manager.load("recycled-name", |_, _| Ok(2_u32)).unwrap();
    scheduler.wait_for_all().unwrap();

    assert_ne!(first, second);
    assert_eq!(*manager.pin::<u32>(second).unwrap(), 2);
    scheduler.shutdown();
}

#[test]
fn test_move_only_loader_results_are_accepted() {
    let (scheduler, manager) = make_manager(2);

    let handle = manager
        .load("terrain/patch", |_, _| {
            Ok(GeometryBlob {
                vertices: vec![0.0, 1.0, 2.0].into_boxed_slice(),
            })
        })
        .unwrap();
    scheduler.wait_for_all().unwrap();

    let lease = manager.pin::<GeometryBlob>(handle).unwrap();
    assert_eq!(lease.vertices.len(), 3);

    // Cloning the lease duplicates the reference, not the blob.
    let sibling = lease.clone();
    assert_eq!(sibling.vertices[2], 2.0);
    scheduler.shutdown();
}

#[test]
fn test_with_value_gives_borrow_scoped_access() {
    let (scheduler, manager) = make_manager(2);

    let handle = manager.load("counted", |_, _| Ok(vec![1_u32, 2, 3])).unwrap();
    scheduler.wait_for_all().unwrap();

    let sum = manager
        .with_value::<Vec<u32>, u32>(handle, |values| values.iter().sum())
        .unwrap();
    assert_eq!(sum, 6);

    // Same checks as pin: wrong type is rejected.
    assert!(matches!(
        manager.with_value::<String, usize>(handle, String::len),
        Err(AssetError::TypeMismatch { .. })
    ));
    scheduler.shutdown();
}

#[test]
fn test_failed_loader_marks_record_failed() {
    let (scheduler, manager) = make_manager(2);

    let handle = manager
        .load("missing/file", |name, _| -> anyhow::Result<u32> {
            anyhow::bail!("could not open {name}")
        })
        .unwrap();
    scheduler.wait_for_all().unwrap();

    assert_eq!(manager.state(handle), AssetState::Failed);
    assert_eq!(
        manager.failure(handle).unwrap(),
        "could not open missing/file"
    );
    assert!(matches!(
        manager.pin::<u32>(handle),
        Err(AssetError::NotLoaded)
    ));

    // A reload can recover a failed record.
    scheduler.shutdown();
}

#[test]
fn test_concurrent_loads_land_distinct_records() {
    let (scheduler, manager) = make_manager(4);

    let handles: Vec<_> = (0..32usize)
        .map(|i| {
            manager
                .load(&format!("batch/{i}"), move |_, _| Ok(i))
                .unwrap()
        })
        .collect();
    scheduler.wait_for_all().unwrap();

    assert_eq!(manager.len(), 32);
    for (i, handle) in handles.iter().enumerate() {
        assert_eq!(*manager.pin::<usize>(*handle).unwrap(), i);
    }
    scheduler.shutdown();
}
