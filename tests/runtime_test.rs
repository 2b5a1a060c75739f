//! Integration tests for configuration parsing and the runtime builder.

use frameloom::builders::build_runtime;
use frameloom::config::{RuntimeConfig, SchedulerConfig};
use frameloom::core::{AssetError, AssetState, FrameGraph, SchedulerError};

fn small_config() -> RuntimeConfig {
    let mut cfg = RuntimeConfig::new();
    cfg.scheduler = SchedulerConfig::new()
        .with_worker_count(2)
        .with_max_queue_depth(64);
    cfg
}

#[test]
fn test_build_runtime_wires_scheduler_and_assets() {
    frameloom::util::init_tracing();
    let mut runtime = build_runtime(&small_config()).unwrap();

    let handle = runtime
        .assets()
        .load("splash/logo", |_, _| Ok(vec![0_u8, 1, 2]))
        .unwrap();
    runtime.scheduler().wait_for_all().unwrap();
    assert_eq!(runtime.assets().state(handle), AssetState::Loaded);

    assert_eq!(runtime.current_frame(), 0);
    assert_eq!(runtime.begin_frame(), 1);
    assert_eq!(runtime.begin_frame(), 2);

    runtime.shutdown().unwrap();
}

#[test]
fn test_build_runtime_rejects_invalid_config() {
    let mut cfg = small_config();
    cfg.frames_in_flight = 0;
    assert!(matches!(
        build_runtime(&cfg),
        Err(SchedulerError::InvalidConfig(_))
    ));
}

#[test]
fn test_runtime_frame_clock_drives_unload_recycling() {
    let mut runtime = build_runtime(&small_config()).unwrap();

    let handle = runtime
        .assets()
        .load("transient", |_, _| Ok(1_u32))
        .unwrap();
    runtime.scheduler().wait_for_all().unwrap();

    let frame = runtime.begin_frame();
    assert!(runtime.assets().unload(handle, frame));
    assert!(matches!(
        runtime.assets().pin::<u32>(handle),
        Err(AssetError::NotLoaded)
    ));

    assert_eq!(runtime.assets().pending_unload_count(), 1);

    // Advance past the in-flight window; begin_frame recycles the record.
    for _ in 0..4 {
        runtime.begin_frame();
    }
    assert_eq!(runtime.assets().pending_unload_count(), 0);
    assert!(runtime.assets().is_empty());

    runtime.shutdown().unwrap();
}

#[test]
fn test_asset_slot_limit_from_config() {
    let mut cfg = small_config();
    cfg.max_asset_slots = Some(1);
    let runtime = build_runtime(&cfg).unwrap();

    runtime.assets().load("first", |_, _| Ok(1_u32)).unwrap();
    let overflow = runtime.assets().load("second", |_, _| Ok(2_u32));
    assert!(matches!(overflow, Err(AssetError::Pool(_))));

    runtime.shutdown().unwrap();
}

#[test]
fn test_runtime_executes_frame_graphs() {
    let runtime = build_runtime(&small_config()).unwrap();

    struct Camera;

    let mut graph = FrameGraph::new();
    let seen = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    {
        let seen = std::sync::Arc::clone(&seen);
        graph.add_pass(
            "update-camera",
            |b| {
                b.write::<Camera>();
            },
            move || {
                seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            },
        );
    }
    {
        let seen = std::sync::Arc::clone(&seen);
        graph.add_pass(
            "draw",
            |b| {
                b.read::<Camera>();
            },
            move || {
                seen.fetch_add(10, std::sync::atomic::Ordering::SeqCst);
            },
        );
    }

    let report = graph.execute(runtime.scheduler()).unwrap();
    assert_eq!(report.layer_count, 2);
    assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 11);

    runtime.shutdown().unwrap();
}

#[test]
fn test_config_round_trips_through_json() {
    let cfg = small_config();
    let encoded = serde_json::to_string(&cfg).unwrap();
    let decoded = RuntimeConfig::from_json_str(&encoded).unwrap();
    assert_eq!(decoded.scheduler.worker_count, 2);
    assert_eq!(decoded.frames_in_flight, cfg.frames_in_flight);
}
