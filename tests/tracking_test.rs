use fleet_replay::error::StorageError;
use fleet_replay::synthetic::{places, SyntheticTripBuilder};
use fleet_replay::{
    FleetError, FleetReplay, GpsEvent, KeyValueStore, MemoryStore, ReplayConfig, ReplaySession,
    ReplayState, Replayer, StateOrigin, Step, TraceEventType, TrackingEngine, TrackingSnapshot,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn synthetic_log(trip_id: &str, count: usize, seed: u64) -> Vec<GpsEvent> {
    SyntheticTripBuilder::new(trip_id, places::DELHI, places::GURGAON)
        .with_event_count(count)
        .with_seed(seed)
        .build()
        .unwrap()
}

// Store whose writes can be switched off
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "disk full".to_string(),
            });
        }
        self.inner.set(key, value)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// **Feature: fleet-trip-replay, Property 11: Tracking Loops**
    ///
    /// Advancing `count` times from a fresh state wraps back to index 0 with a
    /// single-point path, and the store always holds the latest state.
    #[test]
    fn property_tracking_loops(count in 2usize..60, seed in any::<u64>()) {
        let events = synthetic_log("trip_loop", count, seed);
        let engine = TrackingEngine::new(MemoryStore::new());
        let total = events.last().unwrap().distance_travelled_km.unwrap();

        let mut state = engine.initialize("trip_loop", &events, total).unwrap();
        for i in 1..count {
            state = engine.advance(&state, &events, total).unwrap();
            prop_assert_eq!(state.current_index, i);
            prop_assert!(state.validate(events.len()).is_ok());
        }
        prop_assert!((state.metrics.progress_percent - 100.0).abs() < 1e-9);

        let looped = engine.advance(&state, &events, total).unwrap();
        prop_assert_eq!(looped.current_index, 0);
        prop_assert_eq!(looped.traveled_path.len(), 1);
        prop_assert_eq!(looped.metrics.distance_traveled, 0.0);
        prop_assert_eq!(engine.load("trip_loop").unwrap(), Some(looped));
    }
}

#[test]
fn test_rehydrates_from_store() {
    let events = synthetic_log("trip_r", 10, 4);
    let store = Arc::new(MemoryStore::new());

    let engine = TrackingEngine::new(Arc::clone(&store));
    let mut state = engine.initialize("trip_r", &events, 50.0).unwrap();
    for _ in 0..4 {
        state = engine.advance(&state, &events, 50.0).unwrap();
    }

    let restarted = TrackingEngine::new(Arc::clone(&store));
    let started = restarted.start("trip_r", &events, 50.0).unwrap();
    assert_eq!(started.origin, StateOrigin::Restored);
    assert_eq!(started.state, state);
}

#[test]
fn test_corrupt_blob_falls_back_to_fresh() {
    let events = synthetic_log("trip_c", 5, 4);
    let store = MemoryStore::new();
    store.set("fleet_trip_trip_c", "{not json".to_string()).unwrap();

    let started = TrackingEngine::new(&store).start("trip_c", &events, 50.0).unwrap();
    assert!(matches!(started.origin, StateOrigin::Discarded { .. }));
    assert_eq!(started.state.current_index, 0);
}

#[test]
fn test_out_of_range_blob_falls_back_to_fresh() {
    let long = synthetic_log("trip_o", 20, 4);
    let store = MemoryStore::new();
    let engine = TrackingEngine::new(&store);

    let mut state = engine.initialize("trip_o", &long, 50.0).unwrap();
    for _ in 0..15 {
        state = engine.advance(&state, &long, 50.0).unwrap();
    }
    // Strip the fingerprint so only the cursor check can reject it
    state.log_fingerprint = None;
    engine.persist(&state).unwrap();

    let short = synthetic_log("trip_o", 10, 4);
    let started = engine.start("trip_o", &short, 50.0).unwrap();
    match started.origin {
        StateOrigin::Discarded { reason } => assert!(reason.contains("cursor 15")),
        other => panic!("expected discarded state, got {:?}", other),
    }
}

#[test]
fn test_custom_key_prefix() {
    let events = synthetic_log("trip_k", 5, 4);
    let store = MemoryStore::new();
    let engine = TrackingEngine::new(&store)
        .with_config(ReplayConfig::tracking().with_storage_key_prefix("fleet/"));
    let s0 = engine.initialize("trip_k", &events, 50.0).unwrap();
    engine.advance(&s0, &events, 50.0).unwrap();

    assert!(store.get("fleet/trip_k").unwrap().is_some());
    assert!(store.get("fleet_trip_trip_k").unwrap().is_none());
}

#[test]
fn test_write_failure_surfaces_as_storage_error() {
    let events = synthetic_log("trip_w", 5, 4);
    let store = FlakyStore::default();
    let engine = TrackingEngine::new(&store);
    let s0 = engine.initialize("trip_w", &events, 50.0).unwrap();

    store.fail_writes.store(true, Ordering::SeqCst);
    let err = engine.advance(&s0, &events, 50.0).unwrap_err();
    assert!(matches!(err, FleetError::Storage(StorageError::WriteFailed { .. })));
}

#[test]
fn test_session_loops_and_persists() {
    let events = synthetic_log("trip_s", 3, 8);
    let store = Arc::new(MemoryStore::new());
    let mut session = ReplaySession::new(
        TrackingEngine::new(Arc::clone(&store)),
        "trip_s",
        events,
        20.0,
        ReplayConfig::tracking(),
    )
    .unwrap();

    assert_eq!(session.tick_interval().as_millis(), 3000);
    session.play();
    let steps: Vec<Step> = (0..3).map(|_| session.tick().unwrap().unwrap()).collect();
    assert_eq!(steps, vec![Step::Advanced(1), Step::Advanced(2), Step::Looped]);
    assert!(session.is_playing());
    assert_eq!(session.state().current_index(), 0);
    assert_eq!(session.trace().count(TraceEventType::Persisted), 3);

    let snapshot = TrackingSnapshot::from_state(session.state());
    assert_eq!(snapshot.distance_covered, 0.0);
    assert_eq!(snapshot.progress_percent, 0.0);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_session_reports_rehydration() {
    let events = synthetic_log("trip_h", 5, 8);
    let store = Arc::new(MemoryStore::new());

    let mut first = ReplaySession::new(
        TrackingEngine::new(Arc::clone(&store)),
        "trip_h",
        events.clone(),
        20.0,
        ReplayConfig::tracking(),
    )
    .unwrap();
    first.play();
    first.tick().unwrap();
    first.tick().unwrap();

    let second = ReplaySession::new(
        TrackingEngine::new(Arc::clone(&store)),
        "trip_h",
        events,
        20.0,
        ReplayConfig::tracking(),
    )
    .unwrap();
    assert_eq!(second.state().current_index(), 2);
    assert_eq!(second.trace().count(TraceEventType::Rehydrated), 1);
}

#[test]
fn test_fleet_tick_isolates_failures() {
    let store = Arc::new(MemoryStore::new());
    let mut fleet = FleetReplay::new();

    for (trip_id, seed) in [("trip_1", 1), ("trip_2", 2), ("trip_3", 3)] {
        let mut events = synthetic_log(trip_id, 4, seed);
        if trip_id == "trip_2" {
            events[1].location = None;
        }
        let session = ReplaySession::new(
            TrackingEngine::new(Arc::clone(&store)),
            trip_id,
            events,
            20.0,
            ReplayConfig::tracking(),
        )
        .unwrap();
        fleet.insert(session);
    }
    fleet.play_all();
    if let Some(session) = fleet.get_mut("trip_3") {
        session.pause();
    }

    let tick = fleet.tick_all();
    assert_eq!(tick.steps, vec![("trip_1".to_string(), Step::Advanced(1))]);
    assert_eq!(tick.failures.len(), 1);
    assert_eq!(tick.failures[0].0, "trip_2");
    assert!(tick.failures[0].1.is_malformed_event());
    assert!(!tick.is_clean());
    assert_eq!(fleet.len(), 3);
}

#[test]
fn test_endless_tracking_session_keeps_bounded_history() {
    let events = synthetic_log("trip_long", 5, 4);
    let config = ReplayConfig::tracking().with_history_limits(Some(20), Some(50));
    let mut session = ReplaySession::new(
        TrackingEngine::new(MemoryStore::new()),
        "trip_long",
        events,
        20.0,
        config,
    )
    .unwrap();

    session.play();
    for _ in 0..1_000 {
        session.tick().unwrap();
    }

    assert_eq!(session.trace().len(), 50);
    assert!(session.trace().evicted() > 0);
    assert!(session.logger().len() <= 20);
    assert!(session.logger().evicted() > 0);
    // 1000 ticks over 5 events ends on a loop back to the start
    let last = session.trace().events.back().unwrap();
    assert_eq!(last.event_type, TraceEventType::Persisted);
    assert_eq!(last.event_index, 0);
    assert_eq!(session.state().current_index(), 0);
}

#[test]
fn test_session_trace_carries_discard_reason() {
    let events = synthetic_log("trip_bad", 4, 6);
    let store = Arc::new(MemoryStore::new());
    store.set("fleet_trip_trip_bad", "{not json".to_string()).unwrap();

    let session = ReplaySession::new(
        TrackingEngine::new(Arc::clone(&store)),
        "trip_bad",
        events,
        20.0,
        ReplayConfig::tracking(),
    )
    .unwrap();

    let failed = session.trace().events_by_type(TraceEventType::RehydrationFailed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].data[0].0, "reason");
    assert!(!failed[0].data[0].1.is_empty());
    assert_eq!(session.state().current_index(), 0);
}
