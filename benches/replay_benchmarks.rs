//! Benchmarks for replay throughput
//!
//! These benchmarks measure:
//! - Playback from the first to the last event
//! - Tracking advances including the store write
//! - Journey summaries at the end of the log

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use fleet_replay::synthetic::{places, SyntheticTripBuilder};
use fleet_replay::{summarize, GpsEvent, MemoryStore, PlaybackEngine, Replayer, TrackingEngine};

fn create_log(num_events: usize) -> Vec<GpsEvent> {
    SyntheticTripBuilder::new("trip_bench", places::DELHI, places::BANGALORE)
        .with_event_count(num_events)
        .with_seed(42)
        .build()
        .unwrap()
}

fn bench_playback(c: &mut Criterion) {
    let mut group = c.benchmark_group("playback_to_end");

    for num_events in [100, 500, 2000].iter() {
        group.throughput(Throughput::Elements(*num_events as u64));
        group.bench_with_input(BenchmarkId::from_parameter(num_events), num_events, |b, &num_events| {
            let events = create_log(num_events);
            let engine = PlaybackEngine::new();

            b.iter(|| black_box(engine.replay_all("trip_bench", &events, 1750.0).unwrap()));
        });
    }

    group.finish();
}

fn bench_tracking_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracking_advance");
    group.sample_size(20);

    for num_events in [100, 500].iter() {
        group.throughput(Throughput::Elements(*num_events as u64));
        group.bench_with_input(BenchmarkId::from_parameter(num_events), num_events, |b, &num_events| {
            let events = create_log(num_events);
            let engine = TrackingEngine::new(Arc::new(MemoryStore::new()));

            b.iter(|| {
                let mut state = engine.initialize("trip_bench", &events, 1750.0).unwrap();
                for _ in 1..num_events {
                    state = engine.advance(&state, &events, 1750.0).unwrap();
                }
                black_box(state)
            });
        });
    }

    group.finish();
}

fn bench_summary(c: &mut Criterion) {
    let events = create_log(5000);

    c.bench_function("summarize_5000", |b| {
        b.iter(|| black_box(summarize(&events, events.len() - 1).unwrap()))
    });
}

criterion_group!(benches, bench_playback, bench_tracking_advance, bench_summary);
criterion_main!(benches);
