//! Continuous tracking replay: loops at the end of the log and persists every step
//!
//! State is written to a [`KeyValueStore`] under `storage_key_prefix + trip_id` so a
//! restarted host resumes where it left off. A stored blob is only reused when it
//! decodes, passes validation, belongs to the same trip and was built from the same
//! event log; anything else falls back to a fresh state.

use crate::config::ReplayConfig;
use crate::error::{FleetError, InputError, StateError, StorageError};
use crate::event::{GpsEvent, SignalQuality};
use crate::geo;
use crate::hasher::Fingerprinter;
use crate::playback::progress_percent;
use crate::store::{JsonSerializer, KeyValueStore, StateSerializer};
use crate::traits::{ReplayState, Replayer, StateOrigin, Started};
use crate::types::{Fingerprint, Location};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingMetrics {
    pub distance_traveled: f64,
    pub total_distance: f64,
    pub progress_percent: f64,
    pub speed: f64,
    pub signal_quality: SignalQuality,
    pub overspeed: bool,
    pub battery: f64,
    pub violations: u32,
}

/// Persisted live-tracking position for one trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingState {
    pub trip_id: String,
    pub current_index: usize,
    pub current_location: Location,
    pub current_event: GpsEvent,
    pub traveled_path: Vec<Location>,
    pub metrics: TrackingMetrics,
    pub is_active: bool,
    /// Fingerprint of the event log this state was built from
    #[serde(default)]
    pub log_fingerprint: Option<Fingerprint>,
}

impl ReplayState for TrackingState {
    fn trip_id(&self) -> &str {
        &self.trip_id
    }

    fn current_index(&self) -> usize {
        self.current_index
    }

    fn current_location(&self) -> &Location {
        &self.current_location
    }

    fn traveled_path(&self) -> &[Location] {
        &self.traveled_path
    }

    fn distance_traveled(&self) -> f64 {
        self.metrics.distance_traveled
    }

    fn progress_percent(&self) -> f64 {
        self.metrics.progress_percent
    }
}

/// Looping replay policy backed by a key-value store
pub struct TrackingEngine<K: KeyValueStore, Z: StateSerializer = JsonSerializer> {
    store: K,
    serializer: Z,
    config: ReplayConfig,
    fingerprinter: Fingerprinter,
}

impl<K: KeyValueStore> TrackingEngine<K, JsonSerializer> {
    /// Create a new tracking engine persisting JSON blobs into `store`
    pub fn new(store: K) -> Self {
        Self {
            store,
            serializer: JsonSerializer::new(),
            config: ReplayConfig::tracking(),
            fingerprinter: Fingerprinter::new(),
        }
    }
}

impl<K: KeyValueStore, Z: StateSerializer> TrackingEngine<K, Z> {
    /// Swap the blob encoding
    pub fn with_serializer<Z2: StateSerializer>(self, serializer: Z2) -> TrackingEngine<K, Z2> {
        TrackingEngine {
            store: self.store,
            serializer,
            config: self.config,
            fingerprinter: self.fingerprinter,
        }
    }

    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    /// Read the stored state for `trip_id` without validating it
    pub fn load(&self, trip_id: &str) -> Result<Option<TrackingState>, FleetError> {
        let key = self.config.storage_key(trip_id);
        match self.store.get(&key)? {
            Some(blob) => Ok(Some(self.serializer.decode(&blob)?)),
            None => Ok(None),
        }
    }

    /// Write `state` under its trip key
    pub fn persist(&self, state: &TrackingState) -> Result<(), FleetError> {
        let key = self.config.storage_key(&state.trip_id);
        let blob = self.serializer.encode(state).map_err(|e| StorageError::WriteFailed {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.store.set(&key, blob)?;
        log::debug!(
            "persisted {} tracking state for {} at index {}",
            self.serializer.name(),
            state.trip_id,
            state.current_index
        );
        Ok(())
    }

    fn fresh(
        &self,
        trip_id: &str,
        events: &[GpsEvent],
        total_distance: f64,
        log_fingerprint: Option<Fingerprint>,
    ) -> Result<TrackingState, FleetError> {
        let first = events
            .first()
            .ok_or_else(|| InputError::invalid(format!("Trip {} has no events", trip_id)))?;
        let start = Location::from(first.require_location(0)?);

        Ok(TrackingState {
            trip_id: trip_id.to_string(),
            current_index: 0,
            current_location: start,
            current_event: first.clone(),
            traveled_path: vec![start],
            metrics: TrackingMetrics {
                distance_traveled: 0.0,
                total_distance: total_distance.max(0.0),
                progress_percent: 0.0,
                speed: 0.0,
                signal_quality: SignalQuality::Good,
                overspeed: false,
                battery: 100.0,
                violations: 0,
            },
            is_active: true,
            log_fingerprint,
        })
    }

    /// Check a rehydrated state against the current trip and log
    fn check_restored(
        &self,
        state: &TrackingState,
        trip_id: &str,
        events: &[GpsEvent],
        log_fingerprint: Option<Fingerprint>,
    ) -> Result<(), StateError> {
        if state.trip_id != trip_id {
            return Err(StateError::Mismatch {
                expected: trip_id.to_string(),
                actual: state.trip_id.clone(),
            });
        }
        if let (Some(stored), Some(current)) = (state.log_fingerprint, log_fingerprint) {
            if stored != current {
                return Err(StateError::Mismatch {
                    expected: current.to_string(),
                    actual: stored.to_string(),
                });
            }
        }
        state.validate(events.len())
    }
}

impl<K: KeyValueStore, Z: StateSerializer> Replayer for TrackingEngine<K, Z> {
    type State = TrackingState;

    fn start(
        &self,
        trip_id: &str,
        events: &[GpsEvent],
        total_distance: f64,
    ) -> Result<Started<TrackingState>, FleetError> {
        let log_fingerprint = match self.fingerprinter.fingerprint_log(events) {
            Ok(fingerprint) => Some(fingerprint),
            Err(e) => {
                log::warn!("could not fingerprint event log for {}: {}", trip_id, e);
                None
            }
        };

        let discarded = match self.load(trip_id) {
            Ok(None) => None,
            Ok(Some(state)) => match self.check_restored(&state, trip_id, events, log_fingerprint) {
                Ok(()) => {
                    return Ok(Started {
                        state,
                        origin: StateOrigin::Restored,
                    })
                }
                Err(e) => Some(e.to_string()),
            },
            Err(e) => Some(e.to_string()),
        };

        let state = self.fresh(trip_id, events, total_distance, log_fingerprint)?;
        let origin = match discarded {
            Some(reason) => {
                log::warn!("discarding stored tracking state for {}: {}", trip_id, reason);
                StateOrigin::Discarded { reason }
            }
            None => StateOrigin::Fresh,
        };

        Ok(Started { state, origin })
    }

    fn advance(
        &self,
        state: &TrackingState,
        events: &[GpsEvent],
        total_distance: f64,
    ) -> Result<TrackingState, FleetError> {
        let next = if self.is_terminal(state, events) {
            self.fresh(&state.trip_id, events, total_distance, state.log_fingerprint)?
        } else {
            step(state, events, total_distance)?
        };

        self.persist(&next)?;
        Ok(next)
    }

    fn reset(
        &self,
        trip_id: &str,
        events: &[GpsEvent],
        total_distance: f64,
    ) -> Result<TrackingState, FleetError> {
        let log_fingerprint = self.fingerprinter.fingerprint_log(events).ok();
        let state = self.fresh(trip_id, events, total_distance, log_fingerprint)?;
        self.persist(&state)?;
        Ok(state)
    }

    fn persists(&self) -> bool {
        true
    }

    fn loops(&self) -> bool {
        true
    }
}

fn step(state: &TrackingState, events: &[GpsEvent], total_distance: f64) -> Result<TrackingState, FleetError> {
    let next_index = state.current_index + 1;
    let next_event = &events[next_index];
    let next_location = Location::from(next_event.require_location(next_index)?);

    let prior = state.metrics.distance_traveled;
    let distance_traveled = match next_event.distance_travelled_km {
        Some(cumulative) => cumulative.max(prior),
        None => prior + geo::distance(&state.current_location, &next_location),
    };
    let total = if total_distance > 0.0 {
        total_distance
    } else {
        state.metrics.total_distance
    };

    let mut traveled_path = state.traveled_path.clone();
    traveled_path.push(next_location);

    let overspeed = next_event.is_overspeed();
    Ok(TrackingState {
        trip_id: state.trip_id.clone(),
        current_index: next_index,
        current_location: next_location,
        current_event: next_event.clone(),
        traveled_path,
        metrics: TrackingMetrics {
            distance_traveled,
            total_distance: total,
            progress_percent: progress_percent(distance_traveled, total),
            speed: next_event.speed_kmh().unwrap_or(state.metrics.speed),
            signal_quality: next_event
                .signal_quality
                .clone()
                .unwrap_or_else(|| state.metrics.signal_quality.clone()),
            overspeed,
            battery: next_event.battery_level().unwrap_or(state.metrics.battery),
            violations: state.metrics.violations + u32::from(overspeed),
        },
        is_active: true,
        log_fingerprint: state.log_fingerprint,
    })
}
