//! Playback replay: play/pause/speed over a trip, halting at the last event
//!
//! Distance is accumulated step by step from haversine segment lengths, so
//! playback works on logs that carry no cumulative distance field.

use crate::error::{FleetError, InputError};
use crate::event::GpsEvent;
use crate::geo;
use crate::traits::{ReplayState, Replayer, StateOrigin, Started};
use crate::types::{Location, PlaybackSpeed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackMetrics {
    pub distance_traveled: f64,
    pub planned_distance: f64,
    pub progress_percent: f64,
    pub speed: f64,
    pub battery: f64,
    pub violations: u32,
}

/// In-memory replay position for one trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub trip_id: String,
    pub current_event_index: usize,
    pub is_playing: bool,
    pub speed: PlaybackSpeed,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub current_time: DateTime<Utc>,
    pub traveled_path: Vec<Location>,
    pub current_location: Location,
    pub current_event: GpsEvent,
    pub metrics: PlaybackMetrics,
}

impl ReplayState for PlaybackState {
    fn trip_id(&self) -> &str {
        &self.trip_id
    }

    fn current_index(&self) -> usize {
        self.current_event_index
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

    fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
    }
}

/// Halting replay policy
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackEngine;

impl PlaybackEngine {
    pub fn new() -> Self {
        Self
    }

    /// Advance from a fresh state until the last event, returning the final state
    pub fn replay_all(
        &self,
        trip_id: &str,
        events: &[GpsEvent],
        planned_distance: f64,
    ) -> Result<PlaybackState, FleetError> {
        let mut state = self.initialize(trip_id, events, planned_distance)?;
        while !self.is_terminal(&state, events) {
            state = self.advance(&state, events, planned_distance)?;
        }
        Ok(state)
    }
}

impl Replayer for PlaybackEngine {
    type State = PlaybackState;

    fn start(
        &self,
        trip_id: &str,
        events: &[GpsEvent],
        planned_distance: f64,
    ) -> Result<Started<PlaybackState>, FleetError> {
        let first = events
            .first()
            .ok_or_else(|| InputError::invalid(format!("Trip {} has no events", trip_id)))?;
        let start = Location::from(first.require_location(0)?);

        let state = PlaybackState {
            trip_id: trip_id.to_string(),
            current_event_index: 0,
            is_playing: false,
            speed: PlaybackSpeed::default(),
            current_time: first.timestamp,
            traveled_path: vec![start],
            current_location: start,
            current_event: first.clone(),
            metrics: PlaybackMetrics {
                distance_traveled: 0.0,
                planned_distance: planned_distance.max(0.0),
                progress_percent: 0.0,
                speed: 0.0,
                battery: 100.0,
                violations: 0,
            },
        };

        Ok(Started {
            state,
            origin: StateOrigin::Fresh,
        })
    }

    fn advance(
        &self,
        state: &PlaybackState,
        events: &[GpsEvent],
        planned_distance: f64,
    ) -> Result<PlaybackState, FleetError> {
        let last_index = events
            .len()
            .checked_sub(1)
            .ok_or_else(|| InputError::invalid(format!("Trip {} has no events", state.trip_id)))?;

        if state.current_event_index >= last_index {
            let mut halted = state.clone();
            halted.is_playing = false;
            if state.current_event_index > last_index {
                // Cursor from a longer log: sit on this log's last event
                let last_event = &events[last_index];
                halted.current_event_index = last_index;
                halted.traveled_path.truncate(last_index + 1);
                if let Some(location) = halted.traveled_path.last() {
                    halted.current_location = *location;
                }
                halted.current_event = last_event.clone();
                halted.current_time = last_event.timestamp;
            }
            return Ok(halted);
        }

        let next_index = state.current_event_index + 1;
        let next_event = &events[next_index];
        let next_location = Location::from(next_event.require_location(next_index)?);

        let planned = if planned_distance > 0.0 {
            planned_distance
        } else {
            state.metrics.planned_distance
        };
        let distance_traveled =
            state.metrics.distance_traveled + geo::distance(&state.current_location, &next_location);

        let mut traveled_path = state.traveled_path.clone();
        traveled_path.push(next_location);

        Ok(PlaybackState {
            trip_id: state.trip_id.clone(),
            current_event_index: next_index,
            is_playing: state.is_playing,
            speed: state.speed,
            current_time: next_event.timestamp,
            traveled_path,
            current_location: next_location,
            current_event: next_event.clone(),
            metrics: PlaybackMetrics {
                distance_traveled,
                planned_distance: planned,
                progress_percent: progress_percent(distance_traveled, planned),
                speed: next_event.speed_kmh().unwrap_or(state.metrics.speed),
                battery: next_event.battery_level().unwrap_or(state.metrics.battery),
                violations: state.metrics.violations + u32::from(next_event.is_overspeed()),
            },
        })
    }
}

/// `distance / planned` as a percentage clamped to `[0, 100]`; 0 when nothing is planned
pub fn progress_percent(distance: f64, planned: f64) -> f64 {
    if planned <= 0.0 || !distance.is_finite() {
        return 0.0;
    }
    (distance / planned * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use chrono::TimeZone;

    fn log(n: usize) -> Vec<GpsEvent> {
        (0..n)
            .map(|i| {
                GpsEvent::new(
                    format!("evt_{}", i),
                    EventType::LocationUpdated,
                    Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
                    "VH_1",
                    "trip_1",
                )
                .with_location(0.0, i as f64 * 0.01)
            })
            .collect()
    }

    #[test]
    fn test_initialize_defaults() {
        let events = log(3);
        let state = PlaybackEngine.initialize("trip_1", &events, 10.0).unwrap();
        assert_eq!(state.current_event_index, 0);
        assert_eq!(state.traveled_path.len(), 1);
        assert_eq!(state.metrics.battery, 100.0);
        assert!(!state.is_playing);
    }

    #[test]
    fn test_advance_accumulates_distance() {
        let events = log(3);
        let engine = PlaybackEngine::new();
        let s0 = engine.initialize("trip_1", &events, 10.0).unwrap();
        let s1 = engine.advance(&s0, &events, 10.0).unwrap();
        let s2 = engine.advance(&s1, &events, 10.0).unwrap();

        let segment = geo::distance(
            events[0].location.as_ref().unwrap(),
            events[1].location.as_ref().unwrap(),
        );
        assert!((s1.metrics.distance_traveled - segment).abs() < 1e-9);
        assert!(s2.metrics.distance_traveled > s1.metrics.distance_traveled);
        assert_eq!(s2.traveled_path.len(), 3);
    }

    #[test]
    fn test_halt_at_end_keeps_cursor() {
        let events = log(2);
        let engine = PlaybackEngine::new();
        let mut state = engine.initialize("trip_1", &events, 10.0).unwrap();
        state.is_playing = true;
        let end = engine.advance(&state, &events, 10.0).unwrap();
        assert!(end.is_playing);
        let halted = engine.advance(&end, &events, 10.0).unwrap();
        assert_eq!(halted.current_event_index, 1);
        assert!(!halted.is_playing);
        assert_eq!(halted.traveled_path, end.traveled_path);
    }

    #[test]
    fn test_cursor_past_shorter_log_is_clamped() {
        let long = log(5);
        let short = log(3);
        let engine = PlaybackEngine::new();
        let state = engine.replay_all("trip_1", &long, 10.0).unwrap();
        assert_eq!(state.current_event_index, 4);

        let halted = engine.advance(&state, &short, 10.0).unwrap();
        assert_eq!(halted.current_event_index, 2);
        assert_eq!(halted.traveled_path.len(), 3);
        assert_eq!(halted.current_location, halted.traveled_path[2]);
        assert_eq!(halted.current_event.event_id, "evt_2");
        assert!(halted.validate(short.len()).is_ok());
    }

    #[test]
    fn test_progress_clamped() {
        assert_eq!(progress_percent(50.0, 10.0), 100.0);
        assert_eq!(progress_percent(5.0, 10.0), 50.0);
        assert_eq!(progress_percent(5.0, 0.0), 0.0);
    }
}
