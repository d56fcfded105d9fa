//! Core traits for replaying a trip's event log

use crate::error::{FleetError, StateError};
use crate::event::GpsEvent;
use crate::types::Location;
use serde::{de::DeserializeOwned, Serialize};

/// Replay state for one trip that can be advanced one event at a time
pub trait ReplayState: Clone + Serialize + DeserializeOwned {
    fn trip_id(&self) -> &str;

    /// 0-based cursor into the trip's event log
    fn current_index(&self) -> usize;

    fn current_location(&self) -> &Location;

    fn traveled_path(&self) -> &[Location];

    fn distance_traveled(&self) -> f64;

    fn progress_percent(&self) -> f64;

    /// Reflect the driver's play/pause flag, for states that carry one
    fn set_playing(&mut self, _playing: bool) {}

    /// Check the state's invariants against a log of `event_count` events
    fn validate(&self, event_count: usize) -> Result<(), StateError> {
        if event_count == 0 {
            return Err(StateError::InvariantViolated {
                reason: "event log is empty".to_string(),
            });
        }
        if self.current_index() >= event_count {
            return Err(StateError::InvariantViolated {
                reason: format!(
                    "cursor {} outside log of {} events",
                    self.current_index(),
                    event_count
                ),
            });
        }
        if self.traveled_path().len() != self.current_index() + 1 {
            return Err(StateError::InvariantViolated {
                reason: format!(
                    "traveled path has {} points at cursor {}",
                    self.traveled_path().len(),
                    self.current_index()
                ),
            });
        }
        if !(0.0..=100.0).contains(&self.progress_percent()) {
            return Err(StateError::InvariantViolated {
                reason: format!("progress {} outside [0, 100]", self.progress_percent()),
            });
        }
        Ok(())
    }
}

/// Where a freshly initialized state came from
#[derive(Debug, Clone, PartialEq)]
pub enum StateOrigin {
    Fresh,
    /// Rehydrated from the store
    Restored,
    /// A stored state existed but was unusable and was replaced by a fresh one
    Discarded { reason: String },
}

/// Initialized state plus its provenance
#[derive(Debug, Clone)]
pub struct Started<S> {
    pub state: S,
    pub origin: StateOrigin,
}

/// A replay policy: how a trip's state is created and stepped forward
pub trait Replayer {
    type State: ReplayState;

    /// Create the state for `trip_id`, reporting where it came from
    fn start(
        &self,
        trip_id: &str,
        events: &[GpsEvent],
        total_distance: f64,
    ) -> Result<Started<Self::State>, FleetError>;

    /// Advance by exactly one event, or apply the terminal policy at the end of the log
    fn advance(
        &self,
        state: &Self::State,
        events: &[GpsEvent],
        total_distance: f64,
    ) -> Result<Self::State, FleetError>;

    fn initialize(
        &self,
        trip_id: &str,
        events: &[GpsEvent],
        total_distance: f64,
    ) -> Result<Self::State, FleetError> {
        self.start(trip_id, events, total_distance).map(|started| started.state)
    }

    /// State at the first event, ignoring anything previously stored
    fn reset(
        &self,
        trip_id: &str,
        events: &[GpsEvent],
        total_distance: f64,
    ) -> Result<Self::State, FleetError> {
        self.initialize(trip_id, events, total_distance)
    }

    /// Whether `advance` writes the new state to a backing store
    fn persists(&self) -> bool {
        false
    }

    /// Whether `advance` on the last event wraps to the first one instead of halting
    fn loops(&self) -> bool {
        false
    }

    /// The cursor sits on (or past) the last event
    fn is_terminal(&self, state: &Self::State, events: &[GpsEvent]) -> bool {
        state.current_index() >= events.len().saturating_sub(1)
    }
}
