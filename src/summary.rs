//! Read-only summaries over event logs, tracking states and trip sets

use crate::error::{FleetError, InputError};
use crate::event::{EventType, GpsEvent, SignalQuality};
use crate::geo;
use crate::playback::progress_percent;
use crate::tracking::TrackingState;
use crate::types::{Location, Trip, TripStatus};
use serde::{Deserialize, Serialize};

const MS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Distance and time covered up to a cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneySummary {
    pub events_covered: usize,
    pub total_events: usize,
    pub total_distance: f64,
    /// `"{h}h {m}m {s}s"`
    pub time_elapsed: String,
    pub avg_speed: f64,
}

/// Summarize `events[0..=current_index]`
///
/// The index is clamped to the log. Elapsed time runs from the first event to the
/// event at the cursor and never goes negative.
pub fn summarize(events: &[GpsEvent], current_index: usize) -> Result<JourneySummary, FleetError> {
    let last_index = events
        .len()
        .checked_sub(1)
        .ok_or_else(|| InputError::invalid("No events provided"))?;
    let index = current_index.min(last_index);

    let points = events[..=index]
        .iter()
        .enumerate()
        .map(|(i, event)| event.require_location(i).map(Location::from))
        .collect::<Result<Vec<_>, _>>()?;
    let total_distance = geo::path_length(&points);

    let elapsed_ms = (events[index].timestamp_ms() - events[0].timestamp_ms()).max(0);
    let avg_speed = if elapsed_ms > 0 {
        total_distance / (elapsed_ms as f64 / MS_PER_HOUR as f64)
    } else {
        0.0
    };

    Ok(JourneySummary {
        events_covered: index + 1,
        total_events: events.len(),
        total_distance,
        time_elapsed: format_elapsed(elapsed_ms),
        avg_speed,
    })
}

/// Format milliseconds as `"{h}h {m}m {s}s"`, truncating partial seconds
pub fn format_elapsed(elapsed_ms: i64) -> String {
    let ms = elapsed_ms.max(0);
    let hours = ms / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    format!("{}h {}m {}s", hours, minutes, seconds)
}

/// Live panel figures for one tracked trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSnapshot {
    pub trip_id: String,
    pub distance_covered: f64,
    pub total_distance: f64,
    pub progress_percent: f64,
    pub speed: f64,
    pub signal_quality: SignalQuality,
    pub overspeed: bool,
    pub battery: f64,
    pub current_event_type: EventType,
}

impl TrackingSnapshot {
    pub fn from_state(state: &TrackingState) -> Self {
        let metrics = &state.metrics;
        Self {
            trip_id: state.trip_id.clone(),
            distance_covered: metrics.distance_traveled,
            total_distance: metrics.total_distance,
            progress_percent: progress_percent(metrics.distance_traveled, metrics.total_distance),
            speed: metrics.speed,
            signal_quality: metrics.signal_quality.clone(),
            overspeed: metrics.overspeed,
            battery: metrics.battery,
            current_event_type: state.current_event.event_type.clone(),
        }
    }
}

/// Fleet-wide KPIs over a set of trips
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total_trips: usize,
    pub active_trips: usize,
    pub completed_trips: usize,
    pub cancelled_trips: usize,
    /// Completed share of all trips, in percent
    pub completion_rate: f64,
    /// Completed trips that ended by their expected end time, in percent of completed
    pub on_time_rate: f64,
    /// Planned km per litre, averaged over trips that used fuel
    pub avg_fuel_efficiency: f64,
    pub avg_safety_score: f64,
    pub total_violations: u32,
    pub active_alerts: usize,
}

impl FleetSummary {
    pub fn from_trips(trips: &[Trip]) -> Self {
        if trips.is_empty() {
            return Self::default();
        }

        let count = |status: TripStatus| trips.iter().filter(|t| t.status == status).count();
        let completed: Vec<&Trip> = trips
            .iter()
            .filter(|t| t.status == TripStatus::Completed)
            .collect();

        let on_time = completed
            .iter()
            .filter(|t| t.actual_end_time.is_some_and(|end| end <= t.expected_end_time))
            .count();

        let efficiencies: Vec<f64> = trips
            .iter()
            .filter(|t| t.metrics.fuel_used > 0.0)
            .map(|t| t.metrics.planned_distance / t.metrics.fuel_used)
            .collect();

        Self {
            total_trips: trips.len(),
            active_trips: count(TripStatus::InProgress),
            completed_trips: completed.len(),
            cancelled_trips: count(TripStatus::Cancelled),
            completion_rate: percent(completed.len(), trips.len()),
            on_time_rate: percent(on_time, completed.len()),
            avg_fuel_efficiency: average(&efficiencies),
            avg_safety_score: trips.iter().map(|t| t.metrics.safety_score).sum::<f64>()
                / trips.len() as f64,
            total_violations: trips.iter().map(|t| t.metrics.violations).sum(),
            active_alerts: trips
                .iter()
                .flat_map(|t| t.alerts.iter())
                .filter(|a| !a.resolved)
                .count(),
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0h 0m 0s");
        assert_eq!(format_elapsed(3_723_999), "1h 2m 3s");
        assert_eq!(format_elapsed(-5), "0h 0m 0s");
    }

    #[test]
    fn test_empty_fleet() {
        assert_eq!(FleetSummary::from_trips(&[]), FleetSummary::default());
    }

    #[test]
    fn test_percent_of_nothing() {
        assert_eq!(percent(3, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
