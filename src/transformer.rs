//! Event log to trip aggregate transformation

use crate::config::TransformConfig;
use crate::error::{FleetError, InputError};
use crate::event::{EventType, GpsEvent, GpsLocation};
use crate::status::StatusEvidence;
use crate::types::{
    Checkpoint, EventData, EventMetadata, FleetEvent, Location, Severity, Trip, TripMetrics,
    TripStatus,
};
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;

/// Builds [`Trip`] aggregates from recorded event logs
#[derive(Debug, Clone, Default)]
pub struct TripTransformer {
    config: TransformConfig,
}

/// A log that could not be turned into a trip
#[derive(Debug)]
pub struct BatchFailure {
    /// Position of the log in the batch
    pub index: usize,
    pub trip_id: Option<String>,
    pub error: FleetError,
}

/// Result of transforming many logs, with failures isolated per trip
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub trips: Vec<Trip>,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl TripTransformer {
    pub fn new(config: TransformConfig) -> Result<Self, FleetError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Derive a trip from the ordered events of exactly one trip
    pub fn transform(&self, events: &[GpsEvent]) -> Result<Trip, FleetError> {
        let (first, last) = match (events.first(), events.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(InputError::invalid("No events provided").into()),
        };
        check_trip_identity(events)?;

        let located: Vec<&GpsLocation> = events.iter().filter_map(|e| e.location.as_ref()).collect();
        if located.len() < 2 {
            return Err(InputError::invalid(format!(
                "Trip {} has {} located events, at least 2 are required",
                first.trip_id,
                located.len()
            ))
            .into());
        }

        let start_location = Location::from(located[0]);
        let end_location = Location::from(located[located.len() - 1]);
        let planned_route = sample_route(&located, self.config.route_sample_target);

        let started_at = first.timestamp;
        let last_at = last.timestamp;

        let metrics_base = self.derive_metrics(events);
        let evidence = StatusEvidence::collect(events, metrics_base.progress_percent);
        let status = self.config.status_precedence.resolve(&evidence, &self.config);

        let observed_hours = (last_at - started_at).num_milliseconds().max(0) as f64 / 3_600_000.0;
        let estimated_hours = first
            .estimated_duration_hours
            .filter(|h| *h > 0.0)
            .unwrap_or(self.config.default_estimated_duration_hours);
        let expected_end_time = started_at + hours(observed_hours.max(estimated_hours));
        let actual_end_time = (status == TripStatus::Completed).then_some(last_at);

        let metrics = TripMetrics {
            eta: expected_end_time,
            ..metrics_base
        };

        Ok(Trip {
            id: first.trip_id.clone(),
            vehicle_id: first.vehicle_id.clone(),
            driver_id: driver_id_for(&first.vehicle_id),
            start_location,
            end_location,
            current_location: end_location,
            planned_route,
            status,
            metrics,
            started_at,
            expected_end_time,
            actual_end_time,
            events: events.iter().map(project_event).collect(),
            alerts: Vec::new(),
            checkpoints: build_checkpoints(
                &first.trip_id,
                start_location,
                end_location,
                started_at,
                expected_end_time,
                actual_end_time,
            ),
        })
    }

    /// Transform many logs in parallel; one bad log never sinks the batch
    pub fn transform_batch(&self, logs: &[Vec<GpsEvent>]) -> BatchOutcome {
        let results: Vec<(usize, Result<Trip, FleetError>)> = logs
            .par_iter()
            .enumerate()
            .map(|(index, log)| (index, self.transform(log)))
            .collect();

        let mut outcome = BatchOutcome::default();
        for (index, result) in results {
            match result {
                Ok(trip) => outcome.trips.push(trip),
                Err(error) => {
                    let trip_id = logs[index].first().map(|e| e.trip_id.clone());
                    log::warn!(
                        "skipping trip log {} ({}): {}",
                        index,
                        trip_id.as_deref().unwrap_or("unknown"),
                        error
                    );
                    outcome.failures.push(BatchFailure {
                        index,
                        trip_id,
                        error,
                    });
                }
            }
        }
        outcome
    }

    /// Everything but the ETA, which depends on the trip's time bounds
    fn derive_metrics(&self, events: &[GpsEvent]) -> TripMetrics {
        let config = &self.config;
        let first = &events[0];
        let last = &events[events.len() - 1];

        let planned_distance = first
            .planned_distance_km
            .filter(|d| *d > 0.0)
            .unwrap_or(config.default_planned_distance_km);
        let distance_travelled = last.distance_travelled_km.unwrap_or(0.0).max(0.0);
        let progress_percent = (distance_travelled / planned_distance * 100.0)
            .round()
            .clamp(0.0, 100.0);

        let speeds: Vec<f64> = events.iter().filter_map(GpsEvent::speed_kmh).collect();
        let avg_speed = mean(&speeds).unwrap_or(0.0);
        let observed_max = speeds.iter().cloned().fold(0.0_f64, f64::max);
        let max_speed = observed_max.max(avg_speed * config.max_speed_factor);

        let batteries: Vec<f64> = events.iter().filter_map(GpsEvent::battery_level).collect();
        let battery_level = mean(&batteries).unwrap_or(config.battery_level_default);

        let violations = events.iter().filter(|e| e.is_overspeed()).count() as u32;
        let safety_score = (config.safety_score_ceiling
            - f64::from(violations) * config.safety_penalty_per_violation)
            .max(config.safety_score_floor);

        let signals: Vec<bool> = events
            .iter()
            .filter_map(|e| e.signal_quality.as_ref().map(|q| q.is_healthy()))
            .collect();
        let signal_health = if signals.is_empty() {
            config.signal_health_default
        } else {
            let healthy = signals.iter().filter(|ok| **ok).count();
            (healthy as f64 / signals.len() as f64 * 100.0).round()
        };

        let refuels = events
            .iter()
            .filter(|e| e.event_type == EventType::RefuelingCompleted)
            .count() as u32;

        TripMetrics {
            progress_percent,
            distance_travelled,
            planned_distance,
            eta: first.timestamp,
            avg_speed: avg_speed.round(),
            max_speed: max_speed.round(),
            fuel_used: distance_travelled * config.fuel_litres_per_km,
            fuel_level: (100.0 - distance_travelled * config.fuel_level_drain_per_km)
                .max(config.fuel_level_floor),
            battery_level: battery_level.round(),
            safety_score,
            signal_health,
            dwell_time: dwell_time_ms(events),
            violations,
            refuels,
        }
    }
}

/// Down-sample located points to roughly `target` entries, keeping the true endpoints
pub fn sample_route(located: &[&GpsLocation], target: usize) -> Vec<Location> {
    if located.is_empty() {
        return Vec::new();
    }

    let step = located.len().div_ceil(target.max(1)).max(1);
    let mut route: Vec<Location> = located
        .iter()
        .step_by(step)
        .map(|loc| Location::from(*loc))
        .collect();

    let start = Location::from(located[0]);
    let end = Location::from(located[located.len() - 1]);
    if !route.first().is_some_and(|loc| loc.same_point(&start)) {
        route.insert(0, start);
    }
    if !route.last().is_some_and(|loc| loc.same_point(&end)) {
        route.push(end);
    }
    route
}

/// `drv_<suffix>` where the suffix follows the first underscore of the vehicle id
pub fn driver_id_for(vehicle_id: &str) -> String {
    let suffix = vehicle_id
        .split('_')
        .nth(1)
        .filter(|s| !s.is_empty())
        .unwrap_or("001");
    format!("drv_{}", suffix)
}

/// Project a raw event into the trip's normalized event list
pub fn project_event(event: &GpsEvent) -> FleetEvent {
    FleetEvent {
        id: event.event_id.clone(),
        trip_id: event.trip_id.clone(),
        event_type: event.event_type.clone(),
        timestamp: event.timestamp,
        data: EventData {
            location: event.location.clone(),
            movement: event.movement.clone(),
            device: event.device.clone(),
            signal_quality: event.signal_quality.clone(),
            distance_travelled_km: event.distance_travelled_km,
        },
        metadata: EventMetadata {
            severity: if event.is_overspeed() {
                Severity::Warning
            } else {
                Severity::Info
            },
            source: "device".to_string(),
        },
    }
}

fn check_trip_identity(events: &[GpsEvent]) -> Result<(), InputError> {
    let trip_id = &events[0].trip_id;
    for (index, event) in events.iter().enumerate() {
        if event.event_id.is_empty() {
            return Err(InputError::malformed(trip_id, index, "<empty>", "event_id"));
        }
        if &event.trip_id != trip_id {
            return Err(InputError::malformed(trip_id, index, &event.event_id, "trip_id"));
        }
    }
    Ok(())
}

fn build_checkpoints(
    trip_id: &str,
    start: Location,
    end: Location,
    started_at: DateTime<Utc>,
    expected_end_time: DateTime<Utc>,
    actual_end_time: Option<DateTime<Utc>>,
) -> Vec<Checkpoint> {
    vec![
        Checkpoint {
            id: format!("cp_{}_start", trip_id),
            location: start,
            name: "Start Point".to_string(),
            reached_at: Some(started_at),
            planned_time: started_at,
        },
        Checkpoint {
            id: format!("cp_{}_end", trip_id),
            location: end,
            name: "Destination".to_string(),
            reached_at: actual_end_time,
            planned_time: expected_end_time,
        },
    ]
}

/// Time spent between an event reporting `moving: false` and the next event
fn dwell_time_ms(events: &[GpsEvent]) -> i64 {
    events
        .windows(2)
        .filter(|pair| {
            pair[0]
                .movement
                .as_ref()
                .and_then(|m| m.moving)
                .map(|moving| !moving)
                .unwrap_or(false)
        })
        .map(|pair| (pair[1].timestamp_ms() - pair[0].timestamp_ms()).max(0))
        .sum()
}

fn hours(value: f64) -> Duration {
    Duration::milliseconds((value * 3_600_000.0).round() as i64)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located(n: usize) -> Vec<GpsLocation> {
        (0..n).map(|i| GpsLocation::new(i as f64 * 0.01, 0.5)).collect()
    }

    #[test]
    fn test_sample_route_small_log_keeps_everything() {
        let points = located(10);
        let refs: Vec<&GpsLocation> = points.iter().collect();
        let route = sample_route(&refs, 100);
        assert_eq!(route.len(), 10);
    }

    #[test]
    fn test_sample_route_forces_end() {
        let points = located(250);
        let refs: Vec<&GpsLocation> = points.iter().collect();
        let route = sample_route(&refs, 100);
        // step 3 over 250 points lands on index 249, so nothing is appended
        assert_eq!(route.len(), 84);
        assert!(route[0].same_point(&Location::from(&points[0])));
        assert!(route.last().unwrap().same_point(&Location::from(&points[249])));
    }

    #[test]
    fn test_sample_route_appends_missed_end() {
        let points = located(251);
        let refs: Vec<&GpsLocation> = points.iter().collect();
        let route = sample_route(&refs, 100);
        // step 3 stops at index 249; index 250 must be forced in
        assert_eq!(route.len(), 85);
        assert!(route.last().unwrap().same_point(&Location::from(&points[250])));
    }

    #[test]
    fn test_driver_id_for() {
        assert_eq!(driver_id_for("VH_042"), "drv_042");
        assert_eq!(driver_id_for("truck"), "drv_001");
        assert_eq!(driver_id_for("veh_"), "drv_001");
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
    }
}
