//! Heuristic constants for trip derivation and replay pacing

use crate::error::{InputError, SerializationError};
use crate::status::StatusPrecedence;
use crate::types::PlaybackSpeed;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Constants used when deriving a [`Trip`](crate::types::Trip) from an event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Upper bound on sampled route points, before the endpoints are forced in
    pub route_sample_target: usize,
    /// Used when the log carries no positive `planned_distance_km`
    pub default_planned_distance_km: f64,
    /// Used when the log carries no positive `estimated_duration_hours`
    pub default_estimated_duration_hours: f64,
    /// Lower bound for max speed as a multiple of the average speed
    pub max_speed_factor: f64,
    pub fuel_litres_per_km: f64,
    /// Fuel level percentage points lost per km
    pub fuel_level_drain_per_km: f64,
    pub fuel_level_floor: f64,
    pub safety_penalty_per_violation: f64,
    pub safety_score_floor: f64,
    pub safety_score_ceiling: f64,
    /// Signal health reported when no event carries signal quality
    pub signal_health_default: f64,
    /// Battery level reported when no event carries device data
    pub battery_level_default: f64,
    /// A stopped trip counts as paused only below this progress
    pub paused_progress_ceiling: f64,
    /// When set, an unmarked trip spanning at least this many hours, or at full
    /// progress, is treated as completed
    pub in_progress_window_hours: Option<f64>,
    pub status_precedence: StatusPrecedence,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            route_sample_target: 100,
            default_planned_distance_km: 1000.0,
            default_estimated_duration_hours: 24.0,
            max_speed_factor: 1.2,
            fuel_litres_per_km: 0.08,
            fuel_level_drain_per_km: 0.15,
            fuel_level_floor: 5.0,
            safety_penalty_per_violation: 3.0,
            safety_score_floor: 40.0,
            safety_score_ceiling: 100.0,
            signal_health_default: 85.0,
            battery_level_default: 80.0,
            paused_progress_ceiling: 50.0,
            in_progress_window_hours: None,
            status_precedence: StatusPrecedence::default(),
        }
    }
}

impl TransformConfig {
    pub fn from_json(json: &str) -> Result<Self, SerializationError> {
        serde_json::from_str(json).map_err(|e| SerializationError::DeserializationFailed {
            reason: format!("Transform config parse failed: {}", e),
        })
    }

    pub fn with_route_sample_target(mut self, target: usize) -> Self {
        self.route_sample_target = target;
        self
    }

    pub fn with_default_planned_distance_km(mut self, km: f64) -> Self {
        self.default_planned_distance_km = km;
        self
    }

    pub fn with_safety_penalty(mut self, per_violation: f64, floor: f64) -> Self {
        self.safety_penalty_per_violation = per_violation;
        self.safety_score_floor = floor;
        self
    }

    pub fn with_in_progress_window_hours(mut self, hours: Option<f64>) -> Self {
        self.in_progress_window_hours = hours;
        self
    }

    pub fn with_status_precedence(mut self, precedence: StatusPrecedence) -> Self {
        self.status_precedence = precedence;
        self
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if self.route_sample_target == 0 {
            return Err(InputError::InvalidConfig {
                reason: "route_sample_target must be positive".to_string(),
            });
        }
        if self.default_planned_distance_km <= 0.0 {
            return Err(InputError::InvalidConfig {
                reason: "default_planned_distance_km must be positive".to_string(),
            });
        }
        if self.safety_score_floor > self.safety_score_ceiling {
            return Err(InputError::InvalidConfig {
                reason: format!(
                    "safety_score_floor {} exceeds ceiling {}",
                    self.safety_score_floor, self.safety_score_ceiling
                ),
            });
        }
        if let Some(hours) = self.in_progress_window_hours {
            if hours <= 0.0 {
                return Err(InputError::InvalidConfig {
                    reason: "in_progress_window_hours must be positive".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Pacing and persistence settings for replay sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Tick period at 1x speed
    pub base_tick_ms: u64,
    pub storage_key_prefix: String,
    pub default_speed: PlaybackSpeed,
    /// Newest session log entries kept in memory, `None` for all
    pub max_log_entries: Option<usize>,
    /// Newest trace events kept in memory, `None` for all
    pub max_trace_events: Option<usize>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            base_tick_ms: 1000,
            storage_key_prefix: "fleet_trip_".to_string(),
            default_speed: PlaybackSpeed::X1,
            max_log_entries: Some(1024),
            max_trace_events: Some(1024),
        }
    }
}

impl ReplayConfig {
    /// Continuous tracking ticks every three seconds
    pub fn tracking() -> Self {
        Self {
            base_tick_ms: 3000,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SerializationError> {
        serde_json::from_str(json).map_err(|e| SerializationError::DeserializationFailed {
            reason: format!("Replay config parse failed: {}", e),
        })
    }

    pub fn with_base_tick_ms(mut self, ms: u64) -> Self {
        self.base_tick_ms = ms;
        self
    }

    pub fn with_storage_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_key_prefix = prefix.into();
        self
    }

    pub fn with_history_limits(mut self, log_entries: Option<usize>, trace_events: Option<usize>) -> Self {
        self.max_log_entries = log_entries;
        self.max_trace_events = trace_events;
        self
    }

    /// Wall-clock period between advances at `speed`
    pub fn tick_interval(&self, speed: PlaybackSpeed) -> Duration {
        Duration::from_millis(self.base_tick_ms / u64::from(speed.multiplier()))
    }

    pub fn storage_key(&self, trip_id: &str) -> String {
        format!("{}{}", self.storage_key_prefix, trip_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = TransformConfig::from_json(r#"{"fuel_litres_per_km": 0.1}"#).unwrap();
        assert_eq!(config.fuel_litres_per_km, 0.1);
        assert_eq!(config.route_sample_target, 100);
        assert_eq!(config.signal_health_default, 85.0);
    }

    #[test]
    fn test_validate_rejects_zero_sample_target() {
        let config = TransformConfig::default().with_route_sample_target(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval_scales_inversely() {
        let config = ReplayConfig::default();
        assert_eq!(config.tick_interval(PlaybackSpeed::X1), Duration::from_millis(1000));
        assert_eq!(config.tick_interval(PlaybackSpeed::X5), Duration::from_millis(200));
        assert_eq!(config.tick_interval(PlaybackSpeed::X10), Duration::from_millis(100));
    }

    #[test]
    fn test_storage_key() {
        assert_eq!(ReplayConfig::default().storage_key("trip_7"), "fleet_trip_trip_7");
    }
}
