//! Core data types for the trip aggregate and replay output

use crate::event::{Device, EventType, GpsLocation, Movement, SignalQuality};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A lat/lng point as consumed by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            accuracy: None,
        }
    }

    /// Exact coordinate equality, ignoring accuracy
    pub fn same_point(&self, other: &Location) -> bool {
        self.lat == other.lat && self.lng == other.lng
    }
}

impl From<&GpsLocation> for Location {
    fn from(value: &GpsLocation) -> Self {
        Self {
            lat: value.lat,
            lng: value.lng,
            accuracy: value.accuracy_meters,
        }
    }
}

/// Lifecycle status of a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TripStatus {
    Planned,
    #[serde(rename = "In-Progress")]
    InProgress,
    Paused,
    Refueling,
    Completed,
    Cancelled,
    Error,
}

impl TripStatus {
    /// Completed or cancelled
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TripStatus::Planned => "Planned",
            TripStatus::InProgress => "In-Progress",
            TripStatus::Paused => "Paused",
            TripStatus::Refueling => "Refueling",
            TripStatus::Completed => "Completed",
            TripStatus::Cancelled => "Cancelled",
            TripStatus::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Aggregated metrics derived from a trip's event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripMetrics {
    pub progress_percent: f64,
    pub distance_travelled: f64,
    pub planned_distance: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub eta: DateTime<Utc>,
    pub avg_speed: f64,
    pub max_speed: f64,
    pub fuel_used: f64,
    pub fuel_level: f64,
    pub battery_level: f64,
    pub safety_score: f64,
    pub signal_health: f64,
    /// Milliseconds spent stopped
    pub dwell_time: i64,
    pub violations: u32,
    pub refuels: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub severity: Severity,
    pub source: String,
}

/// Raw sub-objects of an event, kept exactly as they were logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GpsLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<Movement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_quality: Option<SignalQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_travelled_km: Option<f64>,
}

/// Normalized projection of a raw event onto the trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetEvent {
    pub id: String,
    pub trip_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub data: EventData,
    pub metadata: EventMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    SlaBreach,
    Speeding,
    SignalLost,
    FuelLow,
    BatteryLow,
    DeviceError,
    Violation,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub trip_id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub action_required: bool,
}

/// Synthetic timeline marker for the start and destination of a trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub location: Location,
    pub name: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub reached_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub planned_time: DateTime<Utc>,
}

/// Aggregate view of one vehicle's journey, derived from its event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub vehicle_id: String,
    pub driver_id: String,
    pub start_location: Location,
    pub end_location: Location,
    pub current_location: Location,
    pub planned_route: Vec<Location>,
    pub status: TripStatus,
    pub metrics: TripMetrics,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expected_end_time: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub actual_end_time: Option<DateTime<Utc>>,
    pub events: Vec<FleetEvent>,
    pub alerts: Vec<Alert>,
    pub checkpoints: Vec<Checkpoint>,
}

/// Playback rate multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlaybackSpeed {
    #[default]
    #[serde(rename = "1")]
    X1,
    #[serde(rename = "5")]
    X5,
    #[serde(rename = "10")]
    X10,
}

impl PlaybackSpeed {
    pub fn multiplier(&self) -> u32 {
        match self {
            PlaybackSpeed::X1 => 1,
            PlaybackSpeed::X5 => 5,
            PlaybackSpeed::X10 => 10,
        }
    }

    pub fn from_multiplier(multiplier: u32) -> Option<Self> {
        match multiplier {
            1 => Some(PlaybackSpeed::X1),
            5 => Some(PlaybackSpeed::X5),
            10 => Some(PlaybackSpeed::X10),
            _ => None,
        }
    }
}

/// Blake3 digest of an event log or trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
