//! Raw GPS/telemetry events as they appear in a recorded trip log
//!
//! The log format is loose: apart from identity, type and timestamp every field is
//! optional, and unknown fields are carried through untouched in [`GpsEvent::extra`].

use crate::error::{InputError, SerializationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of a telemetry event
///
/// Serialized with the snake_case wire names of the recorded logs. Names this crate
/// does not know are kept verbatim in [`EventType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    TripStarted,
    VehicleStopped,
    RefuelingStarted,
    RefuelingCompleted,
    TripCompleted,
    TripCancelled,
    DeviceError,
    SignalLost,
    SignalRecovered,
    SpeedingDetected,
    HarshAcceleration,
    HarshBraking,
    FuelLevelChange,
    BatteryLow,
    BatteryCritical,
    LocationUpdated,
    EtaUpdated,
    DelayDetected,
    DelayResolved,
    ExcessiveIdling,
    RouteDeviation,
    GeofenceViolation,
    MaintenanceAlert,
    DriverFatigue,
    CollisionRisk,
    VehicleDiagnostic,
    CheckpointReached,
    Other(String),
}

impl EventType {
    /// Every known kind, in wire order
    pub const KNOWN: [EventType; 27] = [
        EventType::TripStarted,
        EventType::VehicleStopped,
        EventType::RefuelingStarted,
        EventType::RefuelingCompleted,
        EventType::TripCompleted,
        EventType::TripCancelled,
        EventType::DeviceError,
        EventType::SignalLost,
        EventType::SignalRecovered,
        EventType::SpeedingDetected,
        EventType::HarshAcceleration,
        EventType::HarshBraking,
        EventType::FuelLevelChange,
        EventType::BatteryLow,
        EventType::BatteryCritical,
        EventType::LocationUpdated,
        EventType::EtaUpdated,
        EventType::DelayDetected,
        EventType::DelayResolved,
        EventType::ExcessiveIdling,
        EventType::RouteDeviation,
        EventType::GeofenceViolation,
        EventType::MaintenanceAlert,
        EventType::DriverFatigue,
        EventType::CollisionRisk,
        EventType::VehicleDiagnostic,
        EventType::CheckpointReached,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            EventType::TripStarted => "trip_started",
            EventType::VehicleStopped => "vehicle_stopped",
            EventType::RefuelingStarted => "refueling_started",
            EventType::RefuelingCompleted => "refueling_completed",
            EventType::TripCompleted => "trip_completed",
            EventType::TripCancelled => "trip_cancelled",
            EventType::DeviceError => "device_error",
            EventType::SignalLost => "signal_lost",
            EventType::SignalRecovered => "signal_recovered",
            EventType::SpeedingDetected => "speeding_detected",
            EventType::HarshAcceleration => "harsh_acceleration",
            EventType::HarshBraking => "harsh_braking",
            EventType::FuelLevelChange => "fuel_level_change",
            EventType::BatteryLow => "battery_low",
            EventType::BatteryCritical => "battery_critical",
            EventType::LocationUpdated => "location_updated",
            EventType::EtaUpdated => "eta_updated",
            EventType::DelayDetected => "delay_detected",
            EventType::DelayResolved => "delay_resolved",
            EventType::ExcessiveIdling => "excessive_idling",
            EventType::RouteDeviation => "route_deviation",
            EventType::GeofenceViolation => "geofence_violation",
            EventType::MaintenanceAlert => "maintenance_alert",
            EventType::DriverFatigue => "driver_fatigue",
            EventType::CollisionRisk => "collision_risk",
            EventType::VehicleDiagnostic => "vehicle_diagnostic",
            EventType::CheckpointReached => "checkpoint_reached",
            EventType::Other(name) => name,
        }
    }

    /// Whether the event closes the trip one way or another
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::TripCompleted | EventType::TripCancelled)
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        EventType::KNOWN
            .iter()
            .find(|kind| kind.as_str() == value)
            .cloned()
            .unwrap_or(EventType::Other(value))
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        EventType::from(value.to_string())
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connectivity quality reported by the tracking device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalQuality {
    Poor,
    Fair,
    Good,
    Excellent,
    Other(String),
}

impl SignalQuality {
    pub fn as_str(&self) -> &str {
        match self {
            SignalQuality::Poor => "poor",
            SignalQuality::Fair => "fair",
            SignalQuality::Good => "good",
            SignalQuality::Excellent => "excellent",
            SignalQuality::Other(name) => name,
        }
    }

    /// Good or excellent
    pub fn is_healthy(&self) -> bool {
        matches!(self, SignalQuality::Good | SignalQuality::Excellent)
    }
}

impl Default for SignalQuality {
    fn default() -> Self {
        SignalQuality::Good
    }
}

impl From<String> for SignalQuality {
    fn from(value: String) -> Self {
        match value.as_str() {
            "poor" => SignalQuality::Poor,
            "fair" => SignalQuality::Fair,
            "good" => SignalQuality::Good,
            "excellent" => SignalQuality::Excellent,
            _ => SignalQuality::Other(value),
        }
    }
}

impl From<SignalQuality> for String {
    fn from(value: SignalQuality) -> Self {
        match value {
            SignalQuality::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position fix attached to an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsLocation {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_meters: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GpsLocation {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            accuracy_meters: None,
            altitude_meters: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_kmh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_degrees: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moving: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charging: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One timestamped telemetry reading belonging to a trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsEvent {
    pub event_id: String,
    pub event_type: EventType,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub vehicle_id: String,
    pub trip_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GpsLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<Movement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_travelled_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_quality: Option<SignalQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overspeed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_hours: Option<f64>,
    /// Fields the log carries that this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GpsEvent {
    pub fn new(
        event_id: impl Into<String>,
        event_type: EventType,
        timestamp: DateTime<Utc>,
        vehicle_id: impl Into<String>,
        trip_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type,
            timestamp,
            vehicle_id: vehicle_id.into(),
            trip_id: trip_id.into(),
            location: None,
            movement: None,
            device: None,
            distance_travelled_km: None,
            signal_quality: None,
            overspeed: None,
            planned_distance_km: None,
            estimated_duration_hours: None,
            extra: Map::new(),
        }
    }

    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.location = Some(GpsLocation::new(lat, lng));
        self
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.movement = Some(Movement {
            speed_kmh: Some(speed_kmh),
            heading_degrees: None,
            moving: Some(speed_kmh > 0.0),
            extra: Map::new(),
        });
        self
    }

    pub fn with_battery(mut self, battery_level: f64) -> Self {
        self.device = Some(Device {
            battery_level: Some(battery_level),
            charging: Some(false),
            extra: Map::new(),
        });
        self
    }

    pub fn with_distance(mut self, distance_travelled_km: f64) -> Self {
        self.distance_travelled_km = Some(distance_travelled_km);
        self
    }

    pub fn with_signal(mut self, quality: SignalQuality) -> Self {
        self.signal_quality = Some(quality);
        self
    }

    pub fn with_overspeed(mut self, overspeed: bool) -> Self {
        self.overspeed = Some(overspeed);
        self
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    pub fn is_located(&self) -> bool {
        self.location.is_some()
    }

    pub fn is_overspeed(&self) -> bool {
        self.overspeed.unwrap_or(false)
    }

    /// Reported speed; a movement block without a speed reads as stationary
    pub fn speed_kmh(&self) -> Option<f64> {
        self.movement.as_ref().map(|m| m.speed_kmh.unwrap_or(0.0))
    }

    pub fn battery_level(&self) -> Option<f64> {
        self.device.as_ref().and_then(|d| d.battery_level)
    }

    /// Location of the event at `index`, or a `MalformedEvent` naming it
    pub fn require_location(&self, index: usize) -> Result<&GpsLocation, InputError> {
        self.location
            .as_ref()
            .ok_or_else(|| InputError::malformed(&self.trip_id, index, &self.event_id, "location"))
    }
}

/// Parse a JSON array of events belonging to one trip
pub fn parse_event_log(json: &str) -> Result<Vec<GpsEvent>, SerializationError> {
    serde_json::from_str(json).map_err(|e| SerializationError::DeserializationFailed {
        reason: format!("Event log parse failed: {}", e),
    })
}

/// Parse a JSON array of per-trip event arrays
pub fn parse_trip_logs(json: &str) -> Result<Vec<Vec<GpsEvent>>, SerializationError> {
    serde_json::from_str(json).map_err(|e| SerializationError::DeserializationFailed {
        reason: format!("Trip log batch parse failed: {}", e),
    })
}

/// Serialize an event log back to its JSON array form
pub fn to_event_log_json(events: &[GpsEvent]) -> Result<String, SerializationError> {
    serde_json::to_string(events).map_err(|e| SerializationError::SerializationFailed {
        reason: format!("Event log encode failed: {}", e),
    })
}

/// Timestamps accept RFC 3339, naive ISO-8601 (read as UTC) and epoch milliseconds.
/// They are always written back as RFC 3339 with millisecond precision.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Millis(i64),
        Text(String),
    }

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Some(parsed.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", ms))),
            RawTimestamp::Text(text) => {
                parse(&text).ok_or_else(|| D::Error::custom(format!("unparseable timestamp: {}", text)))
            }
        }
    }
}
