//! Fleet Trip Replay Engine
//!
//! Turns recorded GPS/telemetry event logs into trip aggregates with derived metrics,
//! and replays them one event at a time for playback and live-tracking views.

pub mod alerts;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod geo;
pub mod hasher;
pub mod logging;
pub mod playback;
pub mod status;
pub mod store;
pub mod summary;
pub mod synthetic;
pub mod tracking;
pub mod traits;
pub mod transformer;
pub mod types;

// Re-export core types and traits
pub use alerts::{derive_alerts, AlertBook};
pub use config::{ReplayConfig, TransformConfig};
pub use driver::{heading, FleetReplay, FleetTick, ReplaySession, Step};
pub use error::{FleetError, InputError, SerializationError, StateError, StorageError};
pub use event::{parse_event_log, parse_trip_logs, EventType, GpsEvent, GpsLocation, SignalQuality};
pub use hasher::Fingerprinter;
pub use logging::{LogEntry, LogLevel, ReplayLogger, ReplayTraceLog, TraceEvent, TraceEventType};
pub use playback::{PlaybackEngine, PlaybackMetrics, PlaybackState};
pub use status::{StatusEvidence, StatusPrecedence, StatusRule};
pub use store::{JsonSerializer, KeyValueStore, MemoryStore, StateSerializer};
pub use summary::{summarize, FleetSummary, JourneySummary, TrackingSnapshot};
pub use synthetic::SyntheticTripBuilder;
pub use tracking::{TrackingEngine, TrackingMetrics, TrackingState};
pub use traits::{ReplayState, Replayer, StateOrigin, Started};
pub use transformer::{BatchFailure, BatchOutcome, TripTransformer};
pub use types::{
    Alert, AlertType, Checkpoint, Fingerprint, FleetEvent, Location, PlaybackSpeed, Severity,
    Trip, TripMetrics, TripStatus,
};
