//! Error types for the fleet replay engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

impl FleetError {
    /// True when the error stems from an empty or under-located event log
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, FleetError::Input(InputError::InvalidInput { .. }))
    }

    /// True when a specific event in the log was missing a required field
    pub fn is_malformed_event(&self) -> bool {
        matches!(self, FleetError::Input(InputError::MalformedEvent { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Malformed event {event_id} at index {index} of trip {trip_id}: missing {field}")]
    MalformedEvent {
        trip_id: String,
        index: usize,
        event_id: String,
        field: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl InputError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        InputError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn malformed(
        trip_id: impl Into<String>,
        index: usize,
        event_id: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        InputError::MalformedEvent {
            trip_id: trip_id.into(),
            index,
            event_id: event_id.into(),
            field: field.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("State invariant violated: {reason}")]
    InvariantViolated { reason: String },

    #[error("State mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("Read failed for key {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializationError {
    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Deserialization failed: {reason}")]
    DeserializationFailed { reason: String },
}
