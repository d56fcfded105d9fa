//! Content fingerprints using Blake3

use crate::error::SerializationError;
use crate::event::GpsEvent;
use crate::types::{Fingerprint, Trip};
use blake3::Hasher as Blake3Hasher;
use serde::Serialize;

/// Fingerprinter hashes serialized content into a [`Fingerprint`]
///
/// The JSON encoding of events and trips has a fixed field order, so equal values
/// always hash equal across runs and platforms.
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {}

impl Fingerprinter {
    pub fn new() -> Self {
        Self {}
    }

    /// Hash any serializable value
    pub fn fingerprint<T: Serialize + ?Sized>(&self, value: &T) -> Result<Fingerprint, SerializationError> {
        let bytes = serde_json::to_vec(value).map_err(|e| SerializationError::SerializationFailed {
            reason: format!("Fingerprint encoding failed: {}", e),
        })?;

        let mut hasher = Blake3Hasher::new();
        hasher.update(&bytes);
        Ok(Fingerprint(*hasher.finalize().as_bytes()))
    }

    /// Identity of an event log, used to tie persisted replay state to its source
    pub fn fingerprint_log(&self, events: &[GpsEvent]) -> Result<Fingerprint, SerializationError> {
        self.fingerprint(events)
    }

    pub fn fingerprint_trip(&self, trip: &Trip) -> Result<Fingerprint, SerializationError> {
        self.fingerprint(trip)
    }
}
