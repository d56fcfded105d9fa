//! Trip status inference from event markers
//!
//! Status is decided by walking an ordered precedence table: the first rule whose
//! condition holds wins. The default order is
//! `Completed > Cancelled > Error > Refueling > Paused`, falling back to `In-Progress`.

use crate::config::TransformConfig;
use crate::event::{EventType, GpsEvent};
use crate::types::TripStatus;
use serde::{Deserialize, Serialize};

/// Facts about an event log that status rules look at
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusEvidence {
    pub has_completed: bool,
    pub has_cancelled: bool,
    pub has_device_error: bool,
    /// A refueling started and no later refueling completed
    pub refueling_open: bool,
    pub has_stopped: bool,
    pub progress_percent: f64,
    /// Wall time between the first and last event
    pub span_ms: i64,
}

impl StatusEvidence {
    pub fn collect(events: &[GpsEvent], progress_percent: f64) -> Self {
        let mut evidence = StatusEvidence {
            progress_percent,
            ..Default::default()
        };

        for event in events {
            match event.event_type {
                EventType::TripCompleted => evidence.has_completed = true,
                EventType::TripCancelled => evidence.has_cancelled = true,
                EventType::DeviceError => evidence.has_device_error = true,
                EventType::RefuelingStarted => evidence.refueling_open = true,
                EventType::RefuelingCompleted => evidence.refueling_open = false,
                EventType::VehicleStopped => evidence.has_stopped = true,
                _ => {}
            }
        }

        if let (Some(first), Some(last)) = (events.first(), events.last()) {
            evidence.span_ms = (last.timestamp_ms() - first.timestamp_ms()).max(0);
        }

        evidence
    }
}

/// One row of the precedence table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusRule {
    Completed,
    Cancelled,
    Error,
    Refueling,
    Paused,
}

impl StatusRule {
    pub fn status(&self) -> TripStatus {
        match self {
            StatusRule::Completed => TripStatus::Completed,
            StatusRule::Cancelled => TripStatus::Cancelled,
            StatusRule::Error => TripStatus::Error,
            StatusRule::Refueling => TripStatus::Refueling,
            StatusRule::Paused => TripStatus::Paused,
        }
    }

    pub fn matches(&self, evidence: &StatusEvidence, config: &TransformConfig) -> bool {
        match self {
            StatusRule::Completed => evidence.has_completed,
            StatusRule::Cancelled => evidence.has_cancelled,
            StatusRule::Error => evidence.has_device_error,
            StatusRule::Refueling => evidence.refueling_open,
            StatusRule::Paused => {
                evidence.has_stopped && evidence.progress_percent < config.paused_progress_ceiling
            }
        }
    }
}

/// Ordered status rules; earlier rules take precedence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusPrecedence(Vec<StatusRule>);

impl Default for StatusPrecedence {
    fn default() -> Self {
        Self(vec![
            StatusRule::Completed,
            StatusRule::Cancelled,
            StatusRule::Error,
            StatusRule::Refueling,
            StatusRule::Paused,
        ])
    }
}

impl StatusPrecedence {
    pub fn new(rules: Vec<StatusRule>) -> Self {
        Self(rules)
    }

    pub fn rules(&self) -> &[StatusRule] {
        &self.0
    }

    pub fn resolve(&self, evidence: &StatusEvidence, config: &TransformConfig) -> TripStatus {
        if let Some(rule) = self.0.iter().find(|rule| rule.matches(evidence, config)) {
            return rule.status();
        }

        match config.in_progress_window_hours {
            Some(hours) => {
                let window_ms = (hours * 3_600_000.0) as i64;
                if evidence.span_ms < window_ms && evidence.progress_percent < 100.0 {
                    TripStatus::InProgress
                } else {
                    TripStatus::Completed
                }
            }
            None => TripStatus::InProgress,
        }
    }
}
