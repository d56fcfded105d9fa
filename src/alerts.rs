//! Alerts derived from a trip's events, and a newest-first alert book

use crate::event::EventType;
use crate::types::{Alert, AlertType, FleetEvent, Severity, Trip};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Fuel level (percent) below which a trip raises a fuel alert
pub const FUEL_LOW_LEVEL: f64 = 15.0;

/// Build the alerts a trip's events imply, in event order
///
/// `signal_lost` is resolved by a later `signal_recovered`, and `delay_detected` by a
/// later `delay_resolved`. A trip whose final fuel level is under [`FUEL_LOW_LEVEL`]
/// gets one fuel alert stamped with its last event.
pub fn derive_alerts(trip: &Trip) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for (i, event) in trip.events.iter().enumerate() {
        let Some((alert_type, severity, title)) = classify(&event.event_type) else {
            continue;
        };

        let mut alert = Alert {
            id: format!("alert_{}_{}", trip.id, event.id),
            trip_id: trip.id.clone(),
            alert_type,
            severity,
            title: title.to_string(),
            description: format!("{} at event {} ({})", title, i, event.event_type),
            timestamp: event.timestamp,
            resolved: false,
            resolved_at: None,
            action_required: severity == Severity::Critical,
        };

        let resolver = match event.event_type {
            EventType::SignalLost => Some(EventType::SignalRecovered),
            EventType::DelayDetected => Some(EventType::DelayResolved),
            _ => None,
        };
        if let Some(resolved_at) = resolver.and_then(|kind| first_after(&trip.events[i + 1..], &kind)) {
            alert.resolved = true;
            alert.resolved_at = Some(resolved_at);
        }

        alerts.push(alert);
    }

    if trip.metrics.fuel_level < FUEL_LOW_LEVEL {
        let at = trip.events.last().map(|e| e.timestamp).unwrap_or(trip.started_at);
        alerts.push(Alert {
            id: format!("alert_{}_fuel_low", trip.id),
            trip_id: trip.id.clone(),
            alert_type: AlertType::FuelLow,
            severity: Severity::Warning,
            title: "Fuel low".to_string(),
            description: format!("Fuel level at {:.1}%", trip.metrics.fuel_level),
            timestamp: at,
            resolved: false,
            resolved_at: None,
            action_required: true,
        });
    }

    alerts
}

fn classify(event_type: &EventType) -> Option<(AlertType, Severity, &'static str)> {
    let classified = match event_type {
        EventType::SpeedingDetected => (AlertType::Speeding, Severity::Warning, "Speeding detected"),
        EventType::SignalLost => (AlertType::SignalLost, Severity::Warning, "GPS signal lost"),
        EventType::DeviceError => (AlertType::DeviceError, Severity::Critical, "Device error"),
        EventType::BatteryLow => (AlertType::BatteryLow, Severity::Warning, "Battery low"),
        EventType::BatteryCritical => (AlertType::BatteryLow, Severity::Critical, "Battery critical"),
        EventType::GeofenceViolation => (AlertType::Violation, Severity::Warning, "Geofence violation"),
        EventType::RouteDeviation => (AlertType::Violation, Severity::Info, "Route deviation"),
        EventType::DelayDetected => (AlertType::SlaBreach, Severity::Warning, "Delay detected"),
        _ => return None,
    };
    Some(classified)
}

fn first_after(events: &[FleetEvent], kind: &EventType) -> Option<DateTime<Utc>> {
    events.iter().find(|e| &e.event_type == kind).map(|e| e.timestamp)
}

/// Alerts keyed by id, listed newest first
#[derive(Debug, Clone, Default)]
pub struct AlertBook {
    alerts: HashMap<String, Alert>,
    order: Vec<String>,
}

impl AlertBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an alert; a new id goes to the front
    pub fn add(&mut self, alert: Alert) {
        if !self.alerts.contains_key(&alert.id) {
            self.order.insert(0, alert.id.clone());
        }
        self.alerts.insert(alert.id.clone(), alert);
    }

    pub fn extend(&mut self, alerts: impl IntoIterator<Item = Alert>) {
        for alert in alerts {
            self.add(alert);
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Alert> {
        self.order.retain(|existing| existing != id);
        self.alerts.remove(id)
    }

    /// Mark an alert resolved at `at`; false when the id is unknown
    pub fn resolve(&mut self, id: &str, at: DateTime<Utc>) -> bool {
        match self.alerts.get_mut(id) {
            Some(alert) => {
                alert.resolved = true;
                alert.resolved_at = Some(at);
                true
            }
            None => false,
        }
    }

    /// Drop every resolved alert, returning how many were dropped
    pub fn clear_resolved(&mut self) -> usize {
        let before = self.alerts.len();
        self.alerts.retain(|_, alert| !alert.resolved);
        let alerts = &self.alerts;
        self.order.retain(|id| alerts.contains_key(id));
        before - self.alerts.len()
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.alerts.get(id)
    }

    /// Alerts newest first
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.order.iter().filter_map(|id| self.alerts.get(id))
    }

    pub fn active_count(&self) -> usize {
        self.alerts.values().filter(|a| !a.resolved).count()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}
