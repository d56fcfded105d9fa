//! Replay sessions: play/pause/speed control around a [`Replayer`], one per trip
//!
//! A session owns its trip's event log and current state. `tick` takes `&mut self`,
//! so at most one advance per trip is ever in flight. Hosts call `tick` on a timer
//! of `tick_interval()`; the speed only changes that period and never skips events.

use crate::config::ReplayConfig;
use crate::error::FleetError;
use crate::event::GpsEvent;
use crate::geo;
use crate::hasher::Fingerprinter;
use crate::logging::{LogEntry, LogLevel, ReplayLogger, ReplayTraceLog, TraceEvent, TraceEventType};
use crate::summary::{summarize, JourneySummary};
use crate::traits::{ReplayState, Replayer, StateOrigin};
use crate::types::{Fingerprint, PlaybackSpeed};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Moved to the given event index
    Advanced(usize),
    /// Sat on the last event and stopped playing
    Halted(usize),
    /// Wrapped back to the first event
    Looped,
}

/// Play/pause/speed control for one trip
pub struct ReplaySession<R: Replayer> {
    replayer: R,
    trip_id: String,
    events: Vec<GpsEvent>,
    total_distance: f64,
    state: R::State,
    playing: bool,
    speed: PlaybackSpeed,
    config: ReplayConfig,
    log_fingerprint: Option<Fingerprint>,
    logger: ReplayLogger,
    trace: ReplayTraceLog,
}

impl<R: Replayer> ReplaySession<R> {
    /// Create a new session, rehydrating state where the replayer supports it
    pub fn new(
        replayer: R,
        trip_id: impl Into<String>,
        events: Vec<GpsEvent>,
        total_distance: f64,
        config: ReplayConfig,
    ) -> Result<Self, FleetError> {
        let trip_id = trip_id.into();
        let started = replayer.start(&trip_id, &events, total_distance)?;
        let log_fingerprint = Fingerprinter::new().fingerprint_log(&events).ok();

        let index = started.state.current_index();
        let start_time = events.first().map(|e| e.timestamp).unwrap_or_default();
        let at = event_time(&events, index);

        let mut session = Self {
            speed: config.default_speed,
            trace: ReplayTraceLog::new(trip_id.clone(), start_time).with_capacity(config.max_trace_events),
            logger: ReplayLogger::default().with_capacity(config.max_log_entries),
            replayer,
            trip_id,
            events,
            total_distance,
            state: started.state,
            playing: false,
            config,
            log_fingerprint,
        };

        let (event_type, level, message) = match &started.origin {
            StateOrigin::Fresh => (TraceEventType::SessionStarted, LogLevel::Info, "Session started".to_string()),
            StateOrigin::Restored => (
                TraceEventType::Rehydrated,
                LogLevel::Info,
                format!("Resumed from stored state at event {}", index),
            ),
            StateOrigin::Discarded { reason } => (
                TraceEventType::RehydrationFailed,
                LogLevel::Warn,
                format!("Stored state discarded: {}", reason),
            ),
        };
        let reason = match &started.origin {
            StateOrigin::Discarded { reason } => Some(reason.clone()),
            _ => None,
        };
        session.record_with(event_type, at, index, reason.map(|r| ("reason", r)));
        session.log(level, at, message);

        Ok(session)
    }

    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    pub fn events(&self) -> &[GpsEvent] {
        &self.events
    }

    pub fn state(&self) -> &R::State {
        &self.state
    }

    pub fn replayer(&self) -> &R {
        &self.replayer
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    pub fn logger(&self) -> &ReplayLogger {
        &self.logger
    }

    pub fn trace(&self) -> &ReplayTraceLog {
        &self.trace
    }

    pub fn play(&mut self) {
        self.set_playing(true);
    }

    pub fn pause(&mut self) {
        self.set_playing(false);
    }

    pub fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.speed = speed;
        let at = self.current_time();
        self.log(LogLevel::Debug, at, format!("Speed set to {}x", speed.multiplier()));
    }

    /// Wall-clock period between ticks at the current speed
    pub fn tick_interval(&self) -> Duration {
        self.config.tick_interval(self.speed)
    }

    /// Back to the first event, paused
    pub fn reset(&mut self) -> Result<(), FleetError> {
        let mut state = self.replayer.reset(&self.trip_id, &self.events, self.total_distance)?;
        state.set_playing(false);
        self.state = state;
        self.playing = false;

        let at = event_time(&self.events, 0);
        self.record(TraceEventType::SessionStarted, at, 0);
        self.log(LogLevel::Info, at, "Session reset");
        Ok(())
    }

    /// Advance once if playing; `None` when paused
    pub fn tick(&mut self) -> Result<Option<Step>, FleetError> {
        if !self.playing {
            return Ok(None);
        }

        let was_terminal = self.replayer.is_terminal(&self.state, &self.events);
        let mut next = match self.replayer.advance(&self.state, &self.events, self.total_distance) {
            Ok(next) => next,
            Err(e) => {
                let at = self.current_time();
                self.log(LogLevel::Error, at, format!("Advance failed: {}", e));
                return Err(e);
            }
        };

        let index = next.current_index();
        let at = event_time(&self.events, index);
        let step = if !was_terminal {
            Step::Advanced(index)
        } else if self.replayer.loops() {
            Step::Looped
        } else {
            self.playing = false;
            Step::Halted(index)
        };
        next.set_playing(self.playing);
        self.state = next;

        match step {
            Step::Advanced(_) => {
                self.record(TraceEventType::Advanced, at, index);
                self.log(LogLevel::Debug, at, format!("Advanced to event {}", index));
            }
            Step::Looped => {
                self.record(TraceEventType::Looped, at, index);
                self.log(LogLevel::Info, at, "Looped to first event");
            }
            Step::Halted(_) => {
                self.record(TraceEventType::Halted, at, index);
                self.log(LogLevel::Info, at, "Reached last event");
            }
        }
        if self.replayer.persists() {
            self.record(TraceEventType::Persisted, at, index);
        }

        Ok(Some(step))
    }

    /// Bearing from the current position towards the next event
    pub fn heading(&self) -> f64 {
        heading(&self.state, &self.events)
    }

    /// Distance and time covered up to the current cursor
    pub fn summary(&self) -> Result<JourneySummary, FleetError> {
        summarize(&self.events, self.state.current_index())
    }

    fn set_playing(&mut self, playing: bool) {
        if self.playing == playing {
            return;
        }
        self.playing = playing;
        self.state.set_playing(playing);

        let at = self.current_time();
        self.log(LogLevel::Info, at, if playing { "Playback started" } else { "Playback paused" });
    }

    fn current_time(&self) -> DateTime<Utc> {
        event_time(&self.events, self.state.current_index())
    }

    fn record(&mut self, event_type: TraceEventType, at: DateTime<Utc>, index: usize) {
        self.record_with(event_type, at, index, None);
    }

    fn record_with(
        &mut self,
        event_type: TraceEventType,
        at: DateTime<Utc>,
        index: usize,
        data: Option<(&str, String)>,
    ) {
        let mut event = TraceEvent::new(event_type, at, index);
        if let Some(fingerprint) = self.log_fingerprint {
            event = event.with_fingerprint(fingerprint);
        }
        if let Some((key, value)) = data {
            event = event.with_data(key, value);
        }
        self.trace.add_event(event);
    }

    fn log(&mut self, level: LogLevel, at: DateTime<Utc>, message: impl Into<String>) {
        let index = self.state.current_index();
        self.logger
            .log(LogEntry::new(level, at, message).with_trip(self.trip_id.clone(), index));
    }
}

fn event_time(events: &[GpsEvent], index: usize) -> DateTime<Utc> {
    events
        .get(index)
        .or_else(|| events.last())
        .map(|e| e.timestamp)
        .unwrap_or_default()
}

/// Bearing from the state's position to the next event, 0 at the end of the log
pub fn heading<S: ReplayState>(state: &S, events: &[GpsEvent]) -> f64 {
    events
        .get(state.current_index() + 1)
        .and_then(|next| next.location.as_ref())
        .map(|next| geo::bearing(state.current_location(), next))
        .unwrap_or(0.0)
}

/// Result of ticking every session once
#[derive(Debug, Default)]
pub struct FleetTick {
    pub steps: Vec<(String, Step)>,
    pub failures: Vec<(String, FleetError)>,
}

impl FleetTick {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sessions keyed by trip id
pub struct FleetReplay<R: Replayer> {
    sessions: BTreeMap<String, ReplaySession<R>>,
}

impl<R: Replayer> Default for FleetReplay<R> {
    fn default() -> Self {
        Self {
            sessions: BTreeMap::new(),
        }
    }
}

impl<R: Replayer> FleetReplay<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session, returning any session it replaced for the same trip
    pub fn insert(&mut self, session: ReplaySession<R>) -> Option<ReplaySession<R>> {
        self.sessions.insert(session.trip_id().to_string(), session)
    }

    pub fn get(&self, trip_id: &str) -> Option<&ReplaySession<R>> {
        self.sessions.get(trip_id)
    }

    pub fn get_mut(&mut self, trip_id: &str) -> Option<&mut ReplaySession<R>> {
        self.sessions.get_mut(trip_id)
    }

    pub fn remove(&mut self, trip_id: &str) -> Option<ReplaySession<R>> {
        self.sessions.remove(trip_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn trip_ids(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn play_all(&mut self) {
        self.sessions.values_mut().for_each(ReplaySession::play);
    }

    pub fn pause_all(&mut self) {
        self.sessions.values_mut().for_each(ReplaySession::pause);
    }

    /// Tick every playing session once; a failing trip does not stop the others
    pub fn tick_all(&mut self) -> FleetTick {
        let mut outcome = FleetTick::default();
        for (trip_id, session) in self.sessions.iter_mut() {
            match session.tick() {
                Ok(Some(step)) => outcome.steps.push((trip_id.clone(), step)),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("tick failed for trip {}: {}", trip_id, e);
                    outcome.failures.push((trip_id.clone(), e));
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::playback::PlaybackEngine;
    use chrono::TimeZone;

    fn log(n: usize) -> Vec<GpsEvent> {
        (0..n)
            .map(|i| {
                GpsEvent::new(
                    format!("evt_{}", i),
                    EventType::LocationUpdated,
                    Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
                    "VH_1",
                    "trip_1",
                )
                .with_location(10.0 + i as f64 * 0.01, 20.0)
            })
            .collect()
    }

    #[test]
    fn test_paused_session_does_not_advance() {
        let mut session =
            ReplaySession::new(PlaybackEngine::new(), "trip_1", log(3), 5.0, ReplayConfig::default()).unwrap();
        assert_eq!(session.tick().unwrap(), None);
        assert_eq!(session.state().current_event_index, 0);
    }

    #[test]
    fn test_speed_scales_interval() {
        let mut session =
            ReplaySession::new(PlaybackEngine::new(), "trip_1", log(3), 5.0, ReplayConfig::default()).unwrap();
        assert_eq!(session.tick_interval(), Duration::from_millis(1000));
        session.set_speed(PlaybackSpeed::X10);
        assert_eq!(session.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_heading_points_north_then_zero_at_end() {
        let events = log(2);
        let engine = PlaybackEngine::new();
        let s0 = engine.initialize("trip_1", &events, 5.0).unwrap();
        assert!(heading(&s0, &events).abs() < 1e-6);

        let s1 = engine.advance(&s0, &events, 5.0).unwrap();
        assert_eq!(heading(&s1, &events), 0.0);
    }
}
