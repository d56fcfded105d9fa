//! Seeded generation of realistic trip event logs
//!
//! The same builder settings and seed always produce the same log, which makes
//! generated trips usable as fixtures and benchmark inputs.

use crate::error::{FleetError, InputError};
use crate::event::{EventType, GpsEvent, SignalQuality};
use crate::geo;
use crate::types::Location;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Well-known city centres for generated routes
pub mod places {
    use crate::types::Location;

    pub const DELHI: Location = Location { lat: 28.7041, lng: 77.1025, accuracy: None };
    pub const BANGALORE: Location = Location { lat: 12.9716, lng: 77.5946, accuracy: None };
    pub const MUMBAI: Location = Location { lat: 19.076, lng: 72.8776, accuracy: None };
    pub const HYDERABAD: Location = Location { lat: 17.385, lng: 78.4867, accuracy: None };
    pub const PUNE: Location = Location { lat: 18.5204, lng: 73.8567, accuracy: None };
    pub const GURGAON: Location = Location { lat: 28.4595, lng: 77.0266, accuracy: None };
}

/// Seeded random number generator for reproducible logs
#[derive(Debug)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
    seed: u64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.rng.gen_range(range)
    }

    /// True with probability `p`, clamped to `[0, 1]`
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }
}

impl Clone for SeededRandom {
    fn clone(&self) -> Self {
        // Restart from the seed so clones replay the same sequence
        Self::new(self.seed)
    }
}

/// Builder for one synthetic trip log between two points
#[derive(Debug, Clone)]
pub struct SyntheticTripBuilder {
    trip_id: String,
    vehicle_id: String,
    start: Location,
    end: Location,
    event_count: usize,
    started_at: DateTime<Utc>,
    interval_secs: i64,
    jitter_degrees: f64,
    speed_limit_kmh: f64,
    overspeed_probability: f64,
    /// Relative weights for excellent, good, fair and poor signal
    signal_weights: [u32; 4],
    terminal: Option<EventType>,
    estimated_duration_hours: Option<f64>,
    seed: u64,
}

impl SyntheticTripBuilder {
    /// Create a new builder for `trip_id` driving from `start` to `end`
    pub fn new(trip_id: impl Into<String>, start: Location, end: Location) -> Self {
        Self {
            trip_id: trip_id.into(),
            vehicle_id: "VH_001".to_string(),
            start,
            end,
            event_count: 100,
            started_at: Utc
                .timestamp_opt(1_700_000_000, 0)
                .single()
                .unwrap_or_default(),
            interval_secs: 60,
            jitter_degrees: 0.002,
            speed_limit_kmh: 80.0,
            overspeed_probability: 0.05,
            signal_weights: [3, 5, 2, 1],
            terminal: Some(EventType::TripCompleted),
            estimated_duration_hours: None,
            seed: 0,
        }
    }

    pub fn with_vehicle(mut self, vehicle_id: impl Into<String>) -> Self {
        self.vehicle_id = vehicle_id.into();
        self
    }

    pub fn with_event_count(mut self, count: usize) -> Self {
        self.event_count = count;
        self
    }

    pub fn with_start_time(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn with_interval_secs(mut self, secs: i64) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn with_jitter_degrees(mut self, degrees: f64) -> Self {
        self.jitter_degrees = degrees;
        self
    }

    pub fn with_overspeed_probability(mut self, probability: f64) -> Self {
        self.overspeed_probability = probability;
        self
    }

    pub fn with_speed_limit_kmh(mut self, kmh: f64) -> Self {
        self.speed_limit_kmh = kmh;
        self
    }

    pub fn with_signal_weights(mut self, excellent: u32, good: u32, fair: u32, poor: u32) -> Self {
        self.signal_weights = [excellent, good, fair, poor];
        self
    }

    /// Event type of the last event; `None` leaves the trip open
    pub fn with_terminal(mut self, terminal: Option<EventType>) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn with_estimated_duration_hours(mut self, hours: f64) -> Self {
        self.estimated_duration_hours = Some(hours);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Straight-line distance between the endpoints, used as the planned distance
    pub fn planned_distance_km(&self) -> f64 {
        geo::distance(&self.start, &self.end)
    }

    /// Generate the log
    pub fn build(&self) -> Result<Vec<GpsEvent>, FleetError> {
        if self.event_count < 2 {
            return Err(InputError::invalid(format!(
                "A synthetic trip needs at least 2 events, got {}",
                self.event_count
            ))
            .into());
        }
        if !(self.speed_limit_kmh.is_finite() && self.speed_limit_kmh > 0.0)
            || !(self.jitter_degrees.is_finite() && self.jitter_degrees >= 0.0)
        {
            return Err(InputError::InvalidConfig {
                reason: "speed limit must be positive and jitter non-negative".to_string(),
            }
            .into());
        }
        if !self.overspeed_probability.is_finite() {
            return Err(InputError::InvalidConfig {
                reason: format!("overspeed probability must be finite, got {}", self.overspeed_probability),
            }
            .into());
        }

        let mut random = SeededRandom::new(self.seed);
        let last = self.event_count - 1;
        let planned = self.planned_distance_km();
        let estimated = self.estimated_duration_hours.unwrap_or_else(|| {
            (last as i64 * self.interval_secs) as f64 / 3600.0
        });

        let mut events = Vec::with_capacity(self.event_count);
        let mut previous: Option<Location> = None;
        let mut cumulative = 0.0;
        let mut battery = 100.0;

        for i in 0..self.event_count {
            let t = i as f64 / last as f64;
            let location = if i == 0 {
                self.start
            } else if i == last {
                self.end
            } else {
                Location::new(
                    self.start.lat + (self.end.lat - self.start.lat) * t
                        + random.gen_range(-self.jitter_degrees..=self.jitter_degrees),
                    self.start.lng + (self.end.lng - self.start.lng) * t
                        + random.gen_range(-self.jitter_degrees..=self.jitter_degrees),
                )
            };
            if let Some(prev) = previous {
                cumulative += geo::distance(&prev, &location);
            }
            previous = Some(location);

            let overspeed = i > 0 && i < last && random.gen_bool(self.overspeed_probability);
            let speed = if i == 0 || i == last {
                0.0
            } else if overspeed {
                self.speed_limit_kmh + random.gen_range(5.0..30.0)
            } else {
                random.gen_range(self.speed_limit_kmh * 0.5..self.speed_limit_kmh)
            };
            battery = (battery - random.gen_range(0.0..0.2_f64)).max(5.0);

            let event_type = if i == 0 {
                EventType::TripStarted
            } else if i == last {
                self.terminal.clone().unwrap_or(EventType::LocationUpdated)
            } else if overspeed {
                EventType::SpeedingDetected
            } else {
                EventType::LocationUpdated
            };

            let mut event = GpsEvent::new(
                format!("{}_evt_{:05}", self.trip_id, i),
                event_type,
                self.started_at + Duration::seconds(i as i64 * self.interval_secs),
                self.vehicle_id.clone(),
                self.trip_id.clone(),
            )
            .with_location(location.lat, location.lng)
            .with_speed(speed)
            .with_battery(battery)
            .with_distance(cumulative)
            .with_signal(self.pick_signal(&mut random))
            .with_overspeed(overspeed);

            if i == 0 {
                event.planned_distance_km = Some(planned);
                event.estimated_duration_hours = Some(estimated);
            }
            events.push(event);
        }

        Ok(events)
    }

    fn pick_signal(&self, random: &mut SeededRandom) -> SignalQuality {
        let total: u32 = self.signal_weights.iter().sum();
        if total == 0 {
            return SignalQuality::Good;
        }
        let mut roll = random.gen_range(0..total);
        let qualities = [
            SignalQuality::Excellent,
            SignalQuality::Good,
            SignalQuality::Fair,
            SignalQuality::Poor,
        ];
        for (quality, weight) in qualities.into_iter().zip(self.signal_weights) {
            if roll < weight {
                return quality;
            }
            roll -= weight;
        }
        SignalQuality::Good
    }
}
