//! Plan configuration.

use chrono::Duration;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;

use crate::domain::{RouteId, StopId};

/// Error returned when a configuration cannot produce a meaningful plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A numeric option is out of range
    #[error("invalid {field}: {reason}")]
    OutOfRange {
        field: &'static str,
        reason: &'static str,
    },

    /// A leg names no routes
    #[error("leg {0} has no routes configured")]
    NoRoutes(&'static str),

    /// The extension leg is enabled without a stop to extend to
    #[error("home leg enabled but no home stop configured")]
    MissingHomeStop,
}

/// Longest plan window accepted, in hours.
pub const MAX_HORIZON_HOURS: i64 = 48;

/// Largest buffer, prediction horizon or padding accepted, in minutes.
pub const MAX_OFFSET_MINS: i64 = 24 * 60;

/// Routes and stops for one rail leg.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegStops {
    /// Routes that serve the leg (e.g. every Green Line branch).
    pub routes: Vec<RouteId>,
    /// Parent stop where the leg starts.
    pub origin: StopId,
    /// Parent stop where the leg ends.
    pub destination: StopId,
}

/// Routes and stops for the connecting bus.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BusStops {
    /// Bus routes to consider.
    pub routes: Vec<RouteId>,
    /// Stop where the bus is boarded (the upstream leg's destination area).
    pub board: StopId,
    /// Stop where the bus leg ends.
    pub alight: StopId,
    /// Optional further stop on the same bus trip.
    #[serde(default)]
    pub home: Option<StopId>,
}

/// Configuration parameters for plan computation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Plan window length (hours).
    pub horizon_hours: i64,

    /// Minimum layover between the upstream arrival and the bus (minutes).
    /// Negative values are treated as zero.
    pub buffer_mins: i64,

    /// How far past "now" live predictions are trusted (minutes).
    pub prediction_horizon_mins: i64,

    /// Padding added to both ends of the window when fetching schedules (minutes).
    pub pad_mins: i64,

    /// Whether bus trips are extended to the home stop.
    pub include_home_leg: bool,

    /// Zone whose calendar partitions service dates.
    pub time_zone: Tz,

    /// The leg every plan row is built around.
    pub upstream: LegStops,

    /// The feeder leg arriving where the upstream leg starts.
    pub middle: LegStops,

    /// The connecting bus.
    pub bus: BusStops,
}

impl PlanConfig {
    /// Returns the plan window length as a Duration.
    pub fn horizon(&self) -> Duration {
        Duration::hours(self.horizon_hours)
    }

    /// Returns the enforced minimum layover in whole minutes (never negative).
    pub fn buffer_minutes(&self) -> i64 {
        self.buffer_mins.max(0)
    }

    /// Returns the enforced minimum layover as a Duration.
    pub fn buffer(&self) -> Duration {
        Duration::minutes(self.buffer_minutes())
    }

    /// Returns the prediction trust horizon as a Duration.
    pub fn prediction_horizon(&self) -> Duration {
        Duration::minutes(self.prediction_horizon_mins)
    }

    /// Returns the schedule padding as a Duration.
    pub fn pad(&self) -> Duration {
        Duration::minutes(self.pad_mins)
    }

    /// Returns the home stop when the extension leg is enabled.
    pub fn home_stop(&self) -> Option<&StopId> {
        if self.include_home_leg {
            self.bus.home.as_ref()
        } else {
            None
        }
    }

    /// Check that the configuration can produce a plan.
    ///
    /// A negative buffer is not an error: it is clamped to zero and logged.
    /// Every duration is bounded, so the accessors above never overflow once
    /// this has passed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon_hours <= 0 {
            return Err(ConfigError::OutOfRange {
                field: "horizon_hours",
                reason: "must be positive",
            });
        }
        if self.horizon_hours > MAX_HORIZON_HOURS {
            return Err(ConfigError::OutOfRange {
                field: "horizon_hours",
                reason: "must be at most 48",
            });
        }
        if self.prediction_horizon_mins < 0 {
            return Err(ConfigError::OutOfRange {
                field: "prediction_horizon_mins",
                reason: "must not be negative",
            });
        }
        if self.pad_mins < 0 {
            return Err(ConfigError::OutOfRange {
                field: "pad_mins",
                reason: "must not be negative",
            });
        }
        let offsets = [
            ("buffer_mins", self.buffer_mins),
            ("prediction_horizon_mins", self.prediction_horizon_mins),
            ("pad_mins", self.pad_mins),
        ];
        if let Some((field, _)) = offsets.into_iter().find(|(_, mins)| *mins > MAX_OFFSET_MINS) {
            return Err(ConfigError::OutOfRange {
                field,
                reason: "must be at most 1440",
            });
        }
        if self.upstream.routes.is_empty() {
            return Err(ConfigError::NoRoutes("upstream"));
        }
        if self.middle.routes.is_empty() {
            return Err(ConfigError::NoRoutes("middle"));
        }
        if self.bus.routes.is_empty() {
            return Err(ConfigError::NoRoutes("bus"));
        }
        if self.include_home_leg && self.bus.home.is_none() {
            return Err(ConfigError::MissingHomeStop);
        }
        if self.buffer_mins < 0 {
            warn!(
                buffer_mins = self.buffer_mins,
                "negative buffer configured, using 0"
            );
        }
        Ok(())
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            horizon_hours: 3,
            buffer_mins: 3,
            prediction_horizon_mins: 60,
            pad_mins: 30,
            include_home_leg: false,
            time_zone: chrono_tz::America::New_York,
            upstream: LegStops {
                routes: vec![RouteId::from("Red")],
                origin: StopId::from("place-pktrm"),
                destination: StopId::from("place-harsq"),
            },
            middle: LegStops {
                routes: vec![
                    RouteId::from("Green-B"),
                    RouteId::from("Green-C"),
                    RouteId::from("Green-D"),
                    RouteId::from("Green-E"),
                ],
                origin: StopId::from("place-kencl"),
                destination: StopId::from("place-pktrm"),
            },
            bus: BusStops {
                routes: vec![RouteId::from("1")],
                board: StopId::from("place-harsq"),
                alight: StopId::from("place-masta"),
                home: None,
            },
        }
    }
}
