//! Connection assignment.
//!
//! Each in-window upstream trip is paired with the latest feeder arrival that
//! still makes it and the earliest bus departure reachable after the layover
//! buffer. Both lookups are binary searches over the merged legs.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::Serialize;

use super::merge::{BusTrip, MergedLeg};
use super::search::{first_at_or_after, last_at_or_before};
use super::window::TimeWindow;
use crate::domain::{LegPair, TimeError, TransitTime, TripId};

/// Minimum gap between a feeder arrival and the upstream departure.
const TRANSFER_MARGIN_MINS: i64 = 1;

/// Identity of a group: the bus trip an upstream arrival connects to.
///
/// Ordering sorts real trips by departure (ties on trip id) and places
/// `NoConnection` after every trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    /// A real bus trip.
    Trip {
        departure: TransitTime,
        trip_id: TripId,
    },
    /// Upstream arrivals with no reachable bus.
    NoConnection,
}

impl GroupKey {
    /// Key for a bus trip.
    pub fn for_bus(bus: &BusTrip) -> Self {
        Self::Trip {
            departure: bus.departure.time,
            trip_id: bus.trip_id.clone(),
        }
    }

    /// Returns true if this key names a real trip.
    pub fn is_trip(&self) -> bool {
        matches!(self, Self::Trip { .. })
    }
}

/// Wire sentinel for [`GroupKey::NoConnection`].
const NO_CONNECTION: &str = "none";

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trip { departure, trip_id } => {
                write!(f, "{}|{}", departure.to_rfc3339(), trip_id)
            }
            Self::NoConnection => f.write_str(NO_CONNECTION),
        }
    }
}

/// Error returned when parsing a group key from the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupKeyError {
    #[error("group key must be \"none\" or \"<departure>|<trip>\"")]
    Shape,

    #[error("group key departure: {0}")]
    Departure(#[from] TimeError),
}

impl FromStr for GroupKey {
    type Err = GroupKeyError;

    /// Parse `"<RFC 3339 departure>|<trip id>"` or `"none"`.
    ///
    /// ```
    /// use connection_planner::planner::GroupKey;
    ///
    /// let key: GroupKey = "2024-03-15T17:05:00-04:00|60392455".parse().unwrap();
    /// assert_eq!(key.to_string(), "2024-03-15T17:05:00-04:00|60392455");
    /// assert_eq!("none".parse::<GroupKey>().unwrap(), GroupKey::NoConnection);
    /// assert!("17:05|t".parse::<GroupKey>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == NO_CONNECTION {
            return Ok(Self::NoConnection);
        }
        let (departure, trip) = s.split_once('|').ok_or(GroupKeyError::Shape)?;
        if trip.is_empty() {
            return Err(GroupKeyError::Shape);
        }
        Ok(Self::Trip {
            departure: TransitTime::parse_iso(departure)?,
            trip_id: TripId::from(trip),
        })
    }
}

impl Serialize for GroupKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One upstream trip with its feeder and connecting bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    /// The upstream leg pair.
    pub upstream: LegPair,
    /// The latest feeder that makes the upstream departure, if shown.
    pub feeder: Option<LegPair>,
    /// The bus this arrival connects to.
    pub bus: GroupKey,
    /// Whole minutes between upstream arrival and bus departure.
    pub wait_mins: Option<i64>,
}

/// The feeder for an upstream departure at `upstream_from`.
///
/// Picks the rightmost feeder arriving at least one minute before departure,
/// and hides it if it started before the window (already in the past).
pub fn find_feeder<'a>(
    middle: &'a MergedLeg,
    upstream_from: TransitTime,
    window: &TimeWindow,
) -> Option<&'a LegPair> {
    let latest = upstream_from.checked_sub(Duration::minutes(TRANSFER_MARGIN_MINS))?;
    last_at_or_before(middle.by_destination(), &latest, LegPair::to_time)
        .filter(|feeder| feeder.from_time() >= window.start)
}

/// The first bus departing at or after `upstream_to + buffer`.
///
/// `buses` must be sorted by departure.
pub fn find_bus(buses: &[BusTrip], upstream_to: TransitTime, buffer: Duration) -> Option<&BusTrip> {
    let earliest = upstream_to.checked_add(buffer.max(Duration::zero()))?;
    first_at_or_after(buses, &earliest, |bus| bus.departure.time)
}

/// Assign every upstream trip departing inside the window.
///
/// Output follows upstream origin order.
pub fn assign(
    upstream: &MergedLeg,
    middle: &MergedLeg,
    buses: &[BusTrip],
    window: &TimeWindow,
    buffer: Duration,
) -> Vec<Assignment> {
    upstream
        .by_origin()
        .iter()
        .filter(|pair| window.contains(pair.from_time()))
        .map(|pair| {
            let feeder = find_feeder(middle, pair.from_time(), window).cloned();
            let (bus, wait_mins) = match find_bus(buses, pair.to_time(), buffer) {
                Some(bus) => (
                    GroupKey::for_bus(bus),
                    Some(pair.to_time().minutes_until(bus.departure.time)),
                ),
                None => (GroupKey::NoConnection, None),
            };
            Assignment {
                upstream: pair.clone(),
                feeder,
                bus,
                wait_mins,
            }
        })
        .collect()
}
