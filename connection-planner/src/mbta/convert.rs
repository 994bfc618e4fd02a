//! Conversion from MBTA DTOs to domain types.
//!
//! Schedules and predictions both arrive as one record per trip per stop. The
//! functions here turn those records into stop events, then pair up each
//! trip's events at a leg's origin and destination stop groups.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::domain::{LegPair, RouteId, StopGroup, StopId, TransitTime, TripId};
use crate::planner::{AlertScope, AlertSummary, LegRole, PredictedEndpoints, Predictions};

use super::types::{AlertAttributes, Resource, StopTimeAttributes};

/// Error during DTO to domain conversion.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    /// Missing required relationship
    #[error("missing relationship: {0}")]
    MissingRelationship(&'static str),

    /// Neither arrival nor departure could be parsed
    #[error("no usable time")]
    NoTime,

    /// The stop is skipped or the trip cancelled
    #[error("not serving stop ({0})")]
    NotServing(String),
}

/// One trip's call at one stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopEvent {
    pub trip_id: TripId,
    pub stop_id: StopId,
    pub arrival: Option<TransitTime>,
    pub departure: Option<TransitTime>,
    pub stop_sequence: Option<u32>,
}

impl StopEvent {
    /// Time to use when the trip is boarded here.
    pub fn origin_time(&self) -> Option<TransitTime> {
        self.departure.or(self.arrival)
    }

    /// Time to use when the trip is left here.
    pub fn destination_time(&self) -> Option<TransitTime> {
        self.arrival.or(self.departure)
    }
}

fn parse_time(value: Option<&str>) -> Option<TransitTime> {
    value.and_then(|s| TransitTime::parse_iso(s).ok())
}

/// Convert one schedule or prediction record.
pub fn convert_record(record: &Resource<StopTimeAttributes>) -> Result<StopEvent, ConversionError> {
    let attrs = &record.attributes;
    if let Some(rel @ ("CANCELLED" | "SKIPPED" | "NO_DATA")) = attrs.schedule_relationship.as_deref() {
        return Err(ConversionError::NotServing(rel.to_string()));
    }

    let trip_id = record
        .related_id("trip")
        .ok_or(ConversionError::MissingRelationship("trip"))?;
    let stop_id = record
        .related_id("stop")
        .ok_or(ConversionError::MissingRelationship("stop"))?;

    let arrival = parse_time(attrs.arrival_time.as_deref());
    let departure = parse_time(attrs.departure_time.as_deref());
    if arrival.is_none() && departure.is_none() {
        return Err(ConversionError::NoTime);
    }

    Ok(StopEvent {
        trip_id: TripId::from(trip_id),
        stop_id: StopId::from(stop_id),
        arrival,
        departure,
        stop_sequence: attrs.stop_sequence,
    })
}

/// Convert records, dropping malformed ones.
pub fn stop_events(records: &[Resource<StopTimeAttributes>]) -> Vec<StopEvent> {
    records
        .iter()
        .filter_map(|record| match convert_record(record) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!(record = %record.id, error = %e, "dropping record");
                None
            }
        })
        .collect()
}

/// Events grouped by trip, each trip's events in sequence order.
fn by_trip(events: &[StopEvent]) -> BTreeMap<&TripId, Vec<&StopEvent>> {
    let mut trips: BTreeMap<&TripId, Vec<&StopEvent>> = BTreeMap::new();
    for event in events {
        trips.entry(&event.trip_id).or_default().push(event);
    }
    for calls in trips.values_mut() {
        calls.sort_by_key(|e| (e.stop_sequence, e.origin_time()));
    }
    trips
}

/// Returns true if `later` comes after `earlier` on the same trip.
fn follows(earlier: &StopEvent, later: &StopEvent) -> bool {
    match (earlier.stop_sequence, later.stop_sequence) {
        (Some(a), Some(b)) => a < b,
        _ => match (earlier.origin_time(), later.destination_time()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        },
    }
}

/// Pair each trip's call at `origin` with its next call at `destination`.
///
/// Trips that only serve one of the groups, or serve them in the wrong order,
/// produce nothing.
pub fn pairs_from_events(events: &[StopEvent], origin: &StopGroup, destination: &StopGroup) -> Vec<LegPair> {
    let mut pairs = Vec::new();

    for (trip_id, calls) in by_trip(events) {
        let found = calls
            .iter()
            .filter(|e| origin.contains(&e.stop_id))
            .find_map(|from| {
                calls
                    .iter()
                    .find(|to| destination.contains(&to.stop_id) && follows(from, to))
                    .map(|to| (*from, *to))
            });
        let Some((from, to)) = found else {
            continue;
        };
        let (Some(from_time), Some(to_time)) = (from.origin_time(), to.destination_time()) else {
            continue;
        };

        match LegPair::scheduled(trip_id.clone(), from_time, to_time)
            .and_then(|p| p.with_sequences(from.stop_sequence, to.stop_sequence))
        {
            Ok(pair) => pairs.push(pair),
            Err(e) => debug!(trip = %trip_id, error = %e, "dropping pair"),
        }
    }

    pairs
}

/// Per-trip predicted instants at a leg's two stop groups.
///
/// Instants after `cutoff` are discarded. A trip keeps whichever endpoint is
/// still predicted; the merge overlays the rest from the timetable.
pub fn endpoints_from_events(
    events: &[StopEvent],
    origin: &StopGroup,
    destination: &StopGroup,
    cutoff: TransitTime,
) -> Predictions {
    let mut predictions = Predictions::new();

    for (trip_id, calls) in by_trip(events) {
        let from = calls.iter().find(|e| origin.contains(&e.stop_id));
        let to = calls.iter().find(|e| {
            destination.contains(&e.stop_id) && from.is_none_or(|from| follows(from, e))
        });

        let endpoints = PredictedEndpoints {
            origin: from.and_then(|e| e.origin_time()).filter(|t| *t <= cutoff),
            destination: to.and_then(|e| e.destination_time()).filter(|t| *t <= cutoff),
            origin_seq: from.and_then(|e| e.stop_sequence),
            destination_seq: to.and_then(|e| e.stop_sequence),
        };
        if endpoints.origin.is_some() || endpoints.destination.is_some() {
            predictions.insert(trip_id.clone(), endpoints);
        }
    }

    predictions
}

/// Collect alert headers and count alerts per leg.
///
/// An alert counts once against every leg one of its informed routes belongs
/// to. Alerts naming only a stop in scope contribute their header but no count.
pub fn summarize_alerts(records: &[Resource<AlertAttributes>], scope: &AlertScope) -> AlertSummary {
    let stops: BTreeSet<&str> = scope.stops.iter().map(StopId::as_str).collect();
    let mut headers = BTreeSet::new();
    let mut summary = AlertSummary::default();

    for record in records {
        let attrs = &record.attributes;
        let roles: BTreeSet<LegRole> = attrs
            .informed_entity
            .iter()
            .filter_map(|e| e.route.as_deref())
            .flat_map(|route| scope.roles_of(&RouteId::from(route)).collect::<Vec<_>>())
            .collect();
        let touches_stop = attrs
            .informed_entity
            .iter()
            .filter_map(|e| e.stop.as_deref())
            .any(|stop| stops.contains(stop));

        if roles.is_empty() && !touches_stop {
            continue;
        }
        for role in roles {
            summary.counts.bump(role);
        }
        if let Some(header) = attrs.header.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
            headers.insert(header.to_string());
        }
    }

    summary.headers = headers.into_iter().collect();
    summary
}
