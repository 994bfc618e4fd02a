//! Schedule/prediction merging.
//!
//! Every leg (upstream, middle, bus, bus-to-home) goes through the same
//! two-endpoint merge: pick one timetable entry per trip for the active window,
//! then overlay whichever predicted endpoints exist on top of it. The origin
//! and destination are overlaid independently, so a trip with only a predicted
//! arrival still shows its scheduled departure.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Duration;
use serde::Serialize;
use tracing::debug;

use super::window::TimeWindow;
use crate::domain::{Endpoint, LegPair, TransitTime, TripId};

/// Live predictions for one trip at a leg's two stop groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredictedEndpoints {
    /// Predicted time at the origin stop group.
    pub origin: Option<TransitTime>,
    /// Predicted time at the destination stop group.
    pub destination: Option<TransitTime>,
    /// Stop sequence at the origin, if reported.
    pub origin_seq: Option<u32>,
    /// Stop sequence at the destination, if reported.
    pub destination_seq: Option<u32>,
}

/// Predictions for one leg, keyed by trip.
pub type Predictions = BTreeMap<TripId, PredictedEndpoints>;

/// Discard predicted instants later than `cutoff`.
///
/// Stop sequences are kept: they describe the trip, not the estimate. A trip
/// left with no predicted instant at all is removed.
pub fn within_horizon(predictions: Predictions, cutoff: TransitTime) -> Predictions {
    predictions
        .into_iter()
        .filter_map(|(trip, mut pred)| {
            pred.origin = pred.origin.filter(|t| *t <= cutoff);
            pred.destination = pred.destination.filter(|t| *t <= cutoff);
            (pred.origin.is_some() || pred.destination.is_some()).then_some((trip, pred))
        })
        .collect()
}

/// A leg after merging, in the two orders the connection searches need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedLeg {
    by_origin: Vec<LegPair>,
    by_destination: Vec<LegPair>,
}

impl MergedLeg {
    /// Build from pairs in any order.
    pub fn from_pairs(mut pairs: Vec<LegPair>) -> Self {
        pairs.sort_by(|a, b| {
            a.from_time()
                .cmp(&b.from_time())
                .then_with(|| a.trip_id().cmp(b.trip_id()))
        });
        let mut by_destination = pairs.clone();
        by_destination.sort_by(|a, b| {
            a.to_time()
                .cmp(&b.to_time())
                .then_with(|| a.trip_id().cmp(b.trip_id()))
        });
        Self {
            by_origin: pairs,
            by_destination,
        }
    }

    /// Pairs sorted by origin instant, ties broken on trip id.
    pub fn by_origin(&self) -> &[LegPair] {
        &self.by_origin
    }

    /// Pairs sorted by destination instant, ties broken on trip id.
    pub fn by_destination(&self) -> &[LegPair] {
        &self.by_destination
    }

    pub fn len(&self) -> usize {
        self.by_origin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_origin.is_empty()
    }
}

/// Distance of `time` from the window start, for ranking out-of-window entries.
fn distance_from_start(time: TransitTime, window: &TimeWindow) -> Duration {
    time.signed_duration_since(window.start).abs()
}

/// Returns true if `candidate` should replace `current` as a trip's timetable entry.
///
/// An entry whose origin lies inside the window beats one outside it. Between
/// two inside entries the earlier origin wins; between two outside entries the
/// one closer to the window start wins.
fn prefer(candidate: &LegPair, current: &LegPair, window: &TimeWindow) -> bool {
    let cand_in = window.contains(candidate.from_time());
    let curr_in = window.contains(current.from_time());

    match (cand_in, curr_in) {
        (true, false) => true,
        (false, true) => false,
        (true, true) => candidate.from_time() < current.from_time(),
        (false, false) => {
            let cand = distance_from_start(candidate.from_time(), window);
            let curr = distance_from_start(current.from_time(), window);
            cand < curr || (cand == curr && candidate.from_time() < current.from_time())
        }
    }
}

/// Reduce timetable pairs to one per trip using the window-aware preference.
///
/// A trip can appear several times when the same service runs on more than one
/// of the fetched service dates.
pub fn select_scheduled(
    pairs: impl IntoIterator<Item = LegPair>,
    window: &TimeWindow,
) -> BTreeMap<TripId, LegPair> {
    let mut selected: BTreeMap<TripId, LegPair> = BTreeMap::new();
    for pair in pairs {
        match selected.get(pair.trip_id()) {
            Some(current) if !prefer(&pair, current, window) => {}
            _ => {
                selected.insert(pair.trip_id().clone(), pair);
            }
        }
    }
    selected
}

/// Overlay a predicted instant onto a timetable endpoint.
fn overlay(predicted: Option<TransitTime>, scheduled: Option<&Endpoint>) -> Option<Endpoint> {
    let fallback = scheduled.and_then(|e| e.scheduled);
    match predicted {
        Some(time) => Some(Endpoint::predicted(time, fallback)),
        None => scheduled.copied(),
    }
}

/// Merge one leg's timetable and predictions.
///
/// `predicted` is `None` when predictions were not requested (for instance when
/// planning against a simulated start time). Trips are dropped, never reported
/// as errors, when an endpoint is missing, the endpoints are out of order, or
/// the stop sequences show the trip running the wrong way.
pub fn merge_leg(
    scheduled: impl IntoIterator<Item = LegPair>,
    predicted: Option<&Predictions>,
    window: &TimeWindow,
) -> MergedLeg {
    let selected = select_scheduled(scheduled, window);
    let empty = Predictions::new();
    let predicted = predicted.unwrap_or(&empty);

    let trips: BTreeSet<&TripId> = selected.keys().chain(predicted.keys()).collect();

    let mut merged = Vec::with_capacity(trips.len());
    for trip_id in trips {
        let sched = selected.get(trip_id);
        let pred = predicted.get(trip_id).copied().unwrap_or_default();

        let from = overlay(pred.origin, sched.map(|s| s.from()));
        let to = overlay(pred.destination, sched.map(|s| s.to()));
        let (Some(from), Some(to)) = (from, to) else {
            debug!(trip = %trip_id, "dropping trip with a missing endpoint");
            continue;
        };

        let from_seq = pred.origin_seq.or_else(|| sched.and_then(LegPair::from_seq));
        let to_seq = pred.destination_seq.or_else(|| sched.and_then(LegPair::to_seq));

        match LegPair::new(trip_id.clone(), from, to).and_then(|p| p.with_sequences(from_seq, to_seq)) {
            Ok(pair) => merged.push(pair),
            Err(e) => debug!(trip = %trip_id, error = %e, "dropping trip"),
        }
    }

    MergedLeg::from_pairs(merged)
}

/// A bus trip from the boarding stop, with its optional run on to the home stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusTrip {
    pub trip_id: TripId,
    /// Departure from the boarding stop group.
    pub departure: Endpoint,
    /// Arrival at the alighting stop group.
    pub arrival: Endpoint,
    /// Arrival at the home stop group, when the extension leg is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<Endpoint>,
}

impl BusTrip {
    /// The arrival riders care about last: home if known, else the alighting stop.
    pub fn terminal_arrival(&self) -> &Endpoint {
        self.home.as_ref().unwrap_or(&self.arrival)
    }
}

/// Join the bus leg with its home extension by trip id.
///
/// With `home` present, only homeward-bound trips survive: those whose home
/// arrival is strictly after their boarding-stop departure. Output is sorted by
/// departure, ties broken on trip id.
pub fn assemble_bus_trips(bus: &MergedLeg, home: Option<&MergedLeg>) -> Vec<BusTrip> {
    let home_by_trip: Option<HashMap<&TripId, &LegPair>> = home.map(|leg| {
        leg.by_origin()
            .iter()
            .map(|pair| (pair.trip_id(), pair))
            .collect()
    });

    let mut trips: Vec<BusTrip> = bus
        .by_origin()
        .iter()
        .filter_map(|pair| {
            let home = match &home_by_trip {
                None => None,
                Some(index) => {
                    let home_pair = index.get(pair.trip_id())?;
                    if home_pair.to_time() <= pair.from_time() {
                        debug!(trip = %pair.trip_id(), "dropping bus trip not bound for home");
                        return None;
                    }
                    Some(*home_pair.to())
                }
            };
            Some(BusTrip {
                trip_id: pair.trip_id().clone(),
                departure: *pair.from(),
                arrival: *pair.to(),
                home,
            })
        })
        .collect();

    trips.sort_by(|a, b| {
        a.departure
            .time
            .cmp(&b.departure.time)
            .then_with(|| a.trip_id.cmp(&b.trip_id))
    });
    trips
}
