//! Leg pair type.
//!
//! A `LegPair` is one trip's traversal of a two-stop leg: when the trip is at
//! the origin stop group and when it reaches the destination stop group.

use serde::Serialize;

use super::{DomainError, TransitTime, TripId};

/// One end of a leg pair.
///
/// `time` is what riders are shown: the predicted instant when a prediction
/// exists, otherwise the scheduled one. `scheduled` keeps the timetable value
/// (when there is one) so a consumer can show it alongside a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// The instant to display and compute with.
    pub time: TransitTime,
    /// True if `time` came from a live prediction.
    pub predicted: bool,
    /// The timetabled instant, if the trip appears in the schedule.
    pub scheduled: Option<TransitTime>,
}

impl Endpoint {
    /// An endpoint taken straight from the timetable.
    pub fn scheduled(time: TransitTime) -> Self {
        Self {
            time,
            predicted: false,
            scheduled: Some(time),
        }
    }

    /// An endpoint whose display time is a prediction.
    pub fn predicted(time: TransitTime, scheduled: Option<TransitTime>) -> Self {
        Self {
            time,
            predicted: true,
            scheduled,
        }
    }
}

/// A trip's traversal of a two-stop leg.
///
/// # Invariants
///
/// - `from.time < to.time` (strictly)
/// - If both stop sequences are known, `from_seq < to_seq`
///
/// Both are validated at construction so downstream searches can rely on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegPair {
    trip_id: TripId,
    from: Endpoint,
    to: Endpoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_seq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_seq: Option<u32>,
}

impl LegPair {
    /// Construct a pair, validating endpoint order.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the origin is not strictly before the destination.
    ///
    /// # Examples
    ///
    /// ```
    /// use connection_planner::domain::{Endpoint, LegPair, TransitTime, TripId};
    ///
    /// let dep = TransitTime::parse_iso("2024-03-15T17:00:00-04:00").unwrap();
    /// let arr = TransitTime::parse_iso("2024-03-15T17:12:00-04:00").unwrap();
    ///
    /// let pair = LegPair::new(TripId::from("t1"), Endpoint::scheduled(dep), Endpoint::scheduled(arr)).unwrap();
    /// assert_eq!(pair.duration_minutes(), 12);
    ///
    /// assert!(LegPair::new(TripId::from("t1"), Endpoint::scheduled(arr), Endpoint::scheduled(dep)).is_err());
    /// ```
    pub fn new(trip_id: TripId, from: Endpoint, to: Endpoint) -> Result<Self, DomainError> {
        if from.time >= to.time {
            return Err(DomainError::InvalidPair(
                "origin must be strictly before destination",
            ));
        }
        Ok(Self {
            trip_id,
            from,
            to,
            from_seq: None,
            to_seq: None,
        })
    }

    /// A pair built from timetable values only.
    pub fn scheduled(
        trip_id: TripId,
        from: TransitTime,
        to: TransitTime,
    ) -> Result<Self, DomainError> {
        Self::new(trip_id, Endpoint::scheduled(from), Endpoint::scheduled(to))
    }

    /// Attach stop sequence numbers, rejecting wrong-direction pairs.
    ///
    /// # Errors
    ///
    /// Returns `Err` if both sequences are known and `from_seq >= to_seq`.
    pub fn with_sequences(
        mut self,
        from_seq: Option<u32>,
        to_seq: Option<u32>,
    ) -> Result<Self, DomainError> {
        if let (Some(from), Some(to)) = (from_seq, to_seq) {
            if from >= to {
                return Err(DomainError::WrongDirection { from, to });
            }
        }
        self.from_seq = from_seq;
        self.to_seq = to_seq;
        Ok(self)
    }

    /// Returns the trip identifier.
    pub fn trip_id(&self) -> &TripId {
        &self.trip_id
    }

    /// Returns the origin endpoint.
    pub fn from(&self) -> &Endpoint {
        &self.from
    }

    /// Returns the destination endpoint.
    pub fn to(&self) -> &Endpoint {
        &self.to
    }

    /// Returns the origin display instant.
    pub fn from_time(&self) -> TransitTime {
        self.from.time
    }

    /// Returns the destination display instant.
    pub fn to_time(&self) -> TransitTime {
        self.to.time
    }

    /// Returns the origin stop sequence, if known.
    pub fn from_seq(&self) -> Option<u32> {
        self.from_seq
    }

    /// Returns the destination stop sequence, if known.
    pub fn to_seq(&self) -> Option<u32> {
        self.to_seq
    }

    /// Minutes spent between the two stops.
    pub fn duration_minutes(&self) -> i64 {
        self.from.time.minutes_until(self.to.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hhmm: &str) -> TransitTime {
        TransitTime::parse_iso(&format!("2024-03-15T{hhmm}:00-04:00")).unwrap()
    }

    #[test]
    fn scheduled_endpoints_carry_fallback() {
        let pair = LegPair::scheduled(TripId::from("t1"), at("17:00"), at("17:10")).unwrap();
        assert!(!pair.from().predicted);
        assert_eq!(pair.from().scheduled, Some(at("17:00")));
        assert_eq!(pair.to().scheduled, Some(at("17:10")));
    }

    #[test]
    fn equal_times_rejected() {
        let result = LegPair::scheduled(TripId::from("t1"), at("17:00"), at("17:00"));
        assert!(matches!(result, Err(DomainError::InvalidPair(_))));
    }

    #[test]
    fn wrong_direction_rejected() {
        let pair = LegPair::scheduled(TripId::from("t1"), at("17:00"), at("17:10")).unwrap();
        let result = pair.with_sequences(Some(12), Some(4));
        assert!(matches!(
            result,
            Err(DomainError::WrongDirection { from: 12, to: 4 })
        ));
    }

    #[test]
    fn partial_sequences_accepted() {
        let pair = LegPair::scheduled(TripId::from("t1"), at("17:00"), at("17:10"))
            .unwrap()
            .with_sequences(Some(12), None)
            .unwrap();
        assert_eq!(pair.from_seq(), Some(12));
        assert_eq!(pair.to_seq(), None);
    }

    #[test]
    fn predicted_endpoint_keeps_schedule() {
        let from = Endpoint::scheduled(at("17:00"));
        let to = Endpoint::predicted(at("17:14"), Some(at("17:10")));
        let pair = LegPair::new(TripId::from("t1"), from, to).unwrap();
        assert!(pair.to().predicted);
        assert_eq!(pair.to_time(), at("17:14"));
        assert_eq!(pair.to().scheduled, Some(at("17:10")));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn minute(m: i64) -> TransitTime {
        TransitTime::parse_iso("2024-03-15T00:00:00-04:00").unwrap() + chrono::Duration::minutes(m)
    }

    proptest! {
        /// Property: construction succeeds exactly when origin precedes destination
        /// and the sequences (when both known) increase.
        #[test]
        fn construction_enforces_invariants(
            from in 0i64..2000,
            to in 0i64..2000,
            from_seq in proptest::option::of(0u32..50),
            to_seq in proptest::option::of(0u32..50),
        ) {
            let result = LegPair::scheduled(TripId::from("t"), minute(from), minute(to))
                .and_then(|p| p.with_sequences(from_seq, to_seq));

            let seq_ok = match (from_seq, to_seq) {
                (Some(a), Some(b)) => a < b,
                _ => true,
            };
            prop_assert_eq!(result.is_ok(), from < to && seq_ok);

            if let Ok(pair) = result {
                prop_assert!(pair.from_time() < pair.to_time());
            }
        }
    }
}
