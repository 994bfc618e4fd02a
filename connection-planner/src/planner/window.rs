//! Time-window slicing.
//!
//! The schedule endpoint is partitioned by service date and only accepts a
//! bounded time-of-day range per request. A plan window that crosses midnight
//! therefore has to be cut into per-date slices before it can be fetched.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::domain::{DomainError, TimeOfDay, TransitTime};

/// Default padding applied to both ends of a window when slicing.
pub const DEFAULT_PAD_MINS: i64 = 30;

/// Minutes after midnight at which a new service date takes over.
///
/// Trips running between midnight and this point normally belong to the
/// previous service date and are listed with hours of 24 or more.
const SERVICE_DAY_ROLLOVER_MINS: u16 = 3 * 60;

/// The plan's rolling time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    /// Start of the window ("now", or the simulated start).
    pub start: TransitTime,
    /// End of the window: `start + horizon`.
    pub end: TransitTime,
}

impl TimeWindow {
    /// Create a window of `horizon` starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the horizon is not positive or overflows.
    pub fn new(start: TransitTime, horizon: Duration) -> Result<Self, DomainError> {
        if horizon <= Duration::zero() {
            return Err(DomainError::InvalidWindow("horizon must be positive"));
        }
        let end = start
            .checked_add(horizon)
            .ok_or(DomainError::InvalidWindow("horizon overflows"))?;
        Ok(Self { start, end })
    }

    /// Returns true if `time` lies in `[start, end]`.
    pub fn contains(&self, time: TransitTime) -> bool {
        self.start <= time && time <= self.end
    }
}

/// One bounded same-date schedule query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScheduleSlice {
    /// Service date the times are relative to.
    pub service_date: NaiveDate,
    /// Inclusive lower bound.
    pub min_time: TimeOfDay,
    /// Inclusive upper bound (the whole minute is covered).
    pub max_time: TimeOfDay,
}

impl ScheduleSlice {
    /// Local wall-clock reading at which this slice starts.
    pub fn start(&self) -> NaiveDateTime {
        self.service_date.and_time(chrono::NaiveTime::MIN)
            + Duration::minutes(i64::from(self.min_time.minutes()))
    }

    /// Local wall-clock reading at which this slice stops covering.
    pub fn end(&self) -> NaiveDateTime {
        self.service_date.and_time(chrono::NaiveTime::MIN)
            + Duration::minutes(i64::from(self.max_time.minutes()))
            + Duration::seconds(59)
    }

    /// The same early-morning range expressed on the previous service date.
    ///
    /// A slice starting before the service-day rollover also overlaps trips
    /// that the agency files under the previous date with hours >= 24. Returns
    /// `None` when the slice lies entirely after the rollover.
    ///
    /// ```
    /// use connection_planner::domain::TimeOfDay;
    /// use connection_planner::planner::ScheduleSlice;
    /// use chrono::NaiveDate;
    ///
    /// let slice = ScheduleSlice {
    ///     service_date: NaiveDate::from_ymd_opt(2024, 3, 16).unwrap(),
    ///     min_time: TimeOfDay::parse_hhmm("00:00").unwrap(),
    ///     max_time: TimeOfDay::parse_hhmm("01:30").unwrap(),
    /// };
    /// let carry = slice.overnight_carry().unwrap();
    /// assert_eq!(carry.service_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    /// assert_eq!(carry.min_time.to_string(), "24:00");
    /// assert_eq!(carry.max_time.to_string(), "25:30");
    /// ```
    pub fn overnight_carry(&self) -> Option<ScheduleSlice> {
        if self.min_time.minutes() >= SERVICE_DAY_ROLLOVER_MINS {
            return None;
        }
        let last_carried = TimeOfDay::from_minutes(SERVICE_DAY_ROLLOVER_MINS - 1).ok()?;
        let day = 24 * 60;
        Some(ScheduleSlice {
            service_date: self.service_date.pred_opt()?,
            min_time: self.min_time.shifted(day).ok()?,
            max_time: self.max_time.min(last_carried).shifted(day).ok()?,
        })
    }
}

/// Split the padded window `[start - pad, end + pad]` into same-date slices.
///
/// Inputs are local wall-clock readings. If the padded range stays on one
/// calendar date the result is a single slice; otherwise it is a first slice
/// running to 23:59, any full middle days, and a last slice from 00:00.
/// Padding past the end of the calendar yields no slices.
///
/// # Examples
///
/// ```
/// use connection_planner::planner::slice_window;
/// use chrono::{Duration, NaiveDate};
///
/// let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
/// let start = d.and_hms_opt(22, 0, 0).unwrap();
/// let end = d.and_hms_opt(23, 59, 0).unwrap() + Duration::hours(1);
///
/// let slices = slice_window(start, end, Duration::minutes(30));
/// assert_eq!(slices.len(), 2);
/// assert_eq!(slices[0].min_time.to_string(), "21:30");
/// assert_eq!(slices[0].max_time.to_string(), "23:59");
/// assert_eq!(slices[1].min_time.to_string(), "00:00");
/// assert_eq!(slices[1].max_time.to_string(), "01:29");
/// ```
pub fn slice_window(start: NaiveDateTime, end: NaiveDateTime, pad: Duration) -> Vec<ScheduleSlice> {
    let pad = pad.max(Duration::zero());
    let (Some(lo), Some(hi)) = (start.checked_sub_signed(pad), end.checked_add_signed(pad)) else {
        return Vec::new();
    };
    if hi < lo {
        return Vec::new();
    }

    let lo_date = lo.date();
    let hi_date = hi.date();
    let lo_time = TimeOfDay::floor(lo.time());
    let hi_time = TimeOfDay::ceil_within_day(hi.time());

    if lo_date == hi_date {
        return vec![ScheduleSlice {
            service_date: lo_date,
            min_time: lo_time,
            max_time: hi_time,
        }];
    }

    let mut slices = vec![ScheduleSlice {
        service_date: lo_date,
        min_time: lo_time,
        max_time: TimeOfDay::END_OF_DAY,
    }];

    let mut day = lo_date.succ_opt();
    while let Some(date) = day.filter(|d| *d < hi_date) {
        slices.push(ScheduleSlice {
            service_date: date,
            min_time: TimeOfDay::MIDNIGHT,
            max_time: TimeOfDay::END_OF_DAY,
        });
        day = date.succ_opt();
    }

    slices.push(ScheduleSlice {
        service_date: hi_date,
        min_time: TimeOfDay::MIDNIGHT,
        max_time: hi_time,
    });

    slices
}

/// Calendar slices plus their overnight carries, sorted, with touching
/// slices on the same service date merged.
///
/// This is the full set of schedule queries needed to see every trip running
/// inside the window, whichever service date the agency filed it under. The
/// schedule API matches each stop time against a slice independently, so a
/// trip leaving at 23:55 and arriving at 24:07 is only paired when one slice
/// spans both; a carry starting at 24:00 therefore joins the slice that ends
/// at 23:59 on the same date.
pub fn service_day_slices(slices: &[ScheduleSlice]) -> Vec<ScheduleSlice> {
    let mut all: Vec<ScheduleSlice> = slices
        .iter()
        .copied()
        .chain(slices.iter().filter_map(ScheduleSlice::overnight_carry))
        .collect();
    all.sort();

    let mut merged: Vec<ScheduleSlice> = Vec::with_capacity(all.len());
    for slice in all {
        match merged.last_mut() {
            Some(last)
                if last.service_date == slice.service_date
                    && slice.min_time.minutes() <= last.max_time.minutes() + 1 =>
            {
                last.max_time = last.max_time.max(slice.max_time);
            }
            _ => merged.push(slice),
        }
    }
    merged
}

/// The contiguous local range covered by `slices`.
///
/// Returns `None` for an empty list or if any gap longer than the one-second
/// step between 23:59:59 and 00:00:00 separates consecutive slices.
pub fn covered_range(slices: &[ScheduleSlice]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let mut ranges: Vec<(NaiveDateTime, NaiveDateTime)> =
        slices.iter().map(|s| (s.start(), s.end())).collect();
    ranges.sort();

    let mut iter = ranges.into_iter();
    let (first_start, mut covered_to) = iter.next()?;
    for (start, end) in iter {
        if start > covered_to + Duration::seconds(1) {
            return None;
        }
        covered_to = covered_to.max(end);
    }
    Some((first_start, covered_to))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn tod(s: &str) -> TimeOfDay {
        TimeOfDay::parse_hhmm(s).unwrap()
    }

    #[test]
    fn window_rejects_non_positive_horizon() {
        let start = TransitTime::parse_iso("2024-03-15T17:00:00-04:00").unwrap();
        assert!(TimeWindow::new(start, Duration::zero()).is_err());
        assert!(TimeWindow::new(start, Duration::minutes(-5)).is_err());

        let window = TimeWindow::new(start, Duration::hours(3)).unwrap();
        assert_eq!(window.end.to_string(), "20:00");
        assert!(window.contains(start));
        assert!(window.contains(window.end));
        assert!(!window.contains(window.end + Duration::seconds(1)));
    }

    #[test]
    fn single_date_single_slice() {
        let slices = slice_window(dt(15, 16, 0), dt(15, 19, 0), Duration::minutes(30));
        assert_eq!(
            slices,
            vec![ScheduleSlice {
                service_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                min_time: tod("15:30"),
                max_time: tod("19:30"),
            }]
        );
    }

    #[test]
    fn padding_alone_can_cross_midnight() {
        // Window ends 23:45; padding pushes it to 00:15.
        let slices = slice_window(dt(15, 21, 0), dt(15, 23, 45), Duration::minutes(30));
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].max_time, TimeOfDay::END_OF_DAY);
        assert_eq!(slices[1].service_date, NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
        assert_eq!(slices[1].min_time, TimeOfDay::MIDNIGHT);
        assert_eq!(slices[1].max_time, tod("00:15"));
    }

    #[test]
    fn padding_before_midnight_at_start() {
        let slices = slice_window(dt(16, 0, 10), dt(16, 3, 10), Duration::minutes(30));
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].service_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(slices[0].min_time, tod("23:40"));
        assert_eq!(slices[1].max_time, tod("03:40"));
    }

    #[test]
    fn multi_day_has_full_middle_slices() {
        let slices = slice_window(dt(15, 12, 0), dt(18, 1, 0), Duration::zero());
        assert_eq!(slices.len(), 4);
        assert_eq!(slices[1].min_time, TimeOfDay::MIDNIGHT);
        assert_eq!(slices[1].max_time, TimeOfDay::END_OF_DAY);
        assert_eq!(slices[2].service_date, NaiveDate::from_ymd_opt(2024, 3, 17).unwrap());
        assert_eq!(slices[3].max_time, tod("01:00"));
    }

    #[test]
    fn seconds_round_outwards() {
        let start = dt(15, 16, 0) + Duration::seconds(42);
        let end = dt(15, 17, 0) + Duration::seconds(1);
        let slices = slice_window(start, end, Duration::zero());
        assert_eq!(slices[0].min_time, tod("16:00"));
        assert_eq!(slices[0].max_time, tod("17:01"));
    }

    #[test]
    fn negative_pad_treated_as_zero() {
        let slices = slice_window(dt(15, 16, 0), dt(15, 17, 0), Duration::minutes(-30));
        assert_eq!(slices[0].min_time, tod("16:00"));
        assert_eq!(slices[0].max_time, tod("17:00"));
    }

    #[test]
    fn no_carry_after_rollover() {
        let slice = ScheduleSlice {
            service_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            min_time: tod("03:00"),
            max_time: tod("05:00"),
        };
        assert_eq!(slice.overnight_carry(), None);
    }

    #[test]
    fn carry_truncates_at_rollover() {
        let slice = ScheduleSlice {
            service_date: NaiveDate::from_ymd_opt(2024, 3, 16).unwrap(),
            min_time: tod("02:00"),
            max_time: tod("06:00"),
        };
        let carry = slice.overnight_carry().unwrap();
        assert_eq!(carry.min_time, tod("26:00"));
        assert_eq!(carry.max_time, tod("26:59"));
    }

    #[test]
    fn service_day_slices_adds_carries() {
        let slices = slice_window(dt(16, 1, 0), dt(16, 2, 0), Duration::minutes(30));
        let all = service_day_slices(&slices);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].service_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!((all[0].min_time, all[0].max_time), (tod("24:30"), tod("26:30")));
        assert_eq!((all[1].min_time, all[1].max_time), (tod("00:30"), tod("02:30")));
    }

    #[test]
    fn carry_joins_slice_ending_at_midnight() {
        let slices = slice_window(dt(15, 23, 0), dt(16, 1, 0), Duration::minutes(30));
        let all = service_day_slices(&slices);
        assert_eq!(all.len(), 2);

        // One query spans 23:55 and 24:07 on the 15th.
        let evening = all[0];
        assert_eq!(evening.service_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!((evening.min_time, evening.max_time), (tod("22:30"), tod("25:30")));
        assert!(evening.start() <= dt(15, 23, 55) && dt(16, 0, 7) <= evening.end());

        assert_eq!(all[1].service_date, NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
        assert_eq!((all[1].min_time, all[1].max_time), (tod("00:00"), tod("01:30")));
    }

    #[test]
    fn daytime_slices_unchanged() {
        let slices = slice_window(dt(15, 10, 0), dt(15, 12, 0), Duration::minutes(30));
        assert_eq!(service_day_slices(&slices), slices);
    }

    #[test]
    fn covered_range_detects_gap() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let a = ScheduleSlice {
            service_date: d,
            min_time: tod("10:00"),
            max_time: tod("11:00"),
        };
        let b = ScheduleSlice {
            service_date: d,
            min_time: tod("11:02"),
            max_time: tod("12:00"),
        };
        assert_eq!(covered_range(&[a, b]), None);
        assert_eq!(covered_range(&[]), None);

        let c = ScheduleSlice {
            min_time: tod("11:01"),
            ..b
        };
        assert_eq!(covered_range(&[c, a]), Some((dt(15, 10, 0), dt(15, 12, 0) + Duration::seconds(59))));
    }

    #[test]
    fn carry_maps_to_same_wall_clock() {
        let slice = ScheduleSlice {
            service_date: NaiveDate::from_ymd_opt(2024, 3, 16).unwrap(),
            min_time: tod("00:30"),
            max_time: tod("01:00"),
        };
        let carry = slice.overnight_carry().unwrap();
        assert_eq!(carry.start(), slice.start());
        assert_eq!(carry.end(), slice.end());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    proptest! {
        /// Property: the slices reconstruct a range containing the padded window.
        #[test]
        fn slices_cover_padded_window(
            start_secs in 0i64..(5 * 86_400),
            len_secs in 1i64..(3 * 86_400),
            pad_mins in 0i64..120,
        ) {
            let start = base() + Duration::seconds(start_secs);
            let end = start + Duration::seconds(len_secs);
            let pad = Duration::minutes(pad_mins);

            let slices = slice_window(start, end, pad);
            let (lo, hi) = covered_range(&slices).expect("slices must be contiguous");

            prop_assert!(lo <= start - pad);
            prop_assert!(hi >= end + pad);
        }

        /// Property: every slice is a bounded same-date range.
        #[test]
        fn slices_are_bounded_same_date(
            start_secs in 0i64..(5 * 86_400),
            len_secs in 1i64..(3 * 86_400),
        ) {
            let start = base() + Duration::seconds(start_secs);
            let end = start + Duration::seconds(len_secs);

            for slice in slice_window(start, end, Duration::minutes(DEFAULT_PAD_MINS)) {
                prop_assert!(slice.min_time <= slice.max_time);
                prop_assert!(slice.max_time <= TimeOfDay::END_OF_DAY);
            }
        }

        /// Property: adding overnight carries never breaks contiguity.
        #[test]
        fn carries_stay_contiguous(
            start_secs in 0i64..(5 * 86_400),
            len_secs in 1i64..86_400,
        ) {
            let start = base() + Duration::seconds(start_secs);
            let end = start + Duration::seconds(len_secs);
            let slices = slice_window(start, end, Duration::minutes(DEFAULT_PAD_MINS));

            prop_assert_eq!(covered_range(&service_day_slices(&slices)), covered_range(&slices));
        }
    }
}
