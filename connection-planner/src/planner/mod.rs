//! Connection planning.
//!
//! This module turns timetable and live data for three fixed legs into a
//! ranked list of connections:
//!
//! 1. `window` slices the plan window into per-date schedule queries.
//! 2. `merge` overlays predictions onto the timetable, per leg.
//! 3. `connect` pairs each upstream trip with a feeder and a bus.
//! 4. `rank` groups connections by bus and projects display rows.
//!
//! [`build_plan`] drives the pipeline against any [`DataSource`].

mod config;
mod connect;
mod merge;
mod plan;
mod rank;
mod search;
mod source;
mod window;

pub use config::{BusStops, ConfigError, LegStops, MAX_HORIZON_HOURS, MAX_OFFSET_MINS, PlanConfig};
pub use connect::{Assignment, GroupKey, GroupKeyError, assign, find_bus, find_feeder};
pub use merge::{
    BusTrip, MergedLeg, PredictedEndpoints, Predictions, assemble_bus_trips, merge_leg,
    select_scheduled, within_horizon,
};
pub use plan::{GroupRows, NowSource, Plan, PlanError, PlanTime, build_plan};
pub use rank::{Cell, Group, PlanRow, collapsed_row, expanded_rows, group_assignments, mark_best};
pub use search::{first_at_or_after, last_at_or_before, lower_bound_by_key, upper_bound_by_key};
pub use source::{
    AlertCounts, AlertScope, AlertSummary, DataSource, DataSourceError, LegRole,
};
pub use window::{
    DEFAULT_PAD_MINS, ScheduleSlice, TimeWindow, covered_range, service_day_slices, slice_window,
};
