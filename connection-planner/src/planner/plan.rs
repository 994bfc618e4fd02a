//! Plan construction.
//!
//! `build_plan` runs the whole pipeline for one refresh: slice the window,
//! fetch every leg concurrently, merge, assign, then group and rank. Nothing is
//! carried over between calls.

use std::collections::{BTreeMap, BTreeSet};

use chrono_tz::Tz;
use futures::future::try_join_all;
use futures::try_join;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::config::{ConfigError, PlanConfig};
use super::connect::{GroupKey, assign};
use super::merge::{Predictions, assemble_bus_trips, merge_leg, within_horizon};
use super::rank::{Group, PlanRow, collapsed_row, expanded_rows, group_assignments};
use super::source::{AlertCounts, AlertScope, DataSource, DataSourceError};
use super::window::{ScheduleSlice, TimeWindow, service_day_slices, slice_window};
use crate::domain::{
    DomainError, LegPair, RouteId, StopGroup, StopId, TransitTime, parse_override,
};

/// Errors that abort a plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Window(#[from] DomainError),

    #[error("data source error: {0}")]
    DataSource(#[from] DataSourceError),
}

/// Where the plan's "now" came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NowSource {
    /// The real current time.
    Live,
    /// A simulated start time supplied by the user.
    Override,
    /// A simulated start time was supplied but could not be parsed; the real
    /// current time was used instead.
    InvalidOverride,
}

/// The resolved start instant for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanTime {
    pub now: TransitTime,
    pub source: NowSource,
}

impl PlanTime {
    /// Plan against the real current time.
    pub fn live(now: TransitTime) -> Self {
        Self {
            now,
            source: NowSource::Live,
        }
    }

    /// Resolve an optional override against the real current time.
    ///
    /// An empty override counts as none. An unparseable one falls back to
    /// `real_now` and is flagged.
    ///
    /// ```
    /// use connection_planner::domain::TransitTime;
    /// use connection_planner::planner::{NowSource, PlanTime};
    ///
    /// let tz = chrono_tz::America::New_York;
    /// let real = TransitTime::parse_iso("2024-03-15T12:00:00-04:00").unwrap();
    ///
    /// let at = PlanTime::resolve(real, Some("2024-03-15T17:00"), tz);
    /// assert_eq!(at.source, NowSource::Override);
    /// assert_eq!(at.now.to_string(), "17:00");
    ///
    /// let at = PlanTime::resolve(real, Some("5pm"), tz);
    /// assert_eq!(at.source, NowSource::InvalidOverride);
    /// assert_eq!(at.now, real);
    /// ```
    pub fn resolve(real_now: TransitTime, override_input: Option<&str>, tz: Tz) -> Self {
        match override_input.map(str::trim).filter(|s| !s.is_empty()) {
            None => Self::live(real_now),
            Some(input) => match parse_override(input, tz) {
                Ok(now) => Self {
                    now,
                    source: NowSource::Override,
                },
                Err(e) => {
                    warn!(input, error = %e, "ignoring invalid override time");
                    Self {
                        now: real_now,
                        source: NowSource::InvalidOverride,
                    }
                }
            },
        }
    }

    /// Returns true if live predictions apply to this start time.
    pub fn wants_predictions(&self) -> bool {
        self.source != NowSource::Override
    }
}

/// The computed plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub now: TransitTime,
    pub now_source: NowSource,
    pub window: TimeWindow,
    pub include_home_leg: bool,
    pub alert_headers: Vec<String>,
    pub alert_counts: AlertCounts,
    pub groups: Vec<Group>,
    /// True if at least one upstream arrival connects to a bus.
    pub has_any_connections: bool,
}

/// A group's display rows, collapsed or expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRows {
    pub key: GroupKey,
    pub best: bool,
    pub expanded: bool,
    pub rows: Vec<PlanRow>,
}

impl Plan {
    /// The soonest group flagged best, used for arrival notifications.
    pub fn best_group(&self) -> Option<&Group> {
        self.groups.iter().find(|g| g.best)
    }

    /// Looks up a group by key.
    pub fn group(&self, key: &GroupKey) -> Option<&Group> {
        self.groups.iter().find(|g| &g.key == key)
    }

    /// Rows for every group: expanded for `expanded`, collapsed otherwise.
    ///
    /// The selection is owned by the caller; a key matching no group simply
    /// leaves everything collapsed.
    pub fn rows(&self, expanded: Option<&GroupKey>) -> Vec<GroupRows> {
        self.groups
            .iter()
            .map(|group| {
                let is_expanded = expanded == Some(&group.key);
                let rows = if is_expanded {
                    expanded_rows(group, self.include_home_leg)
                } else {
                    collapsed_row(group, self.include_home_leg).into_iter().collect()
                };
                GroupRows {
                    key: group.key.clone(),
                    best: group.best,
                    expanded: is_expanded,
                    rows,
                }
            })
            .collect()
    }
}

/// Routes and resolved stop groups for one leg.
struct LegQuery<'a> {
    routes: &'a [RouteId],
    origin: &'a StopGroup,
    destination: &'a StopGroup,
}

/// Raw data for one leg before merging.
struct LegData {
    scheduled: Vec<LegPair>,
    predicted: Option<Predictions>,
}

async fn fetch_leg<S: DataSource>(
    source: &S,
    leg: &LegQuery<'_>,
    slices: &[ScheduleSlice],
    cutoff: Option<TransitTime>,
) -> Result<LegData, DataSourceError> {
    let scheduled = try_join_all(
        slices
            .iter()
            .map(|slice| source.scheduled_pairs(leg.routes, leg.origin, leg.destination, *slice)),
    );
    let predicted = async {
        match cutoff {
            Some(cutoff) => source
                .predicted_endpoints(leg.routes, leg.origin, leg.destination, cutoff)
                .await
                .map(|p| Some(within_horizon(p, cutoff))),
            None => Ok(None),
        }
    };

    let (scheduled, predicted) = try_join!(scheduled, predicted)?;
    Ok(LegData {
        scheduled: scheduled.into_iter().flatten().collect(),
        predicted,
    })
}

/// Resolve every configured parent stop into its group, concurrently.
async fn resolve_stops<S: DataSource>(
    source: &S,
    config: &PlanConfig,
) -> Result<BTreeMap<StopId, StopGroup>, DataSourceError> {
    let parents: BTreeSet<&StopId> = [
        &config.upstream.origin,
        &config.upstream.destination,
        &config.middle.origin,
        &config.middle.destination,
        &config.bus.board,
        &config.bus.alight,
    ]
    .into_iter()
    .chain(config.home_stop())
    .collect();

    let groups = try_join_all(parents.into_iter().map(|p| source.child_stops(p))).await?;
    Ok(groups
        .into_iter()
        .map(|group| (group.parent().clone(), group))
        .collect())
}

/// Latest departure for which live predictions are used; `None` when the
/// start time is simulated.
fn prediction_cutoff(at: &PlanTime, config: &PlanConfig) -> Result<Option<TransitTime>, PlanError> {
    if !at.wants_predictions() {
        return Ok(None);
    }
    at.now
        .checked_add(config.prediction_horizon())
        .map(Some)
        .ok_or(PlanError::Config(ConfigError::OutOfRange {
            field: "prediction_horizon_mins",
            reason: "overflows the plan start time",
        }))
}

/// Build a plan.
///
/// Fetches run concurrently; the first failure aborts the plan and no partial
/// result is returned.
pub async fn build_plan<S: DataSource>(
    source: &S,
    config: &PlanConfig,
    at: PlanTime,
) -> Result<Plan, PlanError> {
    config.validate()?;

    let tz = config.time_zone;
    let window = TimeWindow::new(at.now, config.horizon())?;
    let slices = service_day_slices(&slice_window(
        window.start.local(tz),
        window.end.local(tz),
        config.pad(),
    ));
    debug!(?slices, "schedule slices");

    let stops = resolve_stops(source, config).await?;
    let group_for = |id: &StopId| {
        stops
            .get(id)
            .cloned()
            .unwrap_or_else(|| StopGroup::single(id.clone()))
    };
    let upstream_origin = group_for(&config.upstream.origin);
    let upstream_destination = group_for(&config.upstream.destination);
    let middle_origin = group_for(&config.middle.origin);
    let middle_destination = group_for(&config.middle.destination);
    let board = group_for(&config.bus.board);
    let alight = group_for(&config.bus.alight);
    let home = config.home_stop().map(|id| group_for(id));

    let upstream_q = LegQuery {
        routes: &config.upstream.routes,
        origin: &upstream_origin,
        destination: &upstream_destination,
    };
    let middle_q = LegQuery {
        routes: &config.middle.routes,
        origin: &middle_origin,
        destination: &middle_destination,
    };
    let bus_q = LegQuery {
        routes: &config.bus.routes,
        origin: &board,
        destination: &alight,
    };
    let home_q = home.as_ref().map(|home| LegQuery {
        routes: &config.bus.routes,
        origin: &board,
        destination: home,
    });

    let scope = AlertScope {
        upstream_routes: config.upstream.routes.clone(),
        middle_routes: config.middle.routes.clone(),
        bus_routes: config.bus.routes.clone(),
        stops: stops
            .values()
            .flat_map(|group| group.members().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let cutoff = prediction_cutoff(&at, config)?;

    let home_fetch = async {
        match &home_q {
            Some(q) => fetch_leg(source, q, &slices, cutoff).await.map(Some),
            None => Ok(None),
        }
    };

    let (upstream, middle, bus, home_leg, alerts) = try_join!(
        fetch_leg(source, &upstream_q, &slices, cutoff),
        fetch_leg(source, &middle_q, &slices, cutoff),
        fetch_leg(source, &bus_q, &slices, cutoff),
        home_fetch,
        source.relevant_alerts(&scope),
    )?;

    let upstream = merge_leg(upstream.scheduled, upstream.predicted.as_ref(), &window);
    let middle = merge_leg(middle.scheduled, middle.predicted.as_ref(), &window);
    let bus = merge_leg(bus.scheduled, bus.predicted.as_ref(), &window);
    let home_leg = home_leg.map(|h| merge_leg(h.scheduled, h.predicted.as_ref(), &window));

    let buses = assemble_bus_trips(&bus, home_leg.as_ref());
    let assignments = assign(&upstream, &middle, &buses, &window, config.buffer());
    let groups = group_assignments(assignments, &buses, &window, config.buffer_minutes());
    let has_any_connections = groups.iter().any(Group::is_eligible);

    info!(
        now = %at.now,
        source = ?at.source,
        upstream = upstream.len(),
        middle = middle.len(),
        buses = buses.len(),
        groups = groups.len(),
        "plan built"
    );

    Ok(Plan {
        now: at.now,
        now_source: at.source,
        window,
        include_home_leg: config.home_stop().is_some(),
        alert_headers: alerts.headers,
        alert_counts: alerts.counts,
        groups,
        has_any_connections,
    })
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
