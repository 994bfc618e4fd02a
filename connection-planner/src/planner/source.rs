//! Data source abstraction.
//!
//! The planner never talks HTTP itself. It asks a [`DataSource`] for timetable
//! pairs, predictions, stop groups and alerts, which lets the whole pipeline run
//! against an in-memory mock in tests.

use std::future::Future;

use serde::Serialize;

use super::merge::Predictions;
use super::window::ScheduleSlice;
use crate::domain::{LegPair, RouteId, StopGroup, StopId, TransitTime};

/// Errors from fetching data.
///
/// These are surfaced to the caller unchanged; the planner does not retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataSourceError {
    /// Network, HTTP or decoding failure
    #[error("failed to fetch {resource}: {message}")]
    Fetch { resource: String, message: String },

    /// The source refused the request for now
    #[error("rate limited fetching {resource}")]
    RateLimited { resource: String },

    /// A stop or other named entity is unknown to the source
    #[error("not found: {0}")]
    NotFound(String),
}

/// The three legs, for attributing alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegRole {
    Upstream,
    Middle,
    Bus,
}

/// Which routes and stops alerts are wanted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertScope {
    pub upstream_routes: Vec<RouteId>,
    pub middle_routes: Vec<RouteId>,
    pub bus_routes: Vec<RouteId>,
    /// Every stop (parents and children) the plan touches.
    pub stops: Vec<StopId>,
}

impl AlertScope {
    /// The legs a route belongs to.
    pub fn roles_of(&self, route: &RouteId) -> impl Iterator<Item = LegRole> {
        [
            (LegRole::Upstream, &self.upstream_routes),
            (LegRole::Middle, &self.middle_routes),
            (LegRole::Bus, &self.bus_routes),
        ]
        .into_iter()
        .filter(move |(_, routes)| routes.contains(route))
        .map(|(role, _)| role)
    }

    /// All routes in scope, de-duplicated and sorted.
    pub fn all_routes(&self) -> Vec<RouteId> {
        let mut routes: Vec<RouteId> = self
            .upstream_routes
            .iter()
            .chain(&self.middle_routes)
            .chain(&self.bus_routes)
            .cloned()
            .collect();
        routes.sort();
        routes.dedup();
        routes
    }
}

/// Active alert counts per leg.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertCounts {
    pub upstream: usize,
    pub middle: usize,
    pub bus: usize,
}

impl AlertCounts {
    /// Count one alert against a leg.
    pub fn bump(&mut self, role: LegRole) {
        match role {
            LegRole::Upstream => self.upstream += 1,
            LegRole::Middle => self.middle += 1,
            LegRole::Bus => self.bus += 1,
        }
    }
}

/// Alert headlines and per-leg counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    /// Distinct headers, sorted.
    pub headers: Vec<String>,
    pub counts: AlertCounts,
}

/// Source of timetable, prediction, stop and alert data.
///
/// Futures are `Send` so a plan can be built inside a spawned task or an
/// HTTP handler.
pub trait DataSource: Sync {
    /// Timetable pairs for trips on `routes` visiting `origin` then `destination`
    /// within one schedule slice.
    fn scheduled_pairs(
        &self,
        routes: &[RouteId],
        origin: &StopGroup,
        destination: &StopGroup,
        slice: ScheduleSlice,
    ) -> impl Future<Output = Result<Vec<LegPair>, DataSourceError>> + Send;

    /// Live predictions at the two stop groups, no later than `cutoff`.
    fn predicted_endpoints(
        &self,
        routes: &[RouteId],
        origin: &StopGroup,
        destination: &StopGroup,
        cutoff: TransitTime,
    ) -> impl Future<Output = Result<Predictions, DataSourceError>> + Send;

    /// Expand a parent stop into its group of platform stops.
    fn child_stops(
        &self,
        parent: &StopId,
    ) -> impl Future<Output = Result<StopGroup, DataSourceError>> + Send;

    /// Alerts currently in effect for the scope.
    fn relevant_alerts(
        &self,
        scope: &AlertScope,
    ) -> impl Future<Output = Result<AlertSummary, DataSourceError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> AlertScope {
        AlertScope {
            upstream_routes: vec![RouteId::from("Red")],
            middle_routes: vec![RouteId::from("Green-B"), RouteId::from("Green-C")],
            bus_routes: vec![RouteId::from("1"), RouteId::from("Red")],
            stops: Vec::new(),
        }
    }

    #[test]
    fn roles_of_route() {
        let scope = scope();
        let roles: Vec<LegRole> = scope.roles_of(&RouteId::from("Red")).collect();
        assert_eq!(roles, vec![LegRole::Upstream, LegRole::Bus]);
        assert_eq!(scope.roles_of(&RouteId::from("Orange")).count(), 0);
    }

    #[test]
    fn all_routes_deduplicated() {
        let routes = scope().all_routes();
        let names: Vec<&str> = routes.iter().map(RouteId::as_str).collect();
        assert_eq!(names, vec!["1", "Green-B", "Green-C", "Red"]);
    }

    #[test]
    fn counts_bump() {
        let mut counts = AlertCounts::default();
        counts.bump(LegRole::Middle);
        counts.bump(LegRole::Middle);
        counts.bump(LegRole::Bus);
        assert_eq!(
            counts,
            AlertCounts {
                upstream: 0,
                middle: 2,
                bus: 1
            }
        );
    }
}
