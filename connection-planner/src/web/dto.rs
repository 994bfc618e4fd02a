//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::domain::TransitTime;
use crate::planner::{AlertCounts, BusTrip, GroupKey, NowSource, Plan, PlanRow, TimeWindow};

use super::state::PlanSnapshot;

/// Query parameters for `GET /plan`.
#[derive(Debug, Default, Deserialize)]
pub struct PlanQuery {
    /// Simulated start time, `YYYY-MM-DDTHH:MM` local
    pub at: Option<String>,

    /// Group key to show expanded
    pub expanded: Option<String>,
}

/// One group in a plan response.
#[derive(Debug, Serialize)]
pub struct GroupResult {
    /// Wire form of the group key, usable as `expanded`
    pub key: GroupKey,

    pub best: bool,

    pub expanded: bool,

    /// Bus trip behind the group; absent for the no-connection group
    pub bus: Option<BusTrip>,

    /// Upstream arrivals in the group
    pub connections: usize,

    pub rows: Vec<PlanRow>,
}

/// Response to `GET /plan`.
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub now: TransitTime,

    pub now_source: NowSource,

    pub window: TimeWindow,

    pub include_home_leg: bool,

    pub alert_headers: Vec<String>,

    pub alert_counts: AlertCounts,

    pub has_any_connections: bool,

    /// Key of the soonest recommended group
    pub best: Option<GroupKey>,

    pub groups: Vec<GroupResult>,

    /// The last refresh failed; this plan is older than it should be
    pub stale: bool,

    /// Age of a background plan; absent for plans built on request
    pub updated_secs_ago: Option<u64>,

    pub last_error: Option<String>,
}

impl PlanResponse {
    /// Project a plan, with `expanded` (if any) shown in full.
    pub fn from_plan(plan: &Plan, expanded: Option<&GroupKey>) -> Self {
        let groups = plan
            .rows(expanded)
            .into_iter()
            .zip(&plan.groups)
            .map(|(rows, group)| GroupResult {
                key: rows.key,
                best: rows.best,
                expanded: rows.expanded,
                bus: group.bus.clone(),
                connections: group.items.len(),
                rows: rows.rows,
            })
            .collect();

        Self {
            now: plan.now,
            now_source: plan.now_source,
            window: plan.window,
            include_home_leg: plan.include_home_leg,
            alert_headers: plan.alert_headers.clone(),
            alert_counts: plan.alert_counts,
            has_any_connections: plan.has_any_connections,
            best: plan.best_group().map(|g| g.key.clone()),
            groups,
            stale: false,
            updated_secs_ago: None,
            last_error: None,
        }
    }

    /// Attach the snapshot's freshness.
    pub fn with_snapshot(mut self, snapshot: &PlanSnapshot) -> Self {
        self.stale = snapshot.is_stale();
        self.updated_secs_ago = snapshot.age_secs();
        self.last_error = snapshot.last_error.clone();
        self
    }
}

/// Response to `GET /plan/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub has_plan: bool,
    pub stale: bool,
    pub updated_secs_ago: Option<u64>,
    pub last_error: Option<String>,
}

impl From<&PlanSnapshot> for StatusResponse {
    fn from(snapshot: &PlanSnapshot) -> Self {
        Self {
            has_plan: snapshot.plan.is_some(),
            stale: snapshot.is_stale(),
            updated_secs_ago: snapshot.age_secs(),
            last_error: snapshot.last_error.clone(),
        }
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;

    fn empty_plan() -> Plan {
        let now = TransitTime::parse_iso("2024-03-15T17:00:00-04:00").unwrap();
        Plan {
            now,
            now_source: NowSource::Live,
            window: TimeWindow::new(now, chrono::Duration::hours(3)).unwrap(),
            include_home_leg: false,
            alert_headers: vec!["Red Line delays".into()],
            alert_counts: AlertCounts::default(),
            groups: Vec::new(),
            has_any_connections: false,
        }
    }

    #[test]
    fn response_from_empty_plan() {
        let response = PlanResponse::from_plan(&empty_plan(), None);
        assert!(response.groups.is_empty());
        assert_eq!(response.best, None);
        assert!(!response.stale);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["now"], "2024-03-15T17:00:00-04:00");
        assert_eq!(json["now_source"], "live");
        assert_eq!(json["alert_headers"][0], "Red Line delays");
    }

    #[test]
    fn stale_snapshot_reported() {
        let snapshot = PlanSnapshot {
            plan: Some(Arc::new(empty_plan())),
            updated_at: Some(Instant::now()),
            last_error: Some("rate limited fetching predictions".into()),
        };
        let response = PlanResponse::from_plan(&empty_plan(), None).with_snapshot(&snapshot);
        assert!(response.stale);
        assert_eq!(response.updated_secs_ago, Some(0));

        let status = StatusResponse::from(&snapshot);
        assert!(status.has_plan);
        assert!(status.stale);
    }

    #[test]
    fn error_without_plan_is_not_stale() {
        let snapshot = PlanSnapshot {
            last_error: Some("boom".into()),
            ..PlanSnapshot::default()
        };
        let status = StatusResponse::from(&snapshot);
        assert!(!status.has_plan);
        assert!(!status.stale);
        assert_eq!(status.updated_secs_ago, None);
    }
}
