//! Application state for the web layer.

use std::sync::Arc;
use std::time::Instant;

use chrono_tz::Tz;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::TransitTime;
use crate::planner::{DataSource, Plan, PlanConfig, PlanError, PlanTime, build_plan};

/// The real current time, rendered in `tz`.
pub fn live_now(tz: Tz) -> TransitTime {
    TransitTime::from_datetime(chrono::Utc::now().with_timezone(&tz))
}

/// The latest background plan and how it got there.
#[derive(Debug, Clone, Default)]
pub struct PlanSnapshot {
    /// Last successfully built live plan.
    pub plan: Option<Arc<Plan>>,

    /// When `plan` was built.
    pub updated_at: Option<Instant>,

    /// Error from the most recent refresh, cleared on success.
    pub last_error: Option<String>,
}

impl PlanSnapshot {
    /// Whole seconds since the plan was built.
    pub fn age_secs(&self) -> Option<u64> {
        self.updated_at.map(|at| at.elapsed().as_secs())
    }

    /// A plan exists but the latest refresh failed.
    pub fn is_stale(&self) -> bool {
        self.plan.is_some() && self.last_error.is_some()
    }
}

/// Shared application state.
///
/// Contains the data source, the plan settings and the background snapshot.
pub struct AppState<S> {
    /// Data source (normally the cached MBTA client)
    pub source: Arc<S>,

    /// Planner configuration
    pub config: Arc<PlanConfig>,

    /// Latest live plan
    pub snapshot: Arc<RwLock<PlanSnapshot>>,

    clock: fn(Tz) -> TransitTime,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            config: Arc::clone(&self.config),
            snapshot: Arc::clone(&self.snapshot),
            clock: self.clock,
        }
    }
}

impl<S: DataSource> AppState<S> {
    /// Create a new app state.
    pub fn new(source: S, config: PlanConfig) -> Self {
        Self {
            source: Arc::new(source),
            config: Arc::new(config),
            snapshot: Arc::new(RwLock::new(PlanSnapshot::default())),
            clock: live_now,
        }
    }

    /// Replace the wall clock (for tests).
    pub fn with_clock(mut self, clock: fn(Tz) -> TransitTime) -> Self {
        self.clock = clock;
        self
    }

    /// The current time in the configured zone.
    pub fn now(&self) -> TransitTime {
        (self.clock)(self.config.time_zone)
    }

    /// Build a plan for `at` without touching the snapshot.
    pub async fn plan_at(&self, at: PlanTime) -> Result<Plan, PlanError> {
        build_plan(self.source.as_ref(), &self.config, at).await
    }

    /// Rebuild the live plan and store it.
    ///
    /// On failure the previous plan is kept and the error recorded.
    pub async fn refresh(&self) -> Result<Arc<Plan>, PlanError> {
        let result = self.plan_at(PlanTime::live(self.now())).await;
        let mut snapshot = self.snapshot.write().await;

        match result {
            Ok(plan) => {
                let plan = Arc::new(plan);
                snapshot.plan = Some(Arc::clone(&plan));
                snapshot.updated_at = Some(Instant::now());
                snapshot.last_error = None;
                info!(groups = plan.groups.len(), "live plan refreshed");
                Ok(plan)
            }
            Err(e) => {
                warn!(error = %e, kept_previous = snapshot.plan.is_some(), "plan refresh failed");
                snapshot.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// A copy of the current snapshot.
    pub async fn snapshot(&self) -> PlanSnapshot {
        self.snapshot.read().await.clone()
    }
}
