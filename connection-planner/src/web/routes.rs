//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::planner::{DataSource, GroupKey, PlanError, PlanTime};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router<S>(state: AppState<S>) -> Router
where
    S: DataSource + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/plan", get(plan::<S>))
        .route("/plan/status", get(plan_status::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// The plan: built on request for `at`, otherwise the background snapshot.
async fn plan<S>(
    State(state): State<AppState<S>>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<PlanResponse>, AppError>
where
    S: DataSource + Send + Sync + 'static,
{
    let expanded = query
        .expanded
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(str::parse::<GroupKey>)
        .transpose()
        .map_err(|e| AppError::BadRequest {
            message: format!("Invalid group key: {e}"),
        })?;

    let at = query.at.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let response = match at {
        Some(input) => {
            let at = PlanTime::resolve(state.now(), Some(input), state.config.time_zone);
            let plan = state.plan_at(at).await?;
            PlanResponse::from_plan(&plan, expanded.as_ref())
        }
        None => {
            let mut snapshot = state.snapshot().await;
            if snapshot.plan.is_none() {
                state.refresh().await?;
                snapshot = state.snapshot().await;
            }
            let plan = snapshot.plan.clone().ok_or_else(|| AppError::Unavailable {
                message: "No plan available yet".to_string(),
            })?;
            PlanResponse::from_plan(&plan, expanded.as_ref()).with_snapshot(&snapshot)
        }
    };

    Ok(Json(response))
}

/// Snapshot metadata.
async fn plan_status<S>(State(state): State<AppState<S>>) -> Json<StatusResponse>
where
    S: DataSource + Send + Sync + 'static,
{
    Json(StatusResponse::from(&state.snapshot().await))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Unavailable { message: String },
    Upstream { message: String },
    Internal { message: String },
}

impl From<PlanError> for AppError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::Window(_) => AppError::BadRequest {
                message: e.to_string(),
            },
            PlanError::DataSource(_) => AppError::Upstream {
                message: e.to_string(),
            },
            PlanError::Config(_) => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::Unavailable { message } => (StatusCode::SERVICE_UNAVAILABLE, message),
            AppError::Upstream { message } => (StatusCode::BAD_GATEWAY, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        warn!(%status, %message, "request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use chrono_tz::Tz;

    use super::*;
    use crate::domain::{LegPair, RouteId, StopGroup, StopId, TransitTime};
    use crate::planner::{
        AlertScope, AlertSummary, DataSourceError, NowSource, PlanConfig, Predictions,
        ScheduleSlice,
    };

    /// One bus trip and nothing else; alerts fail while `fail` is set.
    #[derive(Default)]
    struct OneBus {
        fail: AtomicBool,
        prediction_calls: AtomicUsize,
    }

    fn t(hhmm: &str) -> TransitTime {
        TransitTime::parse_iso(&format!("2024-03-15T{hhmm}:00-04:00")).unwrap()
    }

    fn fixed_now(_tz: Tz) -> TransitTime {
        t("17:00")
    }

    impl DataSource for OneBus {
        async fn scheduled_pairs(
            &self,
            _routes: &[RouteId],
            origin: &StopGroup,
            _destination: &StopGroup,
            _slice: ScheduleSlice,
        ) -> Result<Vec<LegPair>, DataSourceError> {
            if origin.parent().as_str() != "place-harsq" {
                return Ok(Vec::new());
            }
            Ok(vec![
                LegPair::scheduled("b1".into(), t("17:10"), t("17:25")).unwrap(),
            ])
        }

        async fn predicted_endpoints(
            &self,
            _routes: &[RouteId],
            _origin: &StopGroup,
            _destination: &StopGroup,
            _cutoff: TransitTime,
        ) -> Result<Predictions, DataSourceError> {
            self.prediction_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Predictions::new())
        }

        async fn child_stops(&self, parent: &StopId) -> Result<StopGroup, DataSourceError> {
            Ok(StopGroup::single(parent.clone()))
        }

        async fn relevant_alerts(
            &self,
            _scope: &AlertScope,
        ) -> Result<AlertSummary, DataSourceError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DataSourceError::RateLimited {
                    resource: "alerts".into(),
                });
            }
            Ok(AlertSummary::default())
        }
    }

    fn state() -> AppState<OneBus> {
        AppState::new(OneBus::default(), PlanConfig::default()).with_clock(fixed_now)
    }

    fn query(at: Option<&str>, expanded: Option<&str>) -> Query<PlanQuery> {
        Query(PlanQuery {
            at: at.map(str::to_string),
            expanded: expanded.map(str::to_string),
        })
    }

    const B1_KEY: &str = "2024-03-15T17:10:00-04:00|b1";

    #[tokio::test]
    async fn health_is_ok() {
        assert_eq!(health().await, "ok");
    }

    #[tokio::test]
    async fn first_request_builds_snapshot() {
        let state = state();
        let Json(response) = plan(State(state.clone()), query(None, None)).await.unwrap();

        assert_eq!(response.now_source, NowSource::Live);
        assert_eq!(response.groups.len(), 1);
        assert_eq!(response.groups[0].key.to_string(), B1_KEY);
        assert!(!response.groups[0].best);
        assert!(!response.has_any_connections);
        assert!(!response.stale);
        assert_eq!(response.updated_secs_ago, Some(0));

        let Json(status) = plan_status(State(state)).await;
        assert!(status.has_plan);
    }

    #[tokio::test]
    async fn expanded_group_selected() {
        let state = state();
        let Json(response) = plan(State(state), query(None, Some(B1_KEY))).await.unwrap();
        assert!(response.groups[0].expanded);
        assert_eq!(response.groups[0].rows.len(), 1);
    }

    #[tokio::test]
    async fn unknown_expanded_key_leaves_collapsed() {
        let state = state();
        let key = "2024-03-15T18:00:00-04:00|nope";
        let Json(response) = plan(State(state), query(None, Some(key))).await.unwrap();
        assert!(response.groups.iter().all(|g| !g.expanded));
    }

    #[tokio::test]
    async fn malformed_expanded_key_rejected() {
        let result = plan(State(state()), query(None, Some("17:10"))).await;
        assert!(matches!(result, Err(AppError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn override_skips_snapshot_and_predictions() {
        let state = state();
        let Json(response) = plan(State(state.clone()), query(Some("2024-03-15T17:05"), None))
            .await
            .unwrap();

        assert_eq!(response.now_source, NowSource::Override);
        assert_eq!(response.now.to_string(), "17:05");
        assert_eq!(response.updated_secs_ago, None);
        assert_eq!(state.source.prediction_calls.load(Ordering::SeqCst), 0);
        assert!(state.snapshot().await.plan.is_none());
    }

    #[tokio::test]
    async fn invalid_override_flagged() {
        let Json(response) = plan(State(state()), query(Some("tomorrow"), None))
            .await
            .unwrap();
        assert_eq!(response.now_source, NowSource::InvalidOverride);
        assert_eq!(response.now, t("17:00"));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_plan() {
        let state = state();
        state.refresh().await.unwrap();

        state.source.fail.store(true, Ordering::SeqCst);
        assert!(state.refresh().await.is_err());

        let Json(response) = plan(State(state.clone()), query(None, None)).await.unwrap();
        assert!(response.stale);
        assert_eq!(response.groups.len(), 1);
        assert!(response.last_error.unwrap().contains("rate limited"));

        state.source.fail.store(false, Ordering::SeqCst);
        state.refresh().await.unwrap();
        let Json(status) = plan_status(State(state)).await;
        assert!(!status.stale);
        assert_eq!(status.last_error, None);
    }

    #[tokio::test]
    async fn failure_without_plan_is_bad_gateway() {
        let state = state();
        state.source.fail.store(true, Ordering::SeqCst);
        let result = plan(State(state), query(None, None)).await;
        assert!(matches!(result, Err(AppError::Upstream { .. })));
    }

    #[test]
    fn error_status_codes() {
        let cases = [
            (
                AppError::BadRequest { message: "x".into() },
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Unavailable { message: "x".into() },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Upstream { message: "x".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Internal { message: "x".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn router_builds() {
        let _router = create_router(state());
    }
}
