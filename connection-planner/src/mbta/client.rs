//! MBTA v3 HTTP client.
//!
//! Provides async methods for the schedule, prediction, stop and alert
//! endpoints, following JSON:API pagination. Also implements the planner's
//! [`DataSource`] on top of them.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::domain::{LegPair, RouteId, StopGroup, StopId, TransitTime, join_ids};
use crate::planner::{
    AlertScope, AlertSummary, DataSource, DataSourceError, Predictions, ScheduleSlice,
};

use super::convert::{endpoints_from_events, pairs_from_events, stop_events, summarize_alerts};
use super::error::MbtaError;
use super::types::{
    AlertAttributes, ListDocument, Resource, SingleDocument, StopAttributes, StopTimeAttributes,
};

/// Default base URL for the MBTA v3 API.
const DEFAULT_BASE_URL: &str = "https://api-v3.mbta.com";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default page size requested.
const DEFAULT_PAGE_LIMIT: usize = 200;

/// Default cap on pages followed per query.
const DEFAULT_MAX_PAGES: usize = 10;

/// Configuration for the MBTA client.
#[derive(Debug, Clone)]
pub struct MbtaConfig {
    /// API key; anonymous access is allowed at a lower rate limit
    pub api_key: Option<String>,
    /// Base URL for the API (defaults to production)
    pub base_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Records requested per page
    pub page_limit: usize,
    /// Pages followed before giving up on the rest
    pub max_pages: usize,
}

impl Default for MbtaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
            page_limit: DEFAULT_PAGE_LIMIT,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl MbtaConfig {
    /// Create a config with the given API key.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            ..Self::default()
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// MBTA v3 API client.
///
/// Uses a semaphore to limit concurrent requests and avoid rate limiting.
#[derive(Debug, Clone)]
pub struct MbtaClient {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
    page_limit: usize,
    max_pages: usize,
}

impl MbtaClient {
    /// Create a new client with the given configuration.
    pub fn new(config: MbtaConfig) -> Result<Self, MbtaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/vnd.api+json"),
        );

        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let api_key = HeaderValue::from_str(key).map_err(|_| MbtaError::ApiError {
                status: 0,
                message: "Invalid API key format".to_string(),
            })?;
            headers.insert("x-api-key", api_key);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            page_limit: config.page_limit,
            max_pages: config.max_pages.max(1),
        })
    }

    /// Fetch one URL and decode the body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, MbtaError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| MbtaError::ApiError {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(MbtaError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MbtaError::RateLimited);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MbtaError::NotFound(url.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MbtaError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| MbtaError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })
    }

    /// Fetch every page of a list endpoint, up to the page cap.
    async fn get_all<A: DeserializeOwned>(
        &self,
        path: &str,
        mut query: Vec<(&str, String)>,
    ) -> Result<Vec<Resource<A>>, MbtaError> {
        query.push(("page[limit]", self.page_limit.to_string()));

        let first_url = format!("{}{}", self.base_url, path);
        let mut page: ListDocument<A> = self.get_json(&first_url, &query).await?;
        let mut records = std::mem::take(&mut page.data);
        let mut pages = 1;

        while let Some(next) = page.links.next.take() {
            if pages >= self.max_pages {
                warn!(path, pages, "page cap reached, ignoring remaining results");
                break;
            }
            // The next link already carries every query parameter.
            page = self.get_json(&next, &[]).await?;
            records.append(&mut page.data);
            pages += 1;
        }

        debug!(path, records = records.len(), pages, "fetched");
        Ok(records)
    }

    /// Scheduled stop times for trips on `routes` at `stops` within one slice.
    pub async fn schedules(
        &self,
        routes: &[RouteId],
        stops: &[&StopId],
        slice: ScheduleSlice,
    ) -> Result<Vec<Resource<StopTimeAttributes>>, MbtaError> {
        self.get_all(
            "/schedules",
            vec![
                ("filter[route]", join_ids(routes)),
                ("filter[stop]", join_ids(stops.iter().copied())),
                ("filter[date]", slice.service_date.format("%Y-%m-%d").to_string()),
                ("filter[min_time]", slice.min_time.to_string()),
                ("filter[max_time]", slice.max_time.to_string()),
            ],
        )
        .await
    }

    /// Live predictions for trips on `routes` at `stops`.
    pub async fn predictions(
        &self,
        routes: &[RouteId],
        stops: &[&StopId],
    ) -> Result<Vec<Resource<StopTimeAttributes>>, MbtaError> {
        self.get_all(
            "/predictions",
            vec![
                ("filter[route]", join_ids(routes)),
                ("filter[stop]", join_ids(stops.iter().copied())),
            ],
        )
        .await
    }

    /// A parent stop with its child stops.
    pub async fn stop_with_children(&self, parent: &StopId) -> Result<StopGroup, MbtaError> {
        let url = format!("{}/stops/{}", self.base_url, parent);
        let doc: SingleDocument<StopAttributes> = self
            .get_json(&url, &[("include", "child_stops".to_string())])
            .await
            .map_err(|e| match e {
                MbtaError::NotFound(_) => MbtaError::NotFound(format!("stop {parent}")),
                other => other,
            })?;

        let children: Vec<StopId> = doc
            .data
            .related_ids("child_stops")
            .into_iter()
            .map(StopId::from)
            .collect();
        Ok(StopGroup::new(parent.clone(), children))
    }

    /// Alerts currently in effect for `routes` or `stops`.
    pub async fn alerts(
        &self,
        routes: &[RouteId],
        stops: &[StopId],
    ) -> Result<Vec<Resource<AlertAttributes>>, MbtaError> {
        self.get_all(
            "/alerts",
            vec![
                ("filter[route]", join_ids(routes)),
                ("filter[stop]", join_ids(stops)),
                ("filter[datetime]", "NOW".to_string()),
            ],
        )
        .await
    }
}

/// Members of both groups, de-duplicated.
fn leg_stops<'a>(origin: &'a StopGroup, destination: &'a StopGroup) -> Vec<&'a StopId> {
    let mut stops: Vec<&StopId> = origin.members().chain(destination.members()).collect();
    stops.sort();
    stops.dedup();
    stops
}

impl DataSource for MbtaClient {
    async fn scheduled_pairs(
        &self,
        routes: &[RouteId],
        origin: &StopGroup,
        destination: &StopGroup,
        slice: ScheduleSlice,
    ) -> Result<Vec<LegPair>, DataSourceError> {
        let records = self
            .schedules(routes, &leg_stops(origin, destination), slice)
            .await
            .map_err(|e| e.into_source_error("schedules"))?;
        Ok(pairs_from_events(&stop_events(&records), origin, destination))
    }

    async fn predicted_endpoints(
        &self,
        routes: &[RouteId],
        origin: &StopGroup,
        destination: &StopGroup,
        cutoff: TransitTime,
    ) -> Result<Predictions, DataSourceError> {
        let records = self
            .predictions(routes, &leg_stops(origin, destination))
            .await
            .map_err(|e| e.into_source_error("predictions"))?;
        Ok(endpoints_from_events(&stop_events(&records), origin, destination, cutoff))
    }

    async fn child_stops(&self, parent: &StopId) -> Result<StopGroup, DataSourceError> {
        self.stop_with_children(parent)
            .await
            .map_err(|e| e.into_source_error("stops"))
    }

    async fn relevant_alerts(&self, scope: &AlertScope) -> Result<AlertSummary, DataSourceError> {
        let records = self
            .alerts(&scope.all_routes(), &scope.stops)
            .await
            .map_err(|e| e.into_source_error("alerts"))?;
        Ok(summarize_alerts(&records, scope))
    }
}
