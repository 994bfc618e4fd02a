//! Caching layer for data-source responses.
//!
//! Timetables change rarely and stop hierarchies almost never, so both are
//! cached. Predictions and alerts are live data and always pass through.
//!
//! Schedule entries are keyed by the exact slice queried. Successive plans
//! for the same window reuse them, and a rolling window only misses on the
//! slice whose bounds moved.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::domain::{LegPair, RouteId, StopGroup, StopId, TransitTime};
use crate::mbta::MbtaClient;
use crate::planner::{
    AlertScope, AlertSummary, DataSource, DataSourceError, Predictions, ScheduleSlice,
};

/// Cache key for scheduled pairs: (routes, origin, destination, slice).
type ScheduleKey = (Vec<RouteId>, StopGroup, StopGroup, ScheduleSlice);

/// Cached scheduled pairs.
type ScheduleEntry = Arc<Vec<LegPair>>;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached schedule slices.
    pub schedule_ttl: Duration,

    /// TTL for resolved stop groups.
    pub stops_ttl: Duration,

    /// Maximum number of cached entries per cache.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            schedule_ttl: Duration::from_secs(5 * 60),
            stops_ttl: Duration::from_secs(24 * 60 * 60),
            max_capacity: 1000,
        }
    }
}

/// A data source with cached schedules and stop groups.
pub struct CachedSource<S> {
    inner: S,

    /// Scheduled pairs, keyed by (routes, origin, destination, slice).
    schedules: MokaCache<ScheduleKey, ScheduleEntry>,

    /// Stop groups, keyed by parent stop.
    stops: MokaCache<StopId, StopGroup>,
}

/// The MBTA client with caching.
pub type CachedMbtaClient = CachedSource<MbtaClient>;

impl<S: DataSource> CachedSource<S> {
    /// Wrap a source.
    pub fn new(inner: S, config: &CacheConfig) -> Self {
        let schedules = MokaCache::builder()
            .time_to_live(config.schedule_ttl)
            .max_capacity(config.max_capacity)
            .build();
        let stops = MokaCache::builder()
            .time_to_live(config.stops_ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self {
            inner,
            schedules,
            stops,
        }
    }

    /// Access the underlying source for operations that bypass cache.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get cache statistics: (schedule entries, stop entries).
    pub fn entry_counts(&self) -> (u64, u64) {
        (self.schedules.entry_count(), self.stops.entry_count())
    }

    /// Invalidate all cached entries.
    pub fn invalidate_all(&self) {
        self.schedules.invalidate_all();
        self.stops.invalidate_all();
    }
}

fn schedule_key(
    routes: &[RouteId],
    origin: &StopGroup,
    destination: &StopGroup,
    slice: ScheduleSlice,
) -> ScheduleKey {
    let mut routes = routes.to_vec();
    routes.sort();
    routes.dedup();
    (routes, origin.clone(), destination.clone(), slice)
}

impl<S: DataSource> DataSource for CachedSource<S> {
    async fn scheduled_pairs(
        &self,
        routes: &[RouteId],
        origin: &StopGroup,
        destination: &StopGroup,
        slice: ScheduleSlice,
    ) -> Result<Vec<LegPair>, DataSourceError> {
        let key = schedule_key(routes, origin, destination, slice);

        if let Some(cached) = self.schedules.get(&key).await {
            return Ok(cached.as_ref().clone());
        }

        let pairs = self
            .inner
            .scheduled_pairs(routes, origin, destination, slice)
            .await?;
        debug!(?slice, pairs = pairs.len(), "caching schedule slice");
        self.schedules.insert(key, Arc::new(pairs.clone())).await;
        Ok(pairs)
    }

    async fn predicted_endpoints(
        &self,
        routes: &[RouteId],
        origin: &StopGroup,
        destination: &StopGroup,
        cutoff: TransitTime,
    ) -> Result<Predictions, DataSourceError> {
        self.inner
            .predicted_endpoints(routes, origin, destination, cutoff)
            .await
    }

    async fn child_stops(&self, parent: &StopId) -> Result<StopGroup, DataSourceError> {
        if let Some(cached) = self.stops.get(parent).await {
            return Ok(cached);
        }

        let group = self.inner.child_stops(parent).await?;
        self.stops.insert(parent.clone(), group.clone()).await;
        Ok(group)
    }

    async fn relevant_alerts(&self, scope: &AlertScope) -> Result<AlertSummary, DataSourceError> {
        self.inner.relevant_alerts(scope).await
    }
}
