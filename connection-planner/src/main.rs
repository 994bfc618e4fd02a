use connection_planner::cache::{CacheConfig, CachedMbtaClient};
use connection_planner::config::AppConfig;
use connection_planner::mbta::{MbtaClient, MbtaConfig};
use connection_planner::web::{AppState, create_router};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=info".into()))
        .init();

    let config = AppConfig::from_env()?;
    if config.api_key.is_none() {
        warn!("MBTA_API_KEY not set, using the anonymous rate limit");
    }

    let mbta_config = MbtaConfig::new(config.api_key.clone())
        .with_base_url(&config.base_url)
        .with_max_concurrent(config.max_concurrent)
        .with_timeout(config.timeout_secs);
    let client = MbtaClient::new(mbta_config)?;
    let cached = CachedMbtaClient::new(client, &CacheConfig::default());

    let state = AppState::new(cached, config.plan.clone());

    // Refresh the live plan in the background; failures keep the previous one.
    let refresher = state.clone();
    let interval = config.refresh_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            // The snapshot records the error and refresh has already warned.
            if let Err(e) = refresher.refresh().await {
                debug!(error = %e, "background refresh failed");
            }
        }
    });

    let app = create_router(state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, refresh_secs = interval.as_secs(), "connection planner listening");
    info!("  GET  /health       - Health check");
    info!("  GET  /plan         - Current plan (?at=YYYY-MM-DDTHH:MM&expanded=<key>)");
    info!("  GET  /plan/status  - Snapshot freshness");

    axum::serve(listener, app).await?;
    Ok(())
}
