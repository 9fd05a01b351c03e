//! FleetDeck - container fleet dashboard core.
//!
//! Polls container telemetry and fleet state from a backend, keeps
//! aligned chart data ready for rendering, and issues operator
//! commands against individual containers.

use fleetdeck::api::HttpApi;
use fleetdeck::config::DashboardConfig;
use fleetdeck::driver::RefreshDriver;
use fleetdeck::fleet::FleetStateManager;
use fleetdeck::logs::LogWindowFetcher;
use fleetdeck::metrics::MetricsAggregator;
use fleetdeck::model::ContainerStatus;

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("fleetdeck=info".parse()?))
        .init();

    // Load configuration
    let cfg = DashboardConfig::load();
    tracing::info!("Starting FleetDeck against {}", cfg.base_url);

    // Build the API client, authenticating when credentials are set
    let mut api = HttpApi::new(&cfg.base_url, Duration::from_secs(cfg.request_timeout_secs))?;
    if let (Some(username), Some(password)) = (&cfg.username, &cfg.password) {
        match api.authenticate(username, password).await {
            Ok(token) => {
                api.set_token(token);
                tracing::info!("Authenticated as {username}");
            }
            Err(e) => tracing::warn!("Authentication failed, continuing without a token: {e}"),
        }
    }
    let api = Arc::new(api);

    // Create the sync managers
    let metrics = Arc::new(MetricsAggregator::new(api.clone()));
    let fleet = Arc::new(FleetStateManager::new(api.clone()));
    let log_window = Arc::new(LogWindowFetcher::new(
        api.clone(),
        Duration::from_secs(cfg.log_interval_secs),
    ));

    // Start polling
    let driver = RefreshDriver::new(
        metrics.clone(),
        fleet.clone(),
        Duration::from_secs(cfg.metrics_interval_secs),
        Duration::from_secs(cfg.fleet_interval_secs),
    );
    driver.start();

    if let Some(id) = &cfg.tail_container {
        tracing::info!("Tailing logs for {id}");
        log_window.select(Some(id.clone()));
    }

    spawn_status_report(metrics, fleet, log_window.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    log_window.select(None);
    driver.shutdown();

    Ok(())
}

/// Periodic one-line summary of what the dashboard is seeing.
fn spawn_status_report(
    metrics: Arc<MetricsAggregator>,
    fleet: Arc<FleetStateManager>,
    log_window: Arc<LogWindowFetcher>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let containers = fleet.containers();
            let running = containers
                .iter()
                .filter(|c| c.status == ContainerStatus::Running)
                .count();
            let stale = if fleet.update_failed() { " [stale]" } else { "" };
            let tail = match log_window.selected() {
                Some(id) => format!(", tailing {} ({} lines)", id, log_window.lines().len()),
                None => String::new(),
            };

            match metrics.aligned_data() {
                Ok(matrix) => tracing::info!(
                    "{} containers ({} running){}, chart {} columns x {} rows{}",
                    containers.len(),
                    running,
                    stale,
                    matrix.columns.len(),
                    matrix.rows.len(),
                    tail
                ),
                Err(e) => tracing::error!("Chart alignment failed: {e}"),
            }
        }
    });
}
