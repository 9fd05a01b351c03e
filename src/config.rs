//! Configuration module for FleetDeck.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Dashboard configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Base URL of the fleet backend (default: "http://localhost:8000")
    pub base_url: String,
    /// Username for bearer-token authentication (optional)
    pub username: Option<String>,
    /// Password for bearer-token authentication (optional)
    pub password: Option<String>,
    /// Metrics poll interval in seconds (default: 2)
    pub metrics_interval_secs: u64,
    /// Container list poll interval in seconds (default: 2)
    pub fleet_interval_secs: u64,
    /// Log poll interval in seconds (default: 5)
    pub log_interval_secs: u64,
    /// Per-request HTTP timeout in seconds (default: 10)
    pub request_timeout_secs: u64,
    /// Container id to tail logs for from startup (optional)
    pub tail_container: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            username: None,
            password: None,
            metrics_interval_secs: 2,
            fleet_interval_secs: 2,
            log_interval_secs: 5,
            request_timeout_secs: 10,
            tail_container: None,
        }
    }
}

impl DashboardConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FLEETDECK_BASE_URL`: backend base URL (default: http://localhost:8000)
    /// - `FLEETDECK_USERNAME` / `FLEETDECK_PASSWORD`: credentials (optional)
    /// - `FLEETDECK_METRICS_INTERVAL`: metrics poll seconds (default: 2)
    /// - `FLEETDECK_FLEET_INTERVAL`: container list poll seconds (default: 2)
    /// - `FLEETDECK_LOG_INTERVAL`: log poll seconds (default: 5)
    /// - `FLEETDECK_REQUEST_TIMEOUT`: HTTP timeout seconds (default: 10)
    /// - `FLEETDECK_TAIL_CONTAINER`: container id to tail from startup
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(base_url) = env::var("FLEETDECK_BASE_URL") {
            cfg.base_url = base_url;
        }

        cfg.username = env::var("FLEETDECK_USERNAME").ok();
        cfg.password = env::var("FLEETDECK_PASSWORD").ok();
        cfg.tail_container = env::var("FLEETDECK_TAIL_CONTAINER").ok();

        if let Ok(secs) = env::var("FLEETDECK_METRICS_INTERVAL") {
            if let Ok(secs) = secs.parse() {
                cfg.metrics_interval_secs = secs;
            }
        }

        if let Ok(secs) = env::var("FLEETDECK_FLEET_INTERVAL") {
            if let Ok(secs) = secs.parse() {
                cfg.fleet_interval_secs = secs;
            }
        }

        if let Ok(secs) = env::var("FLEETDECK_LOG_INTERVAL") {
            if let Ok(secs) = secs.parse() {
                cfg.log_interval_secs = secs;
            }
        }

        if let Ok(secs) = env::var("FLEETDECK_REQUEST_TIMEOUT") {
            if let Ok(secs) = secs.parse() {
                cfg.request_timeout_secs = secs;
            }
        }

        cfg
    }
}
