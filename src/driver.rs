//! Refresh driver: owns the periodic refresh timers for the metrics
//! and fleet managers.
//!
//! The managers stay passive; this is the only place their polling
//! cadence lives. Log polling is selection-driven and owned by the
//! log fetcher itself.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::fleet::FleetStateManager;
use crate::metrics::MetricsAggregator;

/// Starts and stops the periodic refresh loops.
pub struct RefreshDriver {
    metrics: Arc<MetricsAggregator>,
    fleet: Arc<FleetStateManager>,
    metrics_period: Duration,
    fleet_period: Duration,
    stop: Mutex<Option<broadcast::Sender<()>>>,
}

impl RefreshDriver {
    pub fn new(
        metrics: Arc<MetricsAggregator>,
        fleet: Arc<FleetStateManager>,
        metrics_period: Duration,
        fleet_period: Duration,
    ) -> Self {
        Self {
            metrics,
            fleet,
            metrics_period,
            fleet_period,
            stop: Mutex::new(None),
        }
    }

    /// Spawn both refresh loops: an immediate first refresh, then fixed
    /// intervals. A stopped driver can be started again.
    pub fn start(&self) {
        let (tx, _) = broadcast::channel(1);
        *self.stop.lock().unwrap() = Some(tx.clone());

        let metrics = self.metrics.clone();
        let mut metrics_rx = tx.subscribe();
        let metrics_period = self.metrics_period;
        tokio::spawn(async move {
            startup_jitter().await;
            let mut interval = tokio::time::interval(metrics_period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = metrics_rx.recv() => break,
                    _ = async {
                        interval.tick().await;
                        metrics.refresh().await;
                    } => {}
                }
            }
            tracing::debug!("Metrics refresh loop stopped");
        });

        let fleet = self.fleet.clone();
        let mut fleet_rx = tx.subscribe();
        let fleet_period = self.fleet_period;
        tokio::spawn(async move {
            startup_jitter().await;
            let mut interval = tokio::time::interval(fleet_period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = fleet_rx.recv() => break,
                    _ = async {
                        interval.tick().await;
                        fleet.refresh().await;
                    } => {}
                }
            }
            tracing::debug!("Fleet refresh loop stopped");
        });

        tracing::info!(
            "Refresh loops started (metrics every {:?}, fleet every {:?})",
            self.metrics_period,
            self.fleet_period
        );
    }

    /// Tear both loops down. A refresh in flight is dropped, its
    /// response never applied.
    pub fn shutdown(&self) {
        if let Some(tx) = self.stop.lock().unwrap().take() {
            let _ = tx.send(());
            tracing::info!("Refresh loops stopping");
        }
    }
}

/// Small random delay so independent pollers do not line up against
/// the backend.
async fn startup_jitter() {
    let jitter = rand::random::<u64>() % 250;
    tokio::time::sleep(Duration::from_millis(jitter)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, FleetSource, MetricsSource};
    use crate::model::{ContainerRecord, MetricsSnapshot, StateTransition};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        metrics_fetches: AtomicUsize,
        list_fetches: AtomicUsize,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                metrics_fetches: AtomicUsize::new(0),
                list_fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MetricsSource for CountingSource {
        async fn fetch_metrics(&self) -> Result<MetricsSnapshot, ApiError> {
            self.metrics_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(MetricsSnapshot::new())
        }
    }

    #[async_trait]
    impl FleetSource for CountingSource {
        async fn fetch_containers(&self) -> Result<Vec<ContainerRecord>, ApiError> {
            self.list_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn submit_transition(
            &self,
            _id: &str,
            _transition: StateTransition,
        ) -> Result<(), ApiError> {
            Ok(())
        }

        async fn delete_container(&self, _id: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_polls_and_shutdown_stops() {
        let source = CountingSource::new();
        let metrics = Arc::new(MetricsAggregator::new(source.clone()));
        let fleet = Arc::new(FleetStateManager::new(source.clone()));
        let driver = RefreshDriver::new(
            metrics,
            fleet,
            Duration::from_secs(2),
            Duration::from_secs(2),
        );

        driver.start();

        // Past the startup jitter: both loops have done their first,
        // immediate refresh.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(source.metrics_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(source.list_fetches.load(Ordering::SeqCst), 1);

        // One interval later: exactly one more refresh each.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(source.metrics_fetches.load(Ordering::SeqCst), 2);
        assert_eq!(source.list_fetches.load(Ordering::SeqCst), 2);

        driver.shutdown();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(source.metrics_fetches.load(Ordering::SeqCst), 2);
        assert_eq!(source.list_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_can_restart_after_shutdown() {
        let source = CountingSource::new();
        let metrics = Arc::new(MetricsAggregator::new(source.clone()));
        let fleet = Arc::new(FleetStateManager::new(source.clone()));
        let driver = RefreshDriver::new(
            metrics,
            fleet,
            Duration::from_secs(2),
            Duration::from_secs(2),
        );

        driver.start();
        tokio::time::sleep(Duration::from_millis(500)).await;
        driver.shutdown();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let after_stop = source.metrics_fetches.load(Ordering::SeqCst);

        driver.start();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            source.metrics_fetches.load(Ordering::SeqCst),
            after_stop + 1
        );

        driver.shutdown();
    }
}
