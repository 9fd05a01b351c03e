//! Log window fetcher: tails one selected container's logs within a
//! bounded time window.
//!
//! Polling only runs while a container is selected; the poll loop is
//! torn down deterministically on deselection.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::broadcast;

use crate::api::LogSource;

/// Partial window update; `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowUpdate {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct LogState {
    selected: Option<String>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    lines: Vec<String>,
    loading: bool,
}

impl LogState {
    fn new() -> Self {
        Self {
            selected: None,
            // Default window: the last hour, live-tailed.
            since: Some(Utc::now() - ChronoDuration::hours(1)),
            until: None,
            lines: Vec::new(),
            loading: false,
        }
    }
}

/// Fetches log lines for at most one selected container.
pub struct LogWindowFetcher {
    source: Arc<dyn LogSource>,
    state: Arc<Mutex<LogState>>,
    stop: Mutex<Option<broadcast::Sender<()>>>,
    poll_interval: Duration,
}

impl LogWindowFetcher {
    pub fn new(source: Arc<dyn LogSource>, poll_interval: Duration) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(LogState::new())),
            stop: Mutex::new(None),
            poll_interval,
        }
    }

    /// Select a container to tail, or clear the selection.
    ///
    /// Selecting fetches immediately and then polls on the fixed
    /// interval; `None` stops the poll loop.
    pub fn select(&self, id: Option<String>) {
        self.stop_poller();
        let active = id.is_some();
        self.state.lock().unwrap().selected = id;
        if active {
            self.start_poller();
        }
    }

    /// Adjust the log window.
    ///
    /// `until` is capped at now; `since` is capped at the effective
    /// `until` (now when live-tailing), so `since <= until <= now`
    /// always holds. While a container is selected this re-fetches
    /// immediately and resets the poll timer.
    pub fn set_window(&self, update: WindowUpdate) {
        let now = Utc::now();
        let active = {
            let mut state = self.state.lock().unwrap();
            if let Some(until) = update.until {
                state.until = Some(until.min(now));
            }
            if let Some(since) = update.since {
                let effective_until = state.until.unwrap_or(now);
                state.since = Some(since.min(effective_until));
            }
            state.selected.is_some()
        };

        if active {
            self.stop_poller();
            self.start_poller();
        }
    }

    /// Fetch once for the current selection and window; no-op when
    /// nothing is selected.
    pub async fn refresh(&self) {
        poll_once(&self.source, &self.state).await;
    }

    /// Current log lines (or the synthetic error line after a failed
    /// fetch).
    pub fn lines(&self) -> Vec<String> {
        self.state.lock().unwrap().lines.clone()
    }

    pub fn selected(&self) -> Option<String> {
        self.state.lock().unwrap().selected.clone()
    }

    /// Current window as `(since, until)`.
    pub fn window(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let state = self.state.lock().unwrap();
        (state.since, state.until)
    }

    pub fn loading(&self) -> bool {
        self.state.lock().unwrap().loading
    }

    fn start_poller(&self) {
        let (tx, mut rx) = broadcast::channel(1);
        *self.stop.lock().unwrap() = Some(tx);

        let source = self.source.clone();
        let state = self.state.clone();
        let period = self.poll_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                // A stop mid-fetch drops the request; its response is
                // discarded rather than applied after teardown.
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = async {
                        interval.tick().await;
                        poll_once(&source, &state).await;
                    } => {}
                }
            }
        });
    }

    fn stop_poller(&self) {
        if let Some(tx) = self.stop.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

async fn poll_once(source: &Arc<dyn LogSource>, state: &Arc<Mutex<LogState>>) {
    let (id, since, until) = {
        let mut state = state.lock().unwrap();
        let Some(id) = state.selected.clone() else {
            return;
        };
        state.loading = true;
        (id, state.since, state.until)
    };

    let result = source.fetch_logs(&id, since, until).await;

    let mut state = state.lock().unwrap();
    state.loading = false;
    match result {
        Ok(lines) => state.lines = lines,
        // Transient failures self-heal on the next tick; surface a
        // single synthetic line meanwhile.
        Err(e) => state.lines = vec![format!("Error fetching logs: {e}")],
    }
}
