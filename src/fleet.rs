//! Fleet state manager: the last observed container list plus the
//! in-flight mutation guard.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::api::FleetSource;
use crate::model::{ContainerRecord, StateTransition};

#[derive(Debug, Default)]
struct FleetState {
    containers: Vec<ContainerRecord>,
    update_failed: bool,
    in_flight: HashSet<String>,
    last_error: Option<String>,
}

/// Polls the container list and issues operator mutations.
///
/// At most one mutation per container may be in flight; further
/// requests for the same id no-op until the first completes.
pub struct FleetStateManager {
    source: Arc<dyn FleetSource>,
    state: Mutex<FleetState>,
}

impl FleetStateManager {
    pub fn new(source: Arc<dyn FleetSource>) -> Self {
        Self {
            source,
            state: Mutex::new(FleetState::default()),
        }
    }

    /// Fetch the container list and replace the stored one wholesale.
    ///
    /// On failure the prior list stays available and `update_failed` is
    /// raised; stale data beats blank data.
    pub async fn refresh(&self) {
        match self.source.fetch_containers().await {
            Ok(containers) => {
                let mut state = self.state.lock().unwrap();
                state.containers = containers;
                state.update_failed = false;
            }
            Err(e) => {
                tracing::warn!("Container list refresh failed, keeping previous list: {e}");
                self.state.lock().unwrap().update_failed = true;
            }
        }
    }

    /// Issue a state transition for one container.
    ///
    /// Returns `false` without submitting anything when a mutation for
    /// the id is already in flight. On success the list is refreshed;
    /// on failure the error is recorded and the id unlocked for retry.
    pub async fn change_state(&self, id: &str, transition: StateTransition) -> bool {
        if !self.lock_entity(id) {
            return false;
        }

        let result = self.source.submit_transition(id, transition).await;
        let succeeded = result.is_ok();
        self.unlock_entity(id, result.err().map(|e| format!("{transition} {id}: {e}")));

        if succeeded {
            self.refresh().await;
        }
        true
    }

    /// Delete one container, with the same in-flight discipline as
    /// [`FleetStateManager::change_state`].
    pub async fn delete(&self, id: &str) -> bool {
        if !self.lock_entity(id) {
            return false;
        }

        let result = self.source.delete_container(id).await;
        let succeeded = result.is_ok();
        self.unlock_entity(id, result.err().map(|e| format!("delete {id}: {e}")));

        if succeeded {
            self.refresh().await;
        }
        true
    }

    /// Check-and-insert under a single lock acquisition, so two racing
    /// triggers cannot both pass the not-in-flight check.
    fn lock_entity(&self, id: &str) -> bool {
        self.state.lock().unwrap().in_flight.insert(id.to_string())
    }

    fn unlock_entity(&self, id: &str, error: Option<String>) {
        let mut state = self.state.lock().unwrap();
        state.in_flight.remove(id);
        if let Some(message) = error {
            tracing::error!("Mutation failed: {message}");
            state.last_error = Some(message);
        }
    }

    /// Last observed container list.
    pub fn containers(&self) -> Vec<ContainerRecord> {
        self.state.lock().unwrap().containers.clone()
    }

    /// Whether the most recent list refresh failed.
    pub fn update_failed(&self) -> bool {
        self.state.lock().unwrap().update_failed
    }

    /// Whether a mutation for the id is awaiting its response.
    pub fn is_in_flight(&self, id: &str) -> bool {
        self.state.lock().unwrap().in_flight.contains(id)
    }

    /// Most recent mutation error message, if any.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, FleetSource};
    use crate::model::ContainerStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn record(id: &str, status: ContainerStatus) -> ContainerRecord {
        ContainerRecord {
            id: id.to_string(),
            id_short: id.chars().take(4).collect(),
            name: format!("container-{id}"),
            status,
            start_time: 1622304000,
            ports: Default::default(),
        }
    }

    fn mutation_failed() -> ApiError {
        ApiError::Status {
            status: reqwest::StatusCode::PRECONDITION_FAILED,
            url: "http://test/api/containers/x/stop".to_string(),
        }
    }

    /// Mock fleet backend: transitions wait on a gate when one is set,
    /// deletes actually remove from the served list, and failures can
    /// be switched on mid-test.
    struct MockFleet {
        containers: Mutex<Vec<ContainerRecord>>,
        list_fetches: AtomicUsize,
        submissions: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail_mutations: AtomicBool,
        fail_lists: AtomicBool,
    }

    impl MockFleet {
        fn new(containers: Vec<ContainerRecord>) -> Self {
            Self {
                containers: Mutex::new(containers),
                list_fetches: AtomicUsize::new(0),
                submissions: AtomicUsize::new(0),
                gate: None,
                fail_mutations: AtomicBool::new(false),
                fail_lists: AtomicBool::new(false),
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl FleetSource for MockFleet {
        async fn fetch_containers(&self) -> Result<Vec<ContainerRecord>, ApiError> {
            self.list_fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_lists.load(Ordering::SeqCst) {
                return Err(mutation_failed());
            }
            Ok(self.containers.lock().unwrap().clone())
        }

        async fn submit_transition(
            &self,
            _id: &str,
            _transition: StateTransition,
        ) -> Result<(), ApiError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail_mutations.load(Ordering::SeqCst) {
                return Err(mutation_failed());
            }
            Ok(())
        }

        async fn delete_container(&self, id: &str) -> Result<(), ApiError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            if self.fail_mutations.load(Ordering::SeqCst) {
                return Err(mutation_failed());
            }
            self.containers.lock().unwrap().retain(|c| c.id != id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_list() {
        let source = Arc::new(MockFleet::new(vec![record("a", ContainerStatus::Running)]));
        let manager = FleetStateManager::new(source);

        manager.refresh().await;
        let containers = manager.containers();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, "a");
        assert!(!manager.update_failed());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_stale_list() {
        let source = Arc::new(MockFleet::new(vec![record("a", ContainerStatus::Running)]));
        let manager = FleetStateManager::new(source.clone());
        manager.refresh().await;

        source.fail_lists.store(true, Ordering::SeqCst);
        manager.refresh().await;

        // Stale-but-available beats empty.
        assert!(manager.update_failed());
        assert_eq!(manager.containers().len(), 1);

        source.fail_lists.store(false, Ordering::SeqCst);
        manager.refresh().await;
        assert!(!manager.update_failed());
    }

    #[tokio::test]
    async fn test_duplicate_change_state_submits_once() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(
            MockFleet::new(vec![record("a", ContainerStatus::Running)]).gated(gate.clone()),
        );
        let manager = Arc::new(FleetStateManager::new(source.clone()));

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.change_state("a", StateTransition::Stop).await })
        };

        // Let the first call reach its await on the gate.
        while !manager.is_in_flight("a") {
            tokio::task::yield_now().await;
        }

        // Second trigger while the first is unresolved: silent no-op.
        assert!(!manager.change_state("a", StateTransition::Stop).await);
        assert_eq!(source.submissions.load(Ordering::SeqCst), 1);

        gate.notify_one();
        assert!(first.await.unwrap());
        assert_eq!(source.submissions.load(Ordering::SeqCst), 1);
        assert!(!manager.is_in_flight("a"));
    }

    #[tokio::test]
    async fn test_change_state_success_refreshes() {
        let source = Arc::new(MockFleet::new(vec![record("a", ContainerStatus::Running)]));
        let manager = FleetStateManager::new(source.clone());

        assert!(manager.change_state("a", StateTransition::Stop).await);
        assert_eq!(source.list_fetches.load(Ordering::SeqCst), 1);
        assert!(manager.last_error().is_none());
    }

    #[tokio::test]
    async fn test_mutation_failure_records_error_and_unlocks() {
        let source = Arc::new(MockFleet::new(vec![record("x", ContainerStatus::Running)]));
        source.fail_mutations.store(true, Ordering::SeqCst);
        let manager = FleetStateManager::new(source.clone());

        assert!(manager.change_state("x", StateTransition::Stop).await);

        let error = manager.last_error().unwrap();
        assert!(error.contains("stop x"));
        assert!(!manager.is_in_flight("x"));
        // No refresh after a failed mutation.
        assert_eq!(source.list_fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_container_and_unlocks() {
        let source = Arc::new(MockFleet::new(vec![
            record("x", ContainerStatus::Stopped),
            record("y", ContainerStatus::Running),
        ]));
        let manager = FleetStateManager::new(source.clone());
        manager.refresh().await;

        assert!(manager.delete("x").await);

        let containers = manager.containers();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, "y");
        assert!(!manager.is_in_flight("x"));
    }
}
