//! Backend collaborator contracts.
//!
//! The managers only ever talk to these traits; [`HttpApi`] is the
//! production implementation.

mod http;

pub use http::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{ContainerRecord, MetricsSnapshot, StateTransition};

/// API error types.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("authentication rejected")]
    AuthRejected,
}

/// Source of full metrics snapshots.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch_metrics(&self) -> Result<MetricsSnapshot, ApiError>;
}

/// Source of the container list plus the mutation commands.
#[async_trait]
pub trait FleetSource: Send + Sync {
    async fn fetch_containers(&self) -> Result<Vec<ContainerRecord>, ApiError>;

    async fn submit_transition(
        &self,
        id: &str,
        transition: StateTransition,
    ) -> Result<(), ApiError>;

    async fn delete_container(&self, id: &str) -> Result<(), ApiError>;
}

/// Source of log lines for one container within a time window.
///
/// `None` bounds mean unbounded on that side.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn fetch_logs(
        &self,
        id: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, ApiError>;
}
