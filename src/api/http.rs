//! HTTP implementation of the collaborator contracts.
//!
//! Thin wrapper over `reqwest` that knows the backend's routes and its
//! relative-seconds log window encoding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::{ApiError, FleetSource, LogSource, MetricsSource};
use crate::model::{ContainerRecord, MetricsSnapshot, StateTransition};

/// HTTP client for the fleet backend.
pub struct HttpApi {
    base: String,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

impl HttpApi {
    /// Create a client for the given base URL with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            token: None,
            client,
        })
    }

    /// Attach a bearer token to all subsequent requests.
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Exchange credentials for a bearer token.
    ///
    /// The backend signals rejection with an empty token string.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let url = self.url("api/ldap/authenticate");
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;

        let response = check_status(response)?;
        let body: TokenResponse = response.json().await?;
        if body.token.is_empty() {
            return Err(ApiError::AuthRejected);
        }
        Ok(body.token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.authorized(self.client.get(url))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl MetricsSource for HttpApi {
    async fn fetch_metrics(&self) -> Result<MetricsSnapshot, ApiError> {
        let url = self.url("api/performance");
        let response = check_status(self.get(&url).send().await?)?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl FleetSource for HttpApi {
    async fn fetch_containers(&self) -> Result<Vec<ContainerRecord>, ApiError> {
        let url = self.url("api/containers");
        let response = check_status(self.get(&url).send().await?)?;
        Ok(response.json().await?)
    }

    async fn submit_transition(
        &self,
        id: &str,
        transition: StateTransition,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("api/containers/{}/{}", id, transition.as_str()));
        let response = self.authorized(self.client.post(&url)).send().await?;
        check_status(response)?;
        Ok(())
    }

    async fn delete_container(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("api/containers/{}", id));
        let response = self.authorized(self.client.delete(&url)).send().await?;
        check_status(response)?;
        Ok(())
    }
}

#[async_trait]
impl LogSource for HttpApi {
    async fn fetch_logs(
        &self,
        id: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, ApiError> {
        let url = self.url(&format!("api/containers/{}/logs", id));
        let now = Utc::now();

        // The backend takes window bounds as whole seconds before now.
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(since) = since {
            query.push(("since", seconds_before(now, since).to_string()));
        }
        if let Some(until) = until {
            query.push(("until", seconds_before(now, until).to_string()));
        }

        let response = check_status(self.get(&url).query(&query).send().await?)?;
        Ok(response.json().await?)
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            status,
            url: response.url().to_string(),
        })
    }
}

/// Whole seconds between `instant` and `now`, floored at zero.
fn seconds_before(now: DateTime<Utc>, instant: DateTime<Utc>) -> i64 {
    (now - instant).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio_test::assert_err;

    #[test]
    fn test_base_url_trailing_slash() {
        let api = HttpApi::new("http://example.com/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.url("api/containers"), "http://example.com/api/containers");
    }

    #[test]
    fn test_seconds_before() {
        let now = Utc.with_ymd_and_hms(2021, 5, 29, 16, 10, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2021, 5, 29, 15, 10, 0).unwrap();
        assert_eq!(seconds_before(now, earlier), 3600);

        // An instant past now never produces a negative window bound.
        let later = Utc.with_ymd_and_hms(2021, 5, 29, 16, 11, 0).unwrap();
        assert_eq!(seconds_before(now, later), 0);
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        let api = HttpApi::new("http://256.256.256.256", Duration::from_millis(100)).unwrap();
        assert_err!(api.fetch_containers().await);
    }
}
