use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::{ApiClient, RequestOptions};
use crate::error::ApiError;

/// Paths every signed-in role may open.
pub const OPEN_TO_ALL_ROLES: [&str; 3] = ["/apps", "/apps/get-started", "/apps/support"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
        }
    }
}

/// Server-side authorization of one path for one bearer token.
#[async_trait]
pub trait AccessChecker: Send + Sync {
    async fn check(&self, token: &str, path: &str) -> Result<bool, ApiError>;
}

#[derive(Debug, Deserialize)]
struct AccessAnswer {
    #[serde(default)]
    access: bool,
}

/// Asks the backend's `check-access` endpoint, acting as the caller.
#[derive(Debug, Clone)]
pub struct HttpAccessChecker {
    client: ApiClient,
    endpoint: String,
}

impl HttpAccessChecker {
    pub fn new(client: ApiClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AccessChecker for HttpAccessChecker {
    async fn check(&self, token: &str, path: &str) -> Result<bool, ApiError> {
        let endpoint = format!("{}/{}", self.endpoint, encode_segment(path)?);
        let answer: AccessAnswer = self
            .client
            .for_token(token)
            .call(&endpoint, RequestOptions::get().param("action", Action::Read.as_str()))
            .await?
            .into_typed()?;
        Ok(answer.access)
    }
}

/// Percent-encode `path` as one URL segment, slashes included.
fn encode_segment(path: &str) -> Result<String, ApiError> {
    let mut url = Url::parse("http://localhost/")?;
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidRequest("cannot encode path segment".to_string()))?
        .clear()
        .push(path);
    Ok(url.path().trim_start_matches('/').to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub role: String,
    pub path: String,
    pub action: Action,
}

/// Everything the caller's roles grant, as listed by `get-my-permissions`.
///
/// A grant on a path covers its sub-paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub permissions: Vec<Permission>,
}

impl PermissionSet {
    pub async fn fetch(client: &ApiClient) -> Result<Self, ApiError> {
        client.get_json("/auth/get-my-permissions", &[]).await
    }

    pub fn allows(&self, path: &str, action: Action) -> bool {
        let path = normalize(path);
        if OPEN_TO_ALL_ROLES.contains(&path.as_str()) {
            return true;
        }
        self.permissions.iter().filter(|p| p.action == action).any(|p| {
            let granted = normalize(&p.path);
            path == granted || path.starts_with(&format!("{}/", granted.trim_end_matches('/')))
        })
    }

    pub fn can_read(&self, path: &str) -> bool {
        self.allows(path, Action::Read)
    }

    pub fn can_write(&self, path: &str) -> bool {
        self.allows(path, Action::Write)
    }

    /// Distinct granted paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.permissions.iter().map(|p| p.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }
}

/// Check several paths in one round trip.
pub async fn batch_check(client: &ApiClient, paths: &[String], action: Action) -> Result<BTreeMap<String, bool>, ApiError> {
    #[derive(Deserialize)]
    struct BatchAnswer {
        access: BTreeMap<String, bool>,
    }

    let options = RequestOptions::get()
        .param("paths", paths.join(","))
        .param("action", action.as_str());
    let answer: BatchAnswer = client.call("/auth/batch-check-access", options).await?.into_typed()?;
    Ok(answer.access)
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{}", trimmed)
}
