//! Remote record store backed by the GitHub contents API.
//!
//! The portfolio collection lives as a single JSON file inside a
//! repository. The file's blob SHA doubles as the optimistic-concurrency
//! token: every fetch returns it, every replace sends it back, and the API
//! rejects a write whose SHA no longer matches the stored file. Conflict
//! and permission failures map to distinct error variants so the caller
//! can tell "reload and retry" apart from "fix the credential".
//!
//! API documentation: https://docs.github.com/en/rest/repos/contents

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{RecordStore, StoreError, VersionToken};
use crate::models::Portfolio;

pub const ENV_REPO: &str = "FOLIO_REMOTE_REPO";
pub const ENV_BRANCH: &str = "FOLIO_REMOTE_BRANCH";
pub const ENV_PATH: &str = "FOLIO_REMOTE_PATH";
pub const ENV_TOKEN: &str = "FOLIO_REMOTE_TOKEN";
pub const ENV_API_BASE: &str = "FOLIO_REMOTE_API_BASE";

const DEFAULT_API_BASE: &str = "https://api.github.com";
const COMMIT_MESSAGE: &str = "Update portfolio data";
const USER_AGENT: &str = concat!("folio-tracker/", env!("CARGO_PKG_VERSION"));

/// Connection settings for the remote store.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Repository in `owner/name` form.
    pub repo: String,
    /// Branch the document is committed to.
    pub branch: String,
    /// Path of the JSON document inside the repository.
    pub path: String,
    /// Access token with contents read/write permission.
    pub token: String,
    /// API base URL; overridable for self-hosted installations and tests.
    pub api_base: String,
}

impl RemoteConfig {
    /// Read the configuration from the environment, validating eagerly.
    /// The error lists every absent variable, not just the first one.
    pub fn from_env() -> Result<Self, StoreError> {
        let mut missing = Vec::new();

        let repo = required(ENV_REPO, &mut missing);
        let branch = required(ENV_BRANCH, &mut missing);
        let path = required(ENV_PATH, &mut missing);
        let token = required(ENV_TOKEN, &mut missing);

        if !missing.is_empty() {
            return Err(StoreError::Config { missing });
        }

        let api_base = std::env::var(ENV_API_BASE)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            repo,
            branch,
            path,
            token,
            api_base,
        })
    }
}

fn required(name: &str, missing: &mut Vec<String>) -> String {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            missing.push(name.to_string());
            String::new()
        }
    }
}

/// Shape of a contents GET response.
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

/// Body of a contents PUT request.
#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Shape of a contents PUT response; only the new blob SHA matters here.
#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutResponseContent,
}

#[derive(Debug, Deserialize)]
struct PutResponseContent {
    sha: String,
}

pub struct RemoteStore {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { config, client })
    }

    /// URL of the stored document. Path segments are encoded individually
    /// so the `/` separators survive.
    fn contents_url(&self) -> String {
        let encoded_path: Vec<String> = self
            .config
            .path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_base,
            self.config.repo,
            encoded_path.join("/")
        )
    }
}

#[async_trait]
impl RecordStore for RemoteStore {
    async fn fetch(&self) -> Result<(Vec<Portfolio>, Option<VersionToken>), StoreError> {
        let url = self.contents_url();
        log::debug!("fetching portfolio document from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("ref", self.config.branch.as_str())])
            .bearer_auth(&self.config.token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // No document yet: an empty collection waiting for its first write.
            return Ok((Vec::new(), None));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Permission(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let contents: ContentsResponse = response.json().await?;

        // The API wraps base64 content in newlines.
        let compact: String = contents
            .content
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = BASE64
            .decode(compact)
            .map_err(|e| StoreError::Malformed(format!("invalid base64 content: {}", e)))?;

        let portfolios = serde_json::from_slice(&bytes)?;
        Ok((portfolios, Some(VersionToken::new(contents.sha))))
    }

    async fn replace(
        &self,
        portfolios: &[Portfolio],
        token: Option<&VersionToken>,
    ) -> Result<Option<VersionToken>, StoreError> {
        let json = serde_json::to_string_pretty(portfolios)?;
        let body = PutRequest {
            message: COMMIT_MESSAGE,
            content: BASE64.encode(json),
            branch: &self.config.branch,
            sha: token.map(VersionToken::as_str),
        };

        let url = self.contents_url();
        log::debug!("replacing portfolio document at {}", url);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        // The API answers 409 for a stale SHA and 422 when the SHA is
        // missing for an existing file; both mean the same to a caller.
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(StoreError::Conflict);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Permission(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let put: PutResponse = response.json().await?;
        Ok(Some(VersionToken::new(put.content.sha)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment mutations must not interleave across tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for name in [ENV_REPO, ENV_BRANCH, ENV_PATH, ENV_TOKEN, ENV_API_BASE] {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn from_env_lists_every_missing_variable() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var(ENV_BRANCH, "main");

        let err = RemoteConfig::from_env().unwrap_err();
        match err {
            StoreError::Config { missing } => {
                assert_eq!(missing, vec![ENV_REPO, ENV_PATH, ENV_TOKEN]);
            }
            other => panic!("expected Config error, got {:?}", other),
        }
        clear_env();
    }

    #[test]
    fn from_env_defaults_the_api_base() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var(ENV_REPO, "user/portfolios");
        std::env::set_var(ENV_BRANCH, "main");
        std::env::set_var(ENV_PATH, "data/portfolios.json");
        std::env::set_var(ENV_TOKEN, "secret");

        let config = RemoteConfig::from_env().unwrap();
        assert_eq!(config.repo, "user/portfolios");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        clear_env();
    }

    #[test]
    fn blank_values_count_as_missing() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var(ENV_REPO, "  ");
        std::env::set_var(ENV_BRANCH, "main");
        std::env::set_var(ENV_PATH, "p.json");
        std::env::set_var(ENV_TOKEN, "secret");

        let err = RemoteConfig::from_env().unwrap_err();
        match err {
            StoreError::Config { missing } => assert_eq!(missing, vec![ENV_REPO]),
            other => panic!("expected Config error, got {:?}", other),
        }
        clear_env();
    }

    #[test]
    fn contents_url_encodes_path_segments() {
        let store = RemoteStore::new(RemoteConfig {
            repo: "user/portfolios".to_string(),
            branch: "main".to_string(),
            path: "data/my portfolios.json".to_string(),
            token: "secret".to_string(),
            api_base: "https://api.github.com".to_string(),
        })
        .unwrap();

        assert_eq!(
            store.contents_url(),
            "https://api.github.com/repos/user/portfolios/contents/data/my%20portfolios.json"
        );
    }
}
