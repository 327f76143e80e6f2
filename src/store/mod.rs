//! Record store for the portfolio collection.
//!
//! The whole collection is one JSON document, replaced atomically on every
//! mutation. Two backends implement the same contract:
//! - a local JSON file (default)
//! - a versioned file in a hosted repository via the GitHub contents API
//!
//! The remote backend returns an opaque version token with each fetch and
//! requires it back on replace; a stale token is rejected with a conflict.
//! There is no automatic retry or merge anywhere, the caller decides.

pub mod local;
pub mod remote;

pub use local::LocalStore;
pub use remote::{RemoteConfig, RemoteStore};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Portfolio;

/// Opaque optimistic-concurrency token (the stored document's content hash
/// on the remote backend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Required settings absent from the environment; lists every missing
    /// item so one round of fixes is enough.
    #[error("missing configuration: {}", .missing.join(", "))]
    Config { missing: Vec<String> },

    /// The backend rejected the credential.
    #[error("permission denied by the storage backend: {0}")]
    Permission(String),

    /// The document changed since it was fetched. Reload and retry.
    #[error("version conflict: the stored document was modified since it was last fetched")]
    Conflict,

    /// The backend answered with something the client cannot use.
    #[error("unexpected response from the storage backend ({status}): {body}")]
    Backend { status: u16, body: String },

    /// The stored document content could not be decoded.
    #[error("malformed document content: {0}")]
    Malformed(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persistence contract for the portfolio collection.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load the full collection with the version token it was read at.
    /// A backend with no document yet returns an empty collection and no
    /// token (first-write case).
    async fn fetch(&self) -> Result<(Vec<Portfolio>, Option<VersionToken>), StoreError>;

    /// Replace the full collection. `token` must be the value returned by
    /// the preceding `fetch`; backends that version their documents answer
    /// `StoreError::Conflict` when it is stale. Returns the new token, if
    /// the backend has one.
    async fn replace(
        &self,
        portfolios: &[Portfolio],
        token: Option<&VersionToken>,
    ) -> Result<Option<VersionToken>, StoreError>;
}
