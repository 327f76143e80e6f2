//! Local record store: one JSON file on disk.
//!
//! A missing or unreadable document degrades to an empty collection so the
//! application stays usable; writes always replace the whole file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{RecordStore, StoreError, VersionToken};
use crate::models::Portfolio;

/// File name of the stored collection under the application data dir.
pub const STORAGE_FILE: &str = "portfolios.json";

pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform data directory, creating it if needed.
    pub fn default_location() -> Result<Self, StoreError> {
        let dir = dirs::data_dir()
            .ok_or_else(|| {
                StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no platform data directory available",
                ))
            })?
            .join("folio-tracker");
        std::fs::create_dir_all(&dir)?;
        Ok(Self::new(dir.join(STORAGE_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn fetch(&self) -> Result<(Vec<Portfolio>, Option<VersionToken>), StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok((Vec::new(), None));
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(portfolios) => Ok((portfolios, None)),
            Err(e) => {
                // A corrupt document must not lock the user out; start over
                // from an empty collection.
                log::warn!(
                    "could not parse {}: {}; starting with an empty collection",
                    self.path.display(),
                    e
                );
                Ok((Vec::new(), None))
            }
        }
    }

    async fn replace(
        &self,
        portfolios: &[Portfolio],
        _token: Option<&VersionToken>,
    ) -> Result<Option<VersionToken>, StoreError> {
        let json = serde_json::to_string_pretty(portfolios)?;
        tokio::fs::write(&self.path, json).await?;
        log::debug!(
            "wrote {} portfolios to {}",
            portfolios.len(),
            self.path.display()
        );
        Ok(None)
    }
}
