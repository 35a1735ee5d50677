use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("baseline I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("baseline serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The two independently persisted baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineKey {
    Markets,
    Notices,
}

impl BaselineKey {
    pub fn file_name(self) -> &'static str {
        match self {
            BaselineKey::Markets => "upbit_markets_cache.json",
            BaselineKey::Notices => "upbit_notices_cache.json",
        }
    }
}

/// `{"markets": [...]}`; a set, so it always serializes sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownMarkets {
    #[serde(default)]
    pub markets: BTreeSet<String>,
}

/// `{"ids": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownNoticeIds {
    #[serde(default)]
    pub ids: BTreeSet<String>,
}

/// JSON documents on disk, one file per [`BaselineKey`].
#[derive(Debug, Clone)]
pub struct BaselineStore {
    dir: PathBuf,
}

impl BaselineStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, key: BaselineKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub async fn exists(&self, key: BaselineKey) -> bool {
        tokio::fs::try_exists(self.path(key)).await.unwrap_or(false)
    }

    /// Returns `default` when the document is missing, unreadable or corrupt.
    pub async fn load<T: DeserializeOwned>(&self, key: BaselineKey, default: T) -> T {
        let path = self.path(key);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return default,
            Err(e) => {
                tracing::warn!("Cannot read baseline {}: {}", path.display(), e);
                return default;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Corrupt baseline {}, using default: {}", path.display(), e);
                default
            }
        }
    }

    /// Writes via a temp file and rename so a crash never leaves a torn document.
    pub async fn save<T: Serialize>(&self, key: BaselineKey, value: &T) -> Result<(), StoreError> {
        let path = self.path(key);
        let json = serde_json::to_string_pretty(value)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let temp_path = path.with_extension("json.tmp");
        if let Err(e) = write_synced(&temp_path, json.as_bytes()).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(io_error(&temp_path, e));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(io_error(&path, e));
        }

        Ok(())
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}
