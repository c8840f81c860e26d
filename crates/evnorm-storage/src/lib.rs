//! Filesystem artifact store for converted activities and run reports.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "evnorm-storage";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("artifact not found: {path}")]
    NotFound { path: String },
    #[error("storage temporarily unavailable at {path}")]
    Unavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid artifact key `{0}`")]
    InvalidKey(String),
    #[error("artifact (de)serialization failed")]
    Serialization(#[from] serde_json::Error),
    #[error("io error at {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Classifies an io error by kind at the point it happened.
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        let path = path.display().to_string();
        match source.kind() {
            ErrorKind::NotFound => Self::NotFound { path },
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => Self::Unavailable { path, source },
            _ => Self::Io { path, source },
        }
    }

    pub fn disposition(&self) -> RetryDisposition {
        match self {
            Self::Unavailable { .. } => RetryDisposition::Retryable,
            _ => RetryDisposition::NonRetryable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of retries.
pub async fn retry_with_backoff<T, F, Fut>(policy: &BackoffPolicy, mut op: F) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.disposition() == RetryDisposition::Retryable && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(error = %err, attempt, ?delay, "retrying storage operation");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub content_hash: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub byte_size: usize,
    /// The file already held identical bytes, so nothing was written.
    pub unchanged: bool,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    fn json_path(prefix: &str, key: &str) -> Result<PathBuf, StorageError> {
        for part in [prefix, key] {
            if part.is_empty() || part.contains(['/', '\\']) || part.starts_with('.') {
                return Err(StorageError::InvalidKey(part.to_string()));
            }
        }
        Ok(PathBuf::from(prefix).join(format!("{key}.json")))
    }

    pub async fn put_json<T: Serialize>(&self, prefix: &str, key: &str, value: &T) -> Result<StoredArtifact, StorageError> {
        let relative = Self::json_path(prefix, key)?;
        let bytes = serde_json::to_vec_pretty(value)?;
        self.put_bytes(&relative, &bytes).await
    }

    pub async fn put_json_with_retry<T: Serialize>(
        &self,
        prefix: &str,
        key: &str,
        value: &T,
        policy: &BackoffPolicy,
    ) -> Result<StoredArtifact, StorageError> {
        retry_with_backoff(policy, || self.put_json(prefix, key, value)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, prefix: &str, key: &str) -> Result<T, StorageError> {
        let path = self.root.join(Self::json_path(prefix, key)?);
        let bytes = fs::read(&path).await.map_err(|err| StorageError::from_io(&path, err))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn exists(&self, prefix: &str, key: &str) -> Result<bool, StorageError> {
        let path = self.root.join(Self::json_path(prefix, key)?);
        fs::try_exists(&path).await.map_err(|err| StorageError::from_io(&path, err))
    }

    /// Keys stored under `prefix`, sorted. A missing prefix lists as empty.
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.root.join(prefix);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::from_io(&dir, err)),
        };
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|err| StorageError::from_io(&dir, err))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if let Some(stem) = name.strip_suffix(".json") {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Writes `bytes` at `relative` through a temp file and an atomic rename.
    pub async fn put_bytes(&self, relative: &Path, bytes: &[u8]) -> Result<StoredArtifact, StorageError> {
        let span = info_span!("artifact_write", path = %relative.display());
        self.write_atomic(relative, bytes).instrument(span).await
    }

    async fn write_atomic(&self, relative: &Path, bytes: &[u8]) -> Result<StoredArtifact, StorageError> {
        let content_hash = Self::sha256_hex(bytes);
        let absolute_path = self.root.join(relative);
        let parent = absolute_path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(relative.display().to_string()))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|err| StorageError::from_io(parent, err))?;

        let mut artifact = StoredArtifact {
            content_hash,
            relative_path: relative.to_path_buf(),
            absolute_path: absolute_path.clone(),
            byte_size: bytes.len(),
            unchanged: false,
        };
        if let Ok(existing) = fs::read(&absolute_path).await {
            if Self::sha256_hex(&existing) == artifact.content_hash {
                debug!("artifact unchanged");
                artifact.unchanged = true;
                return Ok(artifact);
            }
        }

        let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .map_err(|err| StorageError::from_io(&temp_path, err))?;
        file.write_all(bytes)
            .await
            .map_err(|err| StorageError::from_io(&temp_path, err))?;
        file.flush().await.map_err(|err| StorageError::from_io(&temp_path, err))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &absolute_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::from_io(&absolute_path, err));
        }
        Ok(artifact)
    }
}
