//! Per-plugin config persistence.

use crate::error::ConfigStoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Reads and writes one JSON object per plugin.
#[async_trait]
pub trait ConfigStore: Send + Sync + std::fmt::Debug {
    /// Loads the stored object, or `None` when nothing was saved yet.
    async fn read_object(&self, name: &str) -> Result<Option<Value>, ConfigStoreError>;

    /// Replaces the stored object.
    async fn write_object(&self, name: &str, value: &Value) -> Result<(), ConfigStoreError>;
}

/// Stores each config as `<directory>/<name>.json`.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    directory: PathBuf,
}

impl JsonConfigStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file backing `name`.
    pub fn config_path(&self, name: &str) -> Result<PathBuf, ConfigStoreError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ConfigStoreError::InvalidName(name.to_string()));
        }
        Ok(self.directory.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    #[instrument(skip(self))]
    async fn read_object(&self, name: &str) -> Result<Option<Value>, ConfigStoreError> {
        let path = self.config_path(name)?;

        let contents = match tokio_fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(ConfigStoreError::FileRead(path, e)),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| ConfigStoreError::Deserialization(path, e))
    }

    #[instrument(skip(self, value))]
    async fn write_object(&self, name: &str, value: &Value) -> Result<(), ConfigStoreError> {
        let path = self.config_path(name)?;
        let temp_path = path.with_extension("json.tmp");

        tokio_fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| ConfigStoreError::DirectoryCreate(self.directory.clone(), e))?;

        let json = serde_json::to_string_pretty(value)
            .map_err(|e| ConfigStoreError::Serialization(name.to_string(), e))?;

        let mut file = tokio_fs::File::create(&temp_path)
            .await
            .map_err(|e| ConfigStoreError::FileWrite(temp_path.clone(), e))?;

        file.write_all(json.as_bytes())
            .await
            .map_err(|e| ConfigStoreError::FileWrite(temp_path.clone(), e))?;

        file.sync_all()
            .await
            .map_err(|e| ConfigStoreError::FileWrite(temp_path.clone(), e))?;

        // Atomic rename
        tokio_fs::rename(&temp_path, &path)
            .await
            .map_err(|e| ConfigStoreError::FileRename(temp_path, path.clone(), e))?;

        info!("Saved config: {}", path.display());
        Ok(())
    }
}
