use crate::domain::errors::PriceError;
use crate::domain::ports::KeyValueStore;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Key-value store keeping one file per key under a directory.
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Use `dir`, creating it if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, PriceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| PriceError::storage(format!("Failed to create {}: {}", dir.display(), e)))?;
        info!("FileKeyValueStore: Using {:?}", dir);
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PriceError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && key != "."
            && key != "..";
        if !valid {
            return Err(PriceError::storage(format!("invalid storage key {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PriceError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PriceError::storage(format!("Failed to read {}: {}", path.display(), e))),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PriceError> {
        let path = self.path_for(key)?;

        // Atomic write: write to temp file then rename
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, value)
            .await
            .map_err(|e| PriceError::storage(format!("Failed to write {}: {}", temp_path.display(), e)))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| PriceError::storage(format!("Failed to rename {}: {}", temp_path.display(), e)))?;

        debug!("FileKeyValueStore: Saved {:?}", path);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PriceError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PriceError::storage(format!("Failed to remove {}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "tokenprices-{}-{}-{}",
            name,
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    #[tokio::test]
    async fn test_round_trip_and_remove() {
        let dir = scratch_dir("roundtrip");
        let store = FileKeyValueStore::open(&dir).await.unwrap();

        assert!(store.get("price_cache").await.unwrap().is_none());
        store.set("price_cache", "[]".to_string()).await.unwrap();
        assert_eq!(store.get("price_cache").await.unwrap().as_deref(), Some("[]"));

        store.remove("price_cache").await.unwrap();
        assert!(store.get("price_cache").await.unwrap().is_none());
        // Removing twice is fine
        store.remove("price_cache").await.unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let dir = scratch_dir("keys");
        let store = FileKeyValueStore::open(&dir).await.unwrap();

        let result = store.set("../escape", "x".to_string()).await;
        assert!(matches!(result, Err(PriceError::Storage { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
