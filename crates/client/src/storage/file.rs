//! File-backed profile store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{ProfileStore, StorageError};

/// Profile store keeping one file per key in a directory.
///
/// Writes go to a temporary sibling which is then renamed over the target,
/// so a crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the profile.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(key, path = %path.display(), "Profile value written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path().join("profile"));

        assert_eq!(store.get("cart").await.unwrap(), None);

        store.set("cart", "[1]").await.unwrap();
        store.set("cart", "[2]").await.unwrap();
        assert_eq!(store.get("cart").await.unwrap().as_deref(), Some("[2]"));
        assert!(!dir.path().join("profile/cart.json.tmp").exists());

        store.remove("cart").await.unwrap();
        store.remove("cart").await.unwrap();
        assert_eq!(store.get("cart").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_sanitises_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path());

        store.set("../escape", "x").await.unwrap();
        assert!(dir.path().join("___escape.json").exists());
        assert_eq!(store.get("../escape").await.unwrap().as_deref(), Some("x"));
    }
}
