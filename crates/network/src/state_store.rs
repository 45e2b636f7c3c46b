//! Named-blob persistence behind an async trait.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{NetError, Result};

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns the stored value, or `None` if nothing was ever saved under
    /// `name`.
    async fn load(&self, name: &str) -> Result<Option<String>>;

    async fn save(&self, name: &str, value: &str) -> Result<()>;
}

/// Stores each named blob as a file in one directory.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, name: &str) -> Result<Option<String>> {
        let path = self.path_for(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NetError::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn save(&self, name: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| NetError::Io(format!("Failed to create {}: {}", self.dir.display(), e)))?;

        // Write-then-rename so a crash mid-write never clobbers good state.
        let path = self.path_for(name);
        let tmp = self.dir.join(format!("{}.tmp", name));
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| NetError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| NetError::Io(format!("Failed to rename {}: {}", tmp.display(), e)))?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStateStore;

#[cfg(any(test, feature = "test-utils"))]
mod memory {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::Result;
    use crate::state_store::StateStore;

    /// In-memory store that counts saves, so tests can assert persistence
    /// happened without touching disk.
    #[derive(Default)]
    pub struct MemoryStateStore {
        values: Mutex<HashMap<String, String>>,
        save_count: AtomicUsize,
    }

    impl MemoryStateStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn save_count(&self) -> usize {
            self.save_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StateStore for MemoryStateStore {
        async fn load(&self, name: &str) -> Result<Option<String>> {
            Ok(self.values.lock().unwrap().get(name).cloned())
        }

        async fn save(&self, name: &str, value: &str) -> Result<()> {
            self.values
                .lock()
                .unwrap()
                .insert(name.to_string(), value.to_string());
            self.save_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_roundtrips_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        assert_eq!(store.load("state.json").await.unwrap(), None);

        store.save("state.json", "{\"a\":1}").await.unwrap();
        assert_eq!(
            store.load("state.json").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        store.save("state.json", "{\"a\":2}").await.unwrap();
        assert_eq!(
            store.load("state.json").await.unwrap().as_deref(),
            Some("{\"a\":2}")
        );
    }

    #[tokio::test]
    async fn memory_store_counts_saves() {
        let store = MemoryStateStore::new();
        store.save("k", "v1").await.unwrap();
        store.save("k", "v2").await.unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.load("k").await.unwrap().as_deref(), Some("v2"));
    }
}
