use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use cinesync_core::session::{KeyValueStore, Result, SessionError};

type Entries = BTreeMap<String, String>;

/// Session storage persisted as a flat JSON object in one file.
///
/// Every operation reads the whole file, so edits made by another process
/// between calls are picked up.
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    lock: Mutex<()>,
}

fn storage_error(path: &Path, err: std::io::Error) -> SessionError {
    SessionError::Storage(format!("{}: {err}", path.display()))
}

impl FileKv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Entries> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(Entries::new()),
            Ok(raw) => {
                serde_json::from_str(&raw).map_err(|e| SessionError::Corrupted(e.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }

    async fn write(&self, entries: &Entries) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, e))?;
        }
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| storage_error(&self.path, e))
    }
}

#[async_trait]
impl KeyValueStore for FileKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        if entries.remove(key).is_some() {
            self.write(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("cinesync-{}-{}", std::process::id(), uuid::Uuid::new_v4()))
            .join(name)
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let path = temp_path("session.json");
        let kv = FileKv::new(&path);
        kv.set("currentUser", "{\"usuario_id\":1}").await.unwrap();
        kv.set("isAuthenticated", "true").await.unwrap();

        let reopened = FileKv::new(&path);
        assert_eq!(
            reopened.get("isAuthenticated").await.unwrap().as_deref(),
            Some("true")
        );
        reopened.remove("isAuthenticated").await.unwrap();
        assert_eq!(kv.get("isAuthenticated").await.unwrap(), None);
        assert!(kv.get("currentUser").await.unwrap().is_some());

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let kv = FileKv::new(temp_path("absent.json"));
        assert_eq!(kv.get("rememberMe").await.unwrap(), None);
        kv.remove("rememberMe").await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupted_file() {
        let path = temp_path("broken.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "[1, 2").await.unwrap();

        let err = FileKv::new(&path).get("currentUser").await.unwrap_err();
        assert!(matches!(err, SessionError::Corrupted(_)));

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
