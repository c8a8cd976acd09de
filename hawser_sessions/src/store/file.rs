use std::{error, io, path::PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;

use super::{SessionStore, StoreError};
use crate::Session;

/// A session store backed by a JSON file on disk
///
/// Survives restarts of the process that owns it, and lets multiple
/// instances on the same filesystem observe one another's sessions. On unix
/// the file is created owner-readable only.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Constructs a new file-backed session store
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_session(&self) -> Result<Option<String>, io::Error> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => Ok(Some(data)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn write_session(&self, session: &Session) -> Result<(), StoreError> {
        use tokio::io::AsyncWriteExt;

        let mut file_opts = OpenOptions::new();

        file_opts.create(true).truncate(true).write(true);

        #[cfg(unix)]
        file_opts.mode(0o600);

        let mut file = file_opts.open(&self.path).await?;
        let data = serde_json::to_string_pretty(session)?;
        file.write_all(data.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self) -> Option<Session> {
        let data = match self.read_session().await {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!(
                    error = &error as &dyn error::Error,
                    path = %self.path.display(),
                    "unable to read persisted session"
                );
                return None;
            }
        };

        match serde_json::from_str(&data) {
            Ok(session) => Some(session),
            Err(error) => {
                tracing::warn!(
                    error = &error as &dyn error::Error,
                    path = %self.path.display(),
                    "persisted session is corrupt, removing it"
                );
                if let Err(error) = self.remove().await {
                    tracing::warn!(
                        error = &error as &dyn error::Error,
                        path = %self.path.display(),
                        "unable to remove corrupt session"
                    );
                }
                None
            }
        }
    }

    async fn set(&self, session: &Session) -> Result<(), StoreError> {
        self.write_session(session).await
    }

    async fn remove(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_session;

    fn store_in(dir: &tempfile::TempDir) -> FileStore {
        FileStore::new(dir.path().join("session.json"))
    }

    #[tokio::test]
    async fn round_trips_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.get().await, None);

        let session = sample_session("access", "refresh");
        store.set(&session).await.unwrap();
        assert_eq!(store.get().await, Some(session));
    }

    #[tokio::test]
    async fn remove_clears_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .set(&sample_session("access", "refresh"))
            .await
            .unwrap();
        store.remove().await.unwrap();
        assert_eq!(store.get().await, None);

        // Removing an already-absent session is not an error.
        store.remove().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_data_self_heals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, "this is not json").await.unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.get().await, None);
        // The corrupt record is gone; a second read does not resurrect it.
        assert_eq!(store.get().await, None);
        assert!(tokio::fs::metadata(&path).await.is_err());
    }
}
