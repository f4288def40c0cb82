use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, instrument};

use super::{Snapshot, SnapshotStore, StoreError};

/// JSON file-backed snapshot store.
///
/// The whole registry state is small (room codes and member ids), so the
/// snapshot is rewritten in full on every save.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    #[instrument(skip(self))]
    async fn load(&self) -> Result<Snapshot, StoreError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot file, starting empty");
                return Ok(Snapshot::default());
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_str(&data)?;
        debug!(
            path = %self.path.display(),
            room_count = snapshot.rooms.len(),
            "Snapshot loaded"
        );
        Ok(snapshot)
    }

    #[instrument(skip(self, snapshot))]
    async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&self.path, data).await?;
        debug!(
            path = %self.path.display(),
            room_count = snapshot.rooms.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
