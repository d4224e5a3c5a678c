use crate::error::CheckpointIoError;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

/// Ids of messages already written to a session's output file.
pub type CommittedIds = BTreeSet<String>;

/// One JSON file per session holding the full set of committed message ids.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointIoError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CheckpointIoError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("checkpoint_{}.json", session_id))
    }

    /// Replace the checkpoint with exactly `ids`.
    ///
    /// The set is written to a sibling temp file, synced to disk, and renamed
    /// over the old checkpoint, so a reader sees either the previous set or
    /// the new one.
    pub fn save(&self, session_id: &str, ids: &CommittedIds) -> Result<(), CheckpointIoError> {
        let path = self.path_for(session_id);
        let tmp_path = path.with_extension("json.tmp");

        let json = serde_json::to_vec(ids).map_err(|source| CheckpointIoError::Format {
            path: path.clone(),
            source,
        })?;
        let written = (|| -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()
        })();
        written.map_err(|source| CheckpointIoError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &path).map_err(|source| CheckpointIoError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!("Checkpoint saved: {} messages", ids.len());
        Ok(())
    }

    pub fn load(&self, session_id: &str) -> Result<Option<CommittedIds>, CheckpointIoError> {
        let path = self.path_for(session_id);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CheckpointIoError::Io { path, source }),
        };

        let ids: CommittedIds = serde_json::from_slice(&raw)
            .map_err(|source| CheckpointIoError::Format { path, source })?;
        tracing::info!("Checkpoint loaded: {} messages", ids.len());
        Ok(Some(ids))
    }

    pub fn clear(&self, session_id: &str) -> Result<(), CheckpointIoError> {
        let path = self.path_for(session_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Checkpoint cleared: {}", session_id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointIoError::Io { path, source }),
        }
    }
}
