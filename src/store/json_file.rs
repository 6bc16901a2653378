use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::app::{ChirpError, Result};
use crate::domain::{Checkpoint, Post};
use crate::store::{latest_post, CheckpointStore, LoadOutcome};

/// Checkpoint kept as a small JSON document at a fixed path.
pub struct JsonCheckpointStore {
    path: PathBuf,
}

/// Exclusive lock on `<record>.lock`, released on drop.
#[derive(Debug)]
pub struct CheckpointLock {
    _file: File,
    path: PathBuf,
}

impl CheckpointLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl JsonCheckpointStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    fn write_atomic(&self, checkpoint: &Checkpoint) -> Result<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, checkpoint)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| ChirpError::Io(e.error))?;
        Ok(())
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load_outcome(&self) -> LoadOutcome {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return LoadOutcome::Absent,
            Err(e) => return LoadOutcome::Malformed(format!("unreadable: {}", e)),
        };

        if content.trim().is_empty() {
            return LoadOutcome::Malformed("empty file".into());
        }

        match serde_json::from_str::<Checkpoint>(&content) {
            Ok(checkpoint) => LoadOutcome::Found(checkpoint),
            Err(e) => LoadOutcome::Malformed(e.to_string()),
        }
    }

    fn save(&self, posts: &[Post]) -> Result<Option<u64>> {
        let Some(latest) = latest_post(posts) else {
            return Ok(None);
        };

        let checkpoint = Checkpoint::new(latest.id);
        self.write_atomic(&checkpoint)?;
        tracing::info!(
            path = %self.path.display(),
            last_post_id = checkpoint.last_post_id,
            "Checkpoint saved"
        );
        Ok(Some(checkpoint.last_post_id))
    }

    fn lock(&self) -> Result<Option<CheckpointLock>> {
        let path = self.lock_path();
        fs::create_dir_all(self.parent_dir())?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match file.try_lock() {
            Ok(()) => Ok(Some(CheckpointLock { _file: file, path })),
            Err(TryLockError::WouldBlock) => Err(ChirpError::Locked(path)),
            Err(TryLockError::Error(e)) => Err(e.into()),
        }
    }
}
