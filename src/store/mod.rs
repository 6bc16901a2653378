pub mod json_file;

use crate::app::Result;
use crate::domain::{Checkpoint, Post};
use crate::render::digest::chronological;

pub use json_file::{CheckpointLock, JsonCheckpointStore};

/// What was found where the checkpoint should be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Absent,
    Malformed(String),
    Found(Checkpoint),
}

pub trait CheckpointStore {
    fn load_outcome(&self) -> LoadOutcome;

    /// Writes a checkpoint for `posts` and returns the recorded id. Empty
    /// input leaves any existing checkpoint as it is.
    fn save(&self, posts: &[Post]) -> Result<Option<u64>>;

    /// Serializes runs sharing this store. `None` means the store needs no lock.
    fn lock(&self) -> Result<Option<CheckpointLock>> {
        Ok(None)
    }

    /// The last recorded post id. Absent and malformed records both read as
    /// "no checkpoint".
    fn load(&self) -> Option<u64> {
        match self.load_outcome() {
            LoadOutcome::Found(checkpoint) => Some(checkpoint.last_post_id),
            LoadOutcome::Absent => {
                tracing::debug!("No checkpoint recorded yet");
                None
            }
            LoadOutcome::Malformed(reason) => {
                tracing::warn!(%reason, "Ignoring malformed checkpoint");
                None
            }
        }
    }
}

/// The post a checkpoint should record: the chronologically latest one, ties
/// broken by the higher id.
pub fn latest_post(posts: &[Post]) -> Option<&Post> {
    chronological(posts).pop()
}
