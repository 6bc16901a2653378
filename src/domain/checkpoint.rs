use serde::{Deserialize, Serialize};

pub const CHECKPOINT_VERSION: u32 = 1;

/// The high-water mark persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Older record files used `last_tweet_id`. A file carrying both keys is
    /// rejected as a duplicate field and so reads as no checkpoint.
    #[serde(alias = "last_tweet_id")]
    pub last_post_id: u64,
}

fn default_version() -> u32 {
    CHECKPOINT_VERSION
}

impl Checkpoint {
    pub fn new(last_post_id: u64) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            last_post_id,
        }
    }
}
