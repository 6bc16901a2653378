pub mod checkpoint;
pub mod post;

pub use checkpoint::{Checkpoint, CHECKPOINT_VERSION};
pub use post::{LinkKind, LinkSpan, Post};
