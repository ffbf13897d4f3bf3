//! Watch-progress persistence.
//!
//! Saves are absolute upserts of the watched position, so duplicates and
//! reordering are harmless and the last write wins. Failures are never
//! surfaced to playback; the next save cycle retries.

pub mod http;
pub mod memory;
pub mod persistence;

use async_trait::async_trait;
use vireo_model::{ProgressUpdate, SavedProgress, VideoId};

use crate::error::StoreError;

pub use http::HttpProgressStore;
pub use memory::MemoryProgressStore;
pub use persistence::ProgressPersistence;

/// Read and write access to saved progress for the current user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load(&self, video_id: &VideoId) -> Result<Option<SavedProgress>, StoreError>;

    async fn save(&self, video_id: &VideoId, update: &ProgressUpdate) -> Result<(), StoreError>;
}
