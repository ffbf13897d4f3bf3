use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use vireo_model::{ProgressUpdate, SavedProgress, VideoId};

use super::ProgressStore;
use crate::error::StoreError;

/// Process-local progress store with a write log.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: Mutex<HashMap<VideoId, SavedProgress>>,
    writes: Mutex<Vec<(VideoId, ProgressUpdate)>>,
    failing_writes: AtomicU32,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(self, video_id: VideoId, progress: SavedProgress) -> Self {
        self.records.lock().insert(video_id, progress);
        self
    }

    /// Reject the next `count` saves.
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Every accepted write, oldest first.
    pub fn writes(&self) -> Vec<(VideoId, ProgressUpdate)> {
        self.writes.lock().clone()
    }

    pub fn get(&self, video_id: &VideoId) -> Option<SavedProgress> {
        self.records.lock().get(video_id).cloned()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load(&self, video_id: &VideoId) -> Result<Option<SavedProgress>, StoreError> {
        Ok(self.get(video_id))
    }

    async fn save(&self, video_id: &VideoId, update: &ProgressUpdate) -> Result<(), StoreError> {
        let failing = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StoreError::Unavailable);
        }

        {
            let mut records = self.records.lock();
            let record = records.entry(video_id.clone()).or_default();
            record.watched_seconds = update.time_watched;
            record.percentage = update.progress_percentage;
            record.completed = update.is_completed;
        }
        self.writes.lock().push((video_id.clone(), update.clone()));
        Ok(())
    }
}
