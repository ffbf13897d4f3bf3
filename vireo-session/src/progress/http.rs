use async_trait::async_trait;
use vireo_model::{ProgressUpdate, SavedProgress, VideoId};

use super::ProgressStore;
use crate::api_client::ApiClient;
use crate::error::StoreError;

/// [`ProgressStore`] backed by the progress read/write endpoints.
#[derive(Debug, Clone)]
pub struct HttpProgressStore {
    client: ApiClient,
}

impl HttpProgressStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl ProgressStore for HttpProgressStore {
    async fn load(&self, video_id: &VideoId) -> Result<Option<SavedProgress>, StoreError> {
        Ok(self.client.get_progress(video_id).await?)
    }

    async fn save(&self, video_id: &VideoId, update: &ProgressUpdate) -> Result<(), StoreError> {
        Ok(self.client.update_progress(video_id, update).await?)
    }
}
