use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use vireo_config::ApiSettings;
use vireo_model::{ProgressUpdate, RawTranscript, SavedProgress, VideoId};

use crate::transcript::TranscriptFetcher;

/// HTTP client for the progress and transcript endpoints.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_version: String,
    token_store: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field(
                "has_token",
                &self
                    .token_store
                    .try_read()
                    .map(|t| t.is_some())
                    .unwrap_or(false),
            )
            .finish()
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to create HTTP client")?;

        info!("[ApiClient] Creating API client with base URL: {}", base_url);

        Ok(Self {
            client,
            base_url,
            api_version: "v1".to_string(),
            token_store: Arc::new(RwLock::new(None)),
        })
    }

    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        let base_url = settings
            .base_url
            .as_deref()
            .context("api.base_url is not configured")?;
        Self::new(base_url, settings.request_timeout())
    }

    /// Build a versioned API URL
    pub fn build_url(&self, path: impl AsRef<str>) -> String {
        let path = path.as_ref().trim_start_matches('/');
        format!("{}/api/{}/{}", self.base_url, self.api_version, path)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the bearer token sent with every request
    pub async fn set_token(&self, token: Option<String>) {
        *self.token_store.write().await = token;
    }

    async fn build_request(&self, builder: RequestBuilder) -> RequestBuilder {
        if let Some(token) = self.token_store.read().await.as_ref() {
            builder.bearer_auth(token)
        } else {
            builder
        }
    }

    /// Run a GET and decode the body, mapping 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = self.build_request(request).await.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        Ok(Some(response.json().await?))
    }

    pub async fn get_progress(&self, video_id: &VideoId) -> Result<Option<SavedProgress>> {
        let url = self.build_url(format!("videos/{video_id}/progress"));
        debug!("[ApiClient] GET {}", url);
        self.get_optional(self.client.get(&url))
            .await
            .with_context(|| format!("failed to load progress for {video_id}"))
    }

    pub async fn update_progress(&self, video_id: &VideoId, update: &ProgressUpdate) -> Result<()> {
        let url = self.build_url(format!("videos/{video_id}/progress"));
        debug!("[ApiClient] POST {} at {:.1}s", url, update.time_watched);
        let request = self.build_request(self.client.post(&url).json(update)).await;
        let response = request.send().await?;
        check_status(response)
            .await
            .with_context(|| format!("failed to save progress for {video_id}"))?;
        Ok(())
    }

    pub async fn get_transcript(&self, video_id: &VideoId, locale: &str) -> Result<Option<RawTranscript>> {
        let url = self.build_url(format!("videos/{video_id}/transcript"));
        debug!("[ApiClient] GET {} (locale {})", url, locale);
        self.get_optional(self.client.get(&url).query(&[("locale", locale)]))
            .await
            .with_context(|| format!("failed to load {locale} transcript for {video_id}"))
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(anyhow::anyhow!(
        "Request failed with status {}: {}",
        status,
        error_text
    ))
}

#[async_trait]
impl TranscriptFetcher for ApiClient {
    async fn fetch_transcript(&self, video_id: &VideoId, locale: &str) -> Result<Option<RawTranscript>> {
        self.get_transcript(video_id, locale).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_versioned_urls() {
        let client = ApiClient::new("https://media.example.com/", Duration::from_secs(5))
            .expect("client");
        assert_eq!(
            client.build_url("/videos/abc/progress"),
            "https://media.example.com/api/v1/videos/abc/progress"
        );
    }

    #[test]
    fn from_settings_requires_base_url() {
        assert!(ApiClient::from_settings(&ApiSettings::default()).is_err());
    }
}
