use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Where retrieved images come from.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Full vehicle frame for a recognition.
    async fn fetch_frame(&self, openalpr_uuid: &str) -> Result<Vec<u8>>;

    /// Plate crop; `coordinates` is the agent's query string for the region.
    async fn fetch_crop(&self, openalpr_uuid: &str, coordinates: &str) -> Result<Vec<u8>>;
}

/// Fetches images from the recognition agent's HTTP interface.
pub struct AgentImageSource {
    client: reqwest::Client,
    base_url: String,
}

impl AgentImageSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn frame_url(&self, openalpr_uuid: &str) -> String {
        format!(
            "{}/img/{}.jpg",
            self.base_url,
            urlencoding::encode(openalpr_uuid)
        )
    }

    pub fn crop_url(&self, openalpr_uuid: &str, coordinates: &str) -> String {
        format!(
            "{}/crop/{}?{}",
            self.base_url,
            urlencoding::encode(openalpr_uuid),
            coordinates.trim_start_matches('?')
        )
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageSource for AgentImageSource {
    async fn fetch_frame(&self, openalpr_uuid: &str) -> Result<Vec<u8>> {
        self.get_bytes(&self.frame_url(openalpr_uuid)).await
    }

    async fn fetch_crop(&self, openalpr_uuid: &str, coordinates: &str) -> Result<Vec<u8>> {
        self.get_bytes(&self.crop_url(openalpr_uuid, coordinates))
            .await
    }
}
