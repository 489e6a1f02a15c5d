use tracing::debug;

use super::{base_url, check_response};
use crate::core::error::CoreError;
use crate::core::solar::SunPhase;
use crate::core::store::types::CameraRecord;

const CONFIG_PATH: &str = "/cgi-bin/configManager.cgi?action=setConfig";

/// CGI client for a single Dahua camera.
pub struct DahuaClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl DahuaClient {
    pub fn new(client: reqwest::Client, camera: &CameraRecord) -> Self {
        Self {
            client,
            base_url: base_url(&camera.address),
            username: camera.username.clone(),
            password: camera.password.clone(),
        }
    }

    pub async fn trigger_day_night_mode(&self, phase: SunPhase) -> Result<(), CoreError> {
        self.set_config(&day_night_query(phase)).await
    }

    pub async fn set_overlay_text(&self, text: &str) -> Result<(), CoreError> {
        self.set_config(&overlay_query(text, true)).await
    }

    pub async fn clear_overlay_text(&self) -> Result<(), CoreError> {
        self.set_config(&overlay_query("", false)).await
    }

    async fn set_config(&self, query: &str) -> Result<(), CoreError> {
        let url = format!("{}{}&{}", self.base_url, CONFIG_PATH, query);
        debug!("Dahua setConfig {}", url);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await;
        check_response(response).await
    }
}

fn overlay_query(text: &str, enabled: bool) -> String {
    format!(
        "VideoWidget[0].CustomTitle[1].Text={}&VideoWidget[0].CustomTitle[1].EncodeBlend={}",
        urlencoding::encode(text),
        enabled
    )
}

fn day_night_query(phase: SunPhase) -> String {
    let config = match phase {
        SunPhase::Sunrise => 0,
        SunPhase::Sunset => 1,
    };
    format!("VideoInMode[0].Config[0]={}", config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_query_encodes_text() {
        assert_eq!(
            overlay_query("ABC 123&", true),
            "VideoWidget[0].CustomTitle[1].Text=ABC%20123%26&VideoWidget[0].CustomTitle[1].EncodeBlend=true"
        );
    }

    #[test]
    fn day_night_query_uses_config_index() {
        assert_eq!(day_night_query(SunPhase::Sunrise), "VideoInMode[0].Config[0]=0");
        assert_eq!(day_night_query(SunPhase::Sunset), "VideoInMode[0].Config[0]=1");
    }
}
