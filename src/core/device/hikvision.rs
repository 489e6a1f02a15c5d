use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::{base_url, check_response};
use crate::core::error::CoreError;
use crate::core::solar::SunPhase;
use crate::core::store::types::CameraRecord;

const OVERLAY_PATH: &str = "/ISAPI/System/Video/inputs/channels/1/overlays/text/1";
const IRCUT_PATH: &str = "/ISAPI/Image/channels/1/IrcutFilter";
const XMLNS: &str = "http://www.hikvision.com/ver20/XMLSchema";

/// ISAPI client for a single Hikvision camera.
pub struct HikvisionClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HikvisionClient {
    pub fn new(client: reqwest::Client, camera: &CameraRecord) -> Self {
        Self {
            client,
            base_url: base_url(&camera.address),
            username: camera.username.clone(),
            password: camera.password.clone(),
        }
    }

    pub async fn trigger_day_night_mode(&self, phase: SunPhase) -> Result<(), CoreError> {
        self.put_xml(IRCUT_PATH, ircut_body(phase)).await
    }

    pub async fn set_overlay_text(&self, text: &str) -> Result<(), CoreError> {
        self.put_xml(OVERLAY_PATH, overlay_body(text, true)).await
    }

    pub async fn clear_overlay_text(&self) -> Result<(), CoreError> {
        self.put_xml(OVERLAY_PATH, overlay_body("", false)).await
    }

    async fn put_xml(&self, path: &str, body: String) -> Result<(), CoreError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("ISAPI PUT {}", url);
        let response = self
            .client
            .put(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await;
        check_response(response).await
    }
}

fn overlay_body(text: &str, enabled: bool) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><TextOverlay version="2.0" xmlns="{}"><id>1</id><enabled>{}</enabled><positionX>0</positionX><positionY>0</positionY><displayText>{}</displayText></TextOverlay>"#,
        XMLNS,
        enabled,
        quick_xml::escape::escape(text)
    )
}

fn ircut_body(phase: SunPhase) -> String {
    let mode = match phase {
        SunPhase::Sunrise => "day",
        SunPhase::Sunset => "night",
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><IrcutFilter version="2.0" xmlns="{}"><IrcutFilterType>{}</IrcutFilterType></IrcutFilter>"#,
        XMLNS, mode
    )
}
