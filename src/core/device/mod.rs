//! Camera device abstraction.
//!
//! [`CameraDevice`] is the capability set the scheduling core needs from a
//! physical camera. [`DeviceDriver`] picks the protocol from the camera's
//! manufacturer tag; [`Camera`] wraps any device so every call is bounded by
//! the configured timeout and the caller's cancellation token.

pub mod dahua;
pub mod hikvision;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::engine::overlay::OverlayUpdateRequest;
use crate::core::error::CoreError;
use crate::core::solar::SunPhase;
use crate::core::store::types::CameraRecord;

use dahua::DahuaClient;
use hikvision::HikvisionClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Manufacturer {
    Hikvision,
    Dahua,
    #[default]
    #[serde(rename = "none")]
    Unmanaged,
}

impl Manufacturer {
    pub fn as_str(self) -> &'static str {
        match self {
            Manufacturer::Hikvision => "hikvision",
            Manufacturer::Dahua => "dahua",
            Manufacturer::Unmanaged => "none",
        }
    }

    /// Unrecognised tags map to `Unmanaged`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "hikvision" => Manufacturer::Hikvision,
            "dahua" => Manufacturer::Dahua,
            _ => Manufacturer::Unmanaged,
        }
    }
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn trigger_day_night_mode(&self, phase: SunPhase) -> Result<(), CoreError>;
    async fn set_overlay_text(&self, request: &OverlayUpdateRequest) -> Result<(), CoreError>;
    async fn clear_overlay_text(&self) -> Result<(), CoreError>;
}

/// Builds the device for a camera record.
pub trait DeviceFactory: Send + Sync {
    fn connect(&self, camera: &CameraRecord) -> Arc<dyn CameraDevice>;
}

/// Production factory: one shared HTTP client, protocol chosen per camera.
pub struct HttpDeviceFactory {
    client: reqwest::Client,
}

impl HttpDeviceFactory {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl DeviceFactory for HttpDeviceFactory {
    fn connect(&self, camera: &CameraRecord) -> Arc<dyn CameraDevice> {
        Arc::new(DeviceDriver::for_camera(self.client.clone(), camera))
    }
}

pub enum DeviceDriver {
    Hikvision(HikvisionClient),
    Dahua(DahuaClient),
    Unmanaged { camera_id: String },
}

impl DeviceDriver {
    pub fn for_camera(client: reqwest::Client, camera: &CameraRecord) -> Self {
        match camera.manufacturer {
            Manufacturer::Hikvision => DeviceDriver::Hikvision(HikvisionClient::new(client, camera)),
            Manufacturer::Dahua => DeviceDriver::Dahua(DahuaClient::new(client, camera)),
            Manufacturer::Unmanaged => DeviceDriver::Unmanaged {
                camera_id: camera.id.clone(),
            },
        }
    }
}

#[async_trait]
impl CameraDevice for DeviceDriver {
    async fn trigger_day_night_mode(&self, phase: SunPhase) -> Result<(), CoreError> {
        match self {
            DeviceDriver::Hikvision(c) => c.trigger_day_night_mode(phase).await,
            DeviceDriver::Dahua(c) => c.trigger_day_night_mode(phase).await,
            DeviceDriver::Unmanaged { camera_id } => {
                info!("Camera {} has no device driver; skipping {} mode", camera_id, phase);
                Ok(())
            }
        }
    }

    async fn set_overlay_text(&self, request: &OverlayUpdateRequest) -> Result<(), CoreError> {
        match self {
            DeviceDriver::Hikvision(c) => c.set_overlay_text(&request.overlay_text()).await,
            DeviceDriver::Dahua(c) => c.set_overlay_text(&request.overlay_text()).await,
            DeviceDriver::Unmanaged { camera_id } => {
                info!(
                    "Camera {} has no device driver; skipping overlay '{}'",
                    camera_id,
                    request.overlay_text()
                );
                Ok(())
            }
        }
    }

    async fn clear_overlay_text(&self) -> Result<(), CoreError> {
        match self {
            DeviceDriver::Hikvision(c) => c.clear_overlay_text().await,
            DeviceDriver::Dahua(c) => c.clear_overlay_text().await,
            DeviceDriver::Unmanaged { camera_id } => {
                info!("Camera {} has no device driver; skipping overlay clear", camera_id);
                Ok(())
            }
        }
    }
}

/// Run a device call under `timeout`, giving up early if `cancel` fires.
pub async fn guarded<F>(
    timeout: Duration,
    cancel: &CancellationToken,
    call: F,
) -> Result<(), CoreError>
where
    F: Future<Output = Result<(), CoreError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CoreError::Cancelled),
        outcome = tokio::time::timeout(timeout, call) => {
            outcome.unwrap_or(Err(CoreError::DeviceTimeout(timeout.as_secs())))
        }
    }
}

/// A camera's device plus the per-call bound applied to every operation.
pub struct Camera {
    device: Arc<dyn CameraDevice>,
    timeout: Duration,
}

impl Camera {
    pub fn new(device: Arc<dyn CameraDevice>, timeout: Duration) -> Self {
        Self { device, timeout }
    }

    pub async fn trigger_day_night_mode(
        &self,
        phase: SunPhase,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        guarded(self.timeout, cancel, self.device.trigger_day_night_mode(phase)).await
    }

    pub async fn set_overlay_text(
        &self,
        request: &OverlayUpdateRequest,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        guarded(self.timeout, cancel, self.device.set_overlay_text(request)).await
    }

    pub async fn clear_overlay_text(&self, cancel: &CancellationToken) -> Result<(), CoreError> {
        guarded(self.timeout, cancel, self.device.clear_overlay_text()).await
    }
}

/// `http://` is assumed when the configured address has no scheme.
pub(crate) fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

/// Map a device HTTP exchange onto the device error taxonomy.
pub(crate) async fn check_response(
    response: Result<reqwest::Response, reqwest::Error>,
) -> Result<(), CoreError> {
    let resp = response.map_err(|e| CoreError::DeviceUnreachable(e.to_string()))?;
    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        let body = resp.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        return Err(CoreError::DeviceRejected(format!("{} {}", status, snippet.trim())));
    }
    Ok(())
}
