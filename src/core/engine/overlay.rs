use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::CameraUpdateService;
use crate::core::jobs::JobSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayUpdateRequest {
    pub camera_id: String,
    pub plate_number: String,
    #[serde(default)]
    pub vehicle_description: Option<String>,
    /// Recognition id recorded as the camera's latest processed plate.
    #[serde(default)]
    pub openalpr_uuid: Option<String>,
    #[serde(default)]
    pub is_test: bool,
    #[serde(default)]
    pub is_preview_group: bool,
    #[serde(default)]
    pub is_single_plate: bool,
}

impl OverlayUpdateRequest {
    pub fn new(camera_id: impl Into<String>, plate_number: impl Into<String>) -> Self {
        Self {
            camera_id: camera_id.into(),
            plate_number: plate_number.into(),
            vehicle_description: None,
            openalpr_uuid: None,
            is_test: false,
            is_preview_group: false,
            is_single_plate: false,
        }
    }

    /// Test, preview and single-plate updates leave the counters alone.
    pub fn counts_as_seen(&self) -> bool {
        !(self.is_test || self.is_preview_group || self.is_single_plate)
    }

    pub fn overlay_text(&self) -> String {
        match self.vehicle_description.as_deref().map(str::trim) {
            Some(vehicle) if !vehicle.is_empty() => format!("{} {}", self.plate_number, vehicle),
            _ => self.plate_number.clone(),
        }
    }
}

impl CameraUpdateService {
    /// Accept an overlay update from the trigger surface.
    pub async fn enqueue_overlay(&self, request: OverlayUpdateRequest) -> Result<()> {
        self.store.require_camera(&request.camera_id).await?;
        self.jobs.enqueue(JobSpec::ApplyOverlay { request }).await
    }

    /// Overlay job body: supersede the pending clear, show the text, schedule
    /// a fresh clear and write the bookkeeping last.
    pub async fn dispatch(
        &self,
        request: &OverlayUpdateRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let _guard = self.lock_overlay(&request.camera_id).await;
        let camera = self.store.require_camera(&request.camera_id).await?;

        if let Some(previous) = &camera.next_clear_overlay_schedule_id {
            self.jobs.delete(previous).await?;
            debug!("Superseded overlay clear {} on camera {}", previous, camera.id);
        }

        match self.camera(&camera).set_overlay_text(request, cancel).await {
            Ok(()) => info!(
                "Camera {} overlay set to '{}'",
                camera.label(),
                request.overlay_text()
            ),
            Err(e) => warn!("Camera {} overlay update failed: {}", camera.label(), e),
        }

        let clear = self
            .jobs
            .schedule(
                JobSpec::ClearOverlay {
                    camera_id: camera.id.clone(),
                },
                self.settings.clear_delay,
            )
            .await?;

        self.store
            .record_overlay_dispatch(
                &camera.id,
                Some(&clear),
                request.counts_as_seen(),
                request.openalpr_uuid.as_deref(),
            )
            .await?;
        Ok(())
    }

    /// Clear job body. The stored clear handle is reset whatever the device
    /// says; a dispatch racing this job can have its fresh handle wiped.
    pub async fn clear_expired(&self, camera_id: &str, cancel: &CancellationToken) -> Result<()> {
        let camera = self.store.require_camera(camera_id).await?;

        match self.camera(&camera).clear_overlay_text(cancel).await {
            Ok(()) => debug!("Camera {} overlay cleared", camera.label()),
            Err(e) => warn!("Camera {} overlay clear failed: {}", camera.label(), e),
        }

        self.store.set_clear_overlay_handle(camera_id, None).await?;
        Ok(())
    }

    /// Clear every camera's overlay and drop any pending clear jobs. Each
    /// camera is re-read under its overlay lock, so a dispatch finishing
    /// meanwhile has its clear deleted rather than orphaned.
    pub async fn force_clear_all(&self, cancel: &CancellationToken) -> Result<()> {
        let ids: Vec<String> = self
            .store
            .list_cameras()
            .await?
            .into_iter()
            .map(|camera| camera.id)
            .collect();

        let mut cleared = 0;
        for id in &ids {
            let _guard = self.lock_overlay(id).await;
            let Some(camera) = self.store.get_camera(id).await? else {
                continue;
            };

            if let Some(handle) = &camera.next_clear_overlay_schedule_id
                && let Err(e) = self.jobs.delete(handle).await
            {
                warn!("Failed to delete overlay clear {}: {}", handle, e);
            }

            if let Err(e) = self.camera(&camera).clear_overlay_text(cancel).await {
                warn!("Camera {} overlay clear failed: {}", camera.label(), e);
            }

            self.store.set_clear_overlay_handle(&camera.id, None).await?;
            cleared += 1;
        }
        info!("Cleared overlays on {} camera(s)", cleared);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_text_appends_vehicle_when_present() {
        let mut request = OverlayUpdateRequest::new("c1", "ABC123");
        assert_eq!(request.overlay_text(), "ABC123");
        request.vehicle_description = Some("  ".to_string());
        assert_eq!(request.overlay_text(), "ABC123");
        request.vehicle_description = Some("Blue Ford Focus".to_string());
        assert_eq!(request.overlay_text(), "ABC123 Blue Ford Focus");
    }

    #[test]
    fn any_suppression_flag_stops_counting() {
        let mut request = OverlayUpdateRequest::new("c1", "ABC123");
        assert!(request.counts_as_seen());
        request.is_preview_group = true;
        assert!(!request.counts_as_seen());
    }

    #[test]
    fn request_flags_default_when_absent() {
        let request: OverlayUpdateRequest =
            serde_json::from_str(r#"{"camera_id":"c1","plate_number":"XYZ999"}"#).unwrap();
        assert_eq!(request, OverlayUpdateRequest::new("c1", "XYZ999"));
    }
}
