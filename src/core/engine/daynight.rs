use anyhow::Result;
use chrono::Duration as ChronoDuration;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::CameraUpdateService;
use crate::core::jobs::{JobHandle, JobSpec};
use crate::core::solar::{self, SunPhase, Transition};
use crate::core::store::types::CameraRecord;

/// A transition job can fire a hair before its instant; looking this far
/// ahead keeps it from rescheduling itself.
const RESCHEDULE_LOOKAHEAD_SECS: i64 = 60;

impl CameraUpdateService {
    /// Bring every day/night camera in line with the current sky, without
    /// starting a chain. Returns how many flips were enqueued.
    pub async fn force_all(&self) -> Result<usize> {
        let agent = self.store.get_agent().await?;
        let sun_up = solar::is_sun_up(agent.latitude, agent.longitude, self.now());
        let phase = SunPhase::for_sun_up(sun_up);

        let cameras = self.store.list_day_night_cameras().await?;
        for camera in &cameras {
            self.jobs
                .enqueue(JobSpec::DayNightTransition {
                    camera_id: camera.id.clone(),
                    phase,
                    schedule_next: false,
                })
                .await?;
        }
        info!(
            "Forced {} mode on {} camera(s)",
            phase,
            cameras.len()
        );
        Ok(cameras.len())
    }

    /// Schedule the next transition for every day/night camera. A camera that
    /// fails is logged and skipped. Returns how many were scheduled.
    pub async fn schedule_all(&self) -> Result<usize> {
        let mut scheduled = 0;
        for camera in self.store.list_day_night_cameras().await? {
            match self.schedule_one(&camera.id).await {
                Ok(Some(_)) => scheduled += 1,
                Ok(None) => {}
                Err(e) => warn!("Could not schedule day/night for camera {}: {:#}", camera.id, e),
            }
        }
        Ok(scheduled)
    }

    /// (Re)arm one camera's chain. Any pending transition job is deleted
    /// first, so a camera never carries two chains.
    pub async fn schedule_one(&self, camera_id: &str) -> Result<Option<Transition>> {
        let _guard = self.lock_day_night(camera_id).await;
        let camera = self.store.require_camera(camera_id).await?;

        if let Some(old) = &camera.next_day_night_schedule_id {
            self.jobs.delete(old).await?;
        }
        if !camera.update_day_night_mode_enabled {
            if camera.next_day_night_schedule_id.is_some() {
                self.store.set_day_night_handle(camera_id, None).await?;
            }
            debug!("Camera {} has day/night updates disabled", camera_id);
            return Ok(None);
        }

        let transition = self.schedule_successor(&camera, self.now()).await?;
        Ok(Some(transition))
    }

    /// Stop one camera's chain.
    pub async fn cancel_one(&self, camera_id: &str) -> Result<()> {
        let _guard = self.lock_day_night(camera_id).await;
        let camera = self.store.require_camera(camera_id).await?;

        if let Some(handle) = &camera.next_day_night_schedule_id {
            self.jobs.delete(handle).await?;
            info!("Cancelled day/night job {} for camera {}", handle, camera.label());
        }
        self.store.set_day_night_handle(camera_id, None).await?;
        Ok(())
    }

    /// Transition job body. The device call comes first; when `schedule_next`
    /// is set and this job still owns the camera's chain, the successor is
    /// scheduled as the last step.
    pub async fn run_transition(
        &self,
        camera_id: &str,
        phase: SunPhase,
        schedule_next: bool,
        own_handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let camera = self.store.require_camera(camera_id).await?;

        match self.camera(&camera).trigger_day_night_mode(phase, cancel).await {
            Ok(()) => info!("Camera {} switched to {} mode", camera.label(), phase),
            Err(e) => warn!(
                "Camera {} did not switch to {} mode: {}",
                camera.label(),
                phase,
                e
            ),
        }

        if !schedule_next {
            return Ok(());
        }

        let _guard = self.lock_day_night(camera_id).await;
        let camera = self.store.require_camera(camera_id).await?;

        if camera.next_day_night_schedule_id.as_ref() != Some(own_handle) {
            debug!(
                "Day/night job {} no longer owns camera {}; not rescheduling",
                own_handle, camera_id
            );
            return Ok(());
        }
        if !camera.update_day_night_mode_enabled {
            self.store.set_day_night_handle(camera_id, None).await?;
            info!("Camera {} disabled day/night updates; chain ends", camera.label());
            return Ok(());
        }

        let after = self.now() + ChronoDuration::seconds(RESCHEDULE_LOOKAHEAD_SECS);
        self.schedule_successor(&camera, after).await?;
        Ok(())
    }

    /// Compute the next transition after `after`, submit it and store its
    /// handle. When there is none the handle is cleared and the error returned.
    async fn schedule_successor(
        &self,
        camera: &CameraRecord,
        after: chrono::DateTime<chrono::Utc>,
    ) -> Result<Transition> {
        let agent = self.store.get_agent().await?;
        let transition = match solar::next_transition(agent.latitude, agent.longitude, after) {
            Ok(t) => t,
            Err(e) => {
                self.store.set_day_night_handle(&camera.id, None).await?;
                warn!(
                    "Day/night chain for camera {} paused until the next resync: {}",
                    camera.label(),
                    e
                );
                return Err(e.into());
            }
        };

        let delay = (transition.at - self.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let handle = self
            .jobs
            .schedule(
                JobSpec::DayNightTransition {
                    camera_id: camera.id.clone(),
                    phase: transition.phase,
                    schedule_next: true,
                },
                delay,
            )
            .await?;
        self.store
            .set_day_night_handle(&camera.id, Some(&handle))
            .await?;

        info!(
            "Camera {}: next {} at {} (job {})",
            camera.label(),
            transition.phase,
            solar::local_display(transition.at),
            handle
        );
        Ok(transition)
    }

    /// One-off flip from the trigger surface; does not touch the chain.
    pub async fn enqueue_manual_flip(&self, camera_id: &str, phase: SunPhase) -> Result<()> {
        self.store.require_camera(camera_id).await?;
        self.jobs
            .enqueue(JobSpec::DayNightTransition {
                camera_id: camera_id.to_string(),
                phase,
                schedule_next: false,
            })
            .await
    }

    pub async fn enqueue_resync(&self) -> Result<()> {
        self.jobs.enqueue(JobSpec::ResyncDayNight).await
    }
}
