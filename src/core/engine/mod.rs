//! Camera update engine: the day/night scheduler and the overlay dispatcher.
//!
//! Both halves live on [`CameraUpdateService`] (see `daynight.rs` and
//! `overlay.rs`). The service is the [`JobRunner`] for every job kind, and
//! [`CameraUpdateHooks`] wires it into process start and stop.

pub mod daynight;
pub mod overlay;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::device::{Camera, DeviceFactory};
use crate::core::jobs::{DueJob, JobRunner, JobSpec, JobStore};
use crate::core::lifecycle::LifecycleComponent;
use crate::core::store::Store;
use crate::core::store::types::CameraRecord;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub clear_delay: Duration,
    pub device_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            clear_delay: Duration::from_secs(5),
            device_timeout: Duration::from_secs(10),
        }
    }
}

/// One async mutex per key, created on first use.
#[derive(Default)]
struct KeyedLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    async fn lock(&self, key: String) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct CameraUpdateService {
    store: Store,
    jobs: Arc<dyn JobStore>,
    devices: Arc<dyn DeviceFactory>,
    settings: EngineSettings,
    clock: Clock,
    locks: KeyedLocks,
}

impl CameraUpdateService {
    pub fn new(
        store: Store,
        jobs: Arc<dyn JobStore>,
        devices: Arc<dyn DeviceFactory>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            jobs,
            devices,
            settings,
            clock: Arc::new(Utc::now),
            locks: KeyedLocks::default(),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn camera(&self, record: &CameraRecord) -> Camera {
        Camera::new(self.devices.connect(record), self.settings.device_timeout)
    }

    async fn lock_day_night(&self, camera_id: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(format!("daynight:{}", camera_id)).await
    }

    async fn lock_overlay(&self, camera_id: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(format!("overlay:{}", camera_id)).await
    }
}

#[async_trait]
impl JobRunner for CameraUpdateService {
    async fn run(&self, job: DueJob, cancel: CancellationToken) -> Result<()> {
        match job.spec {
            JobSpec::DayNightTransition {
                camera_id,
                phase,
                schedule_next,
            } => {
                self.run_transition(&camera_id, phase, schedule_next, &job.handle, &cancel)
                    .await
            }
            JobSpec::ApplyOverlay { request } => self.dispatch(&request, &cancel).await,
            JobSpec::ClearOverlay { camera_id } => self.clear_expired(&camera_id, &cancel).await,
            JobSpec::ResyncDayNight => self.schedule_all().await.map(|_| ()),
        }
    }
}

/// Start/stop hooks for the engine plus the periodic resync timer.
pub struct CameraUpdateHooks {
    service: Arc<CameraUpdateService>,
    scheduler: JobScheduler,
    resync_cron: String,
    resync_job: Option<Uuid>,
    shutdown: CancellationToken,
}

impl CameraUpdateHooks {
    pub fn new(
        service: Arc<CameraUpdateService>,
        scheduler: JobScheduler,
        resync_cron: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            scheduler,
            resync_cron,
            resync_job: None,
            shutdown,
        }
    }

    async fn register_resync(&mut self) -> Result<()> {
        let jobs = self.service.jobs.clone();
        let job = Job::new_async(self.resync_cron.as_str(), move |_uuid, mut _l| {
            let jobs = jobs.clone();
            Box::pin(async move {
                if let Err(e) = jobs.enqueue(JobSpec::ResyncDayNight).await {
                    error!("Failed to enqueue day/night resync: {}", e);
                }
            })
        })?;
        self.resync_job = Some(self.scheduler.add(job).await?);
        info!("Day/night resync registered on '{}'", self.resync_cron);
        Ok(())
    }
}

#[async_trait]
impl LifecycleComponent for CameraUpdateHooks {
    async fn on_start(&mut self) -> Result<()> {
        let cancel = self.shutdown.child_token();

        let forced = self.service.force_all().await?;
        let scheduled = self.service.schedule_all().await?;
        self.service.force_clear_all(&cancel).await?;
        info!(
            "Camera update service started: {} camera(s) forced, {} scheduled",
            forced, scheduled
        );

        self.register_resync().await
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        if let Some(job_id) = self.resync_job.take()
            && let Err(e) = self.scheduler.remove(&job_id).await
        {
            warn!("Failed to remove day/night resync timer: {}", e);
        }

        self.shutdown.cancel();

        // The process token is gone; the final clears only get the per-call timeout.
        self.service
            .force_clear_all(&CancellationToken::new())
            .await?;
        info!("Camera update service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
