//! Durable background jobs.
//!
//! A job is a [`JobSpec`] value: plain data that can be written to the
//! `pending_jobs` table and re-armed after a restart. [`JobStore`] accepts
//! "run now" and "run after a delay" submissions and hands out a
//! [`JobHandle`] that can later cancel the job. Due jobs flow through a
//! channel to the [`worker::JobWorker`], which runs each on its own task.

pub mod cron_store;
#[cfg(test)]
pub mod manual;
pub mod worker;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::core::engine::overlay::OverlayUpdateRequest;
use crate::core::solar::SunPhase;

/// Opaque token for a not-yet-executed job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Handles are stored as text columns where `''` means "no job".
    pub fn from_stored(value: String) -> Option<Self> {
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobSpec {
    DayNightTransition {
        camera_id: String,
        phase: SunPhase,
        schedule_next: bool,
    },
    ApplyOverlay {
        request: OverlayUpdateRequest,
    },
    ClearOverlay {
        camera_id: String,
    },
    ResyncDayNight,
}

impl JobSpec {
    /// Short description for log lines.
    pub fn label(&self) -> String {
        match self {
            JobSpec::DayNightTransition {
                camera_id, phase, ..
            } => format!("day/night {} for camera {}", phase, camera_id),
            JobSpec::ApplyOverlay { request } => {
                format!("overlay '{}' for camera {}", request.plate_number, request.camera_id)
            }
            JobSpec::ClearOverlay { camera_id } => format!("overlay clear for camera {}", camera_id),
            JobSpec::ResyncDayNight => "day/night resync".to_string(),
        }
    }
}

/// A job whose time has come, on its way to the worker.
#[derive(Debug, Clone)]
pub struct DueJob {
    pub handle: JobHandle,
    pub spec: JobSpec,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Run as soon as a worker is free.
    async fn enqueue(&self, spec: JobSpec) -> Result<()>;

    /// Run once `delay` has elapsed.
    async fn schedule(&self, spec: JobSpec, delay: Duration) -> Result<JobHandle>;

    /// Cancel a pending job. Unknown or already-run handles are a no-op.
    async fn delete(&self, handle: &JobHandle) -> Result<()>;

    /// False once the job has been deleted or has completed.
    async fn is_pending(&self, handle: &JobHandle) -> Result<bool>;

    /// Called by the worker after a job body returns, whatever its outcome.
    async fn complete(&self, handle: &JobHandle) -> Result<()>;
}

/// Executes job bodies. Implemented by the camera update engine.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: DueJob, cancel: CancellationToken) -> Result<()>;
}
