//! In-memory [`JobStore`] for tests: records every submission and lets the
//! test decide when (and whether) a job runs.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use super::{DueJob, JobHandle, JobSpec, JobStore};

#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub handle: JobHandle,
    pub spec: JobSpec,
    pub delay: Duration,
}

#[derive(Default)]
struct ManualState {
    enqueued: Vec<DueJob>,
    scheduled: Vec<ScheduledJob>,
    deleted: Vec<JobHandle>,
    completed: Vec<JobHandle>,
    live: HashSet<JobHandle>,
    events: Vec<String>,
}

#[derive(Default)]
pub struct ManualJobStore {
    state: Mutex<ManualState>,
}

impl ManualJobStore {
    /// Treat `handle` as pending without going through `schedule`.
    pub fn track(&self, handle: &JobHandle) {
        self.state.lock().unwrap().live.insert(handle.clone());
    }

    pub fn enqueued(&self) -> Vec<JobSpec> {
        let state = self.state.lock().unwrap();
        state.enqueued.iter().map(|d| d.spec.clone()).collect()
    }

    pub fn take_enqueued(&self) -> Vec<DueJob> {
        std::mem::take(&mut self.state.lock().unwrap().enqueued)
    }

    pub fn scheduled(&self) -> Vec<ScheduledJob> {
        self.state.lock().unwrap().scheduled.clone()
    }

    /// Scheduled jobs that have neither been deleted nor completed.
    pub fn pending_scheduled(&self) -> Vec<ScheduledJob> {
        let state = self.state.lock().unwrap();
        state
            .scheduled
            .iter()
            .filter(|job| state.live.contains(&job.handle))
            .cloned()
            .collect()
    }

    pub fn deleted(&self) -> Vec<JobHandle> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn completed(&self) -> Vec<JobHandle> {
        self.state.lock().unwrap().completed.clone()
    }

    /// `schedule:<handle>` / `delete:<handle>` in call order.
    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }
}

#[async_trait]
impl JobStore for ManualJobStore {
    async fn enqueue(&self, spec: JobSpec) -> Result<()> {
        let handle = JobHandle::new();
        let mut state = self.state.lock().unwrap();
        state.live.insert(handle.clone());
        state.events.push(format!("enqueue:{}", handle));
        state.enqueued.push(DueJob { handle, spec });
        Ok(())
    }

    async fn schedule(&self, spec: JobSpec, delay: Duration) -> Result<JobHandle> {
        let handle = JobHandle::new();
        let mut state = self.state.lock().unwrap();
        state.live.insert(handle.clone());
        state.events.push(format!("schedule:{}", handle));
        state.scheduled.push(ScheduledJob {
            handle: handle.clone(),
            spec,
            delay,
        });
        Ok(handle)
    }

    async fn delete(&self, handle: &JobHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.live.remove(handle);
        state.events.push(format!("delete:{}", handle));
        state.deleted.push(handle.clone());
        Ok(())
    }

    async fn is_pending(&self, handle: &JobHandle) -> Result<bool> {
        Ok(self.state.lock().unwrap().live.contains(handle))
    }

    async fn complete(&self, handle: &JobHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.live.remove(handle);
        state.completed.push(handle.clone());
        Ok(())
    }
}
