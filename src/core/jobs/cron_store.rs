use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DueJob, JobHandle, JobSpec, JobStore};
use crate::core::lifecycle::LifecycleComponent;
use crate::core::store::Store;

/// [`JobStore`] backed by `tokio-cron-scheduler` one-shot timers, with every
/// pending job mirrored into the `pending_jobs` table until it has run.
#[derive(Clone)]
pub struct CronJobStore {
    scheduler: JobScheduler,
    store: Store,
    due_tx: mpsc::UnboundedSender<DueJob>,
    armed: Arc<Mutex<HashMap<JobHandle, Uuid>>>,
}

impl CronJobStore {
    pub fn new(
        scheduler: JobScheduler,
        store: Store,
        due_tx: mpsc::UnboundedSender<DueJob>,
    ) -> Self {
        Self {
            scheduler,
            store,
            due_tx,
            armed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn dispatch(&self, handle: JobHandle, spec: JobSpec) {
        if self.due_tx.send(DueJob { handle, spec }).is_err() {
            warn!("Job worker is gone; dropping due job");
        }
    }

    async fn arm(&self, handle: JobHandle, spec: JobSpec, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            self.dispatch(handle, spec);
            return Ok(());
        }

        let tx = self.due_tx.clone();
        let armed = self.armed.clone();
        let job_handle = handle.clone();
        let job_spec = spec.clone();

        let job = Job::new_one_shot_async(delay, move |_uuid, mut _l| {
            let tx = tx.clone();
            let armed = armed.clone();
            let handle = job_handle.clone();
            let spec = job_spec.clone();

            Box::pin(async move {
                armed.lock().await.remove(&handle);
                if tx.send(DueJob { handle, spec }).is_err() {
                    warn!("Job worker is gone; dropping due job");
                }
            })
        })?;

        // Registered before `add` so a short timer cannot fire ahead of the entry.
        self.armed.lock().await.insert(handle, job.guid());
        self.scheduler.add(job).await?;
        Ok(())
    }

    /// Re-arm jobs left in `pending_jobs` by a previous process under their
    /// original handles. Overdue jobs run immediately.
    pub async fn recover(&self) -> Result<usize> {
        let now = Utc::now();
        let mut recovered = 0;

        for row in self.store.list_pending_jobs().await? {
            let spec: JobSpec = match serde_json::from_str(&row.spec) {
                Ok(spec) => spec,
                Err(e) => {
                    warn!("Discarding unreadable pending job {}: {}", row.handle, e);
                    self.store.delete_pending_job(&row.handle).await?;
                    continue;
                }
            };
            let delay = (row.due_at - now).to_std().unwrap_or(Duration::ZERO);
            debug!(
                "Re-arming {} ({}) in {}s",
                row.handle,
                spec.label(),
                delay.as_secs()
            );
            self.arm(row.handle, spec, delay).await?;
            recovered += 1;
        }

        Ok(recovered)
    }
}

#[async_trait]
impl JobStore for CronJobStore {
    async fn enqueue(&self, spec: JobSpec) -> Result<()> {
        let handle = JobHandle::new();
        self.store
            .insert_pending_job(&handle, &serde_json::to_string(&spec)?, Utc::now())
            .await?;
        debug!("Enqueued {} as {}", spec.label(), handle);
        self.dispatch(handle, spec);
        Ok(())
    }

    async fn schedule(&self, spec: JobSpec, delay: Duration) -> Result<JobHandle> {
        let handle = JobHandle::new();
        let due_at = Utc::now() + chrono::Duration::from_std(delay)?;
        self.store
            .insert_pending_job(&handle, &serde_json::to_string(&spec)?, due_at)
            .await?;
        debug!(
            "Scheduled {} as {} in {}s",
            spec.label(),
            handle,
            delay.as_secs()
        );
        self.arm(handle.clone(), spec, delay).await?;
        Ok(handle)
    }

    async fn delete(&self, handle: &JobHandle) -> Result<()> {
        let removed = self.store.delete_pending_job(handle).await?;
        let timer = self.armed.lock().await.remove(handle);
        if let Some(job_id) = timer
            && let Err(e) = self.scheduler.remove(&job_id).await
        {
            warn!("Failed to disarm job {}: {}", handle, e);
        }
        if removed {
            debug!("Deleted job {}", handle);
        }
        Ok(())
    }

    async fn is_pending(&self, handle: &JobHandle) -> Result<bool> {
        self.store.is_pending_job(handle).await
    }

    async fn complete(&self, handle: &JobHandle) -> Result<()> {
        self.armed.lock().await.remove(handle);
        self.store.delete_pending_job(handle).await?;
        Ok(())
    }
}

#[async_trait]
impl LifecycleComponent for CronJobStore {
    async fn on_start(&mut self) -> Result<()> {
        let recovered = self.recover().await?;
        if recovered > 0 {
            info!("Recovered {} pending job(s) from the previous run", recovered);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn cron_store() -> (CronJobStore, mpsc::UnboundedReceiver<DueJob>, JobScheduler) {
        let scheduler = JobScheduler::new().await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Store::open_in_memory().unwrap();
        (
            CronJobStore::new(scheduler.clone(), store, tx),
            rx,
            scheduler,
        )
    }

    #[tokio::test]
    async fn enqueue_dispatches_immediately_and_persists_until_complete() {
        let (jobs, mut rx, _scheduler) = cron_store().await;
        jobs.enqueue(JobSpec::ResyncDayNight).await.unwrap();

        let due = rx.recv().await.unwrap();
        assert_eq!(due.spec, JobSpec::ResyncDayNight);
        assert!(jobs.is_pending(&due.handle).await.unwrap());

        jobs.complete(&due.handle).await.unwrap();
        assert!(!jobs.is_pending(&due.handle).await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_drops_the_row() {
        let (jobs, _rx, _scheduler) = cron_store().await;
        let handle = jobs
            .schedule(
                JobSpec::ClearOverlay {
                    camera_id: "c1".to_string(),
                },
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
        assert!(jobs.is_pending(&handle).await.unwrap());

        jobs.delete(&handle).await.unwrap();
        jobs.delete(&handle).await.unwrap();
        jobs.delete(&JobHandle::new()).await.unwrap();
        assert!(!jobs.is_pending(&handle).await.unwrap());
        assert!(jobs.armed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn recover_rearms_overdue_rows_under_their_handle() {
        let (jobs, mut rx, _scheduler) = cron_store().await;
        let handle = JobHandle::new();
        let spec = JobSpec::ClearOverlay {
            camera_id: "c9".to_string(),
        };
        jobs.store
            .insert_pending_job(
                &handle,
                &serde_json::to_string(&spec).unwrap(),
                Utc::now() - chrono::Duration::minutes(5),
            )
            .await
            .unwrap();
        jobs.store
            .insert_pending_job(&JobHandle::new(), "not json", Utc::now())
            .await
            .unwrap();

        assert_eq!(jobs.recover().await.unwrap(), 1);
        let due = rx.recv().await.unwrap();
        assert_eq!(due.handle, handle);
        assert_eq!(due.spec, spec);
        assert_eq!(jobs.store.list_pending_jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scheduled_job_fires_after_its_delay() {
        let (jobs, mut rx, mut scheduler) = cron_store().await;
        scheduler.start().await.unwrap();
        let handle = jobs
            .schedule(JobSpec::ResyncDayNight, Duration::from_millis(500))
            .await
            .unwrap();

        let due = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(due.handle, handle);
        scheduler.shutdown().await.unwrap();
    }
}
