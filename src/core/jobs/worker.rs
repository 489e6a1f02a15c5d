use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{DueJob, JobRunner, JobStore};
use crate::core::error::CoreError;
use crate::core::lifecycle::LifecycleComponent;

/// Pulls due jobs off the channel and runs each on its own task.
///
/// A job's error or panic is logged here and goes no further: siblings keep
/// running and the loop keeps consuming.
pub struct JobWorker {
    jobs: Arc<dyn JobStore>,
    runner: Arc<dyn JobRunner>,
    due_rx: Option<mpsc::UnboundedReceiver<DueJob>>,
    shutdown: CancellationToken,
    loop_handle: Option<JoinHandle<()>>,
}

impl JobWorker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        runner: Arc<dyn JobRunner>,
        due_rx: mpsc::UnboundedReceiver<DueJob>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            jobs,
            runner,
            due_rx: Some(due_rx),
            shutdown,
            loop_handle: None,
        }
    }

    /// Run one due job to completion, containing its failures.
    pub async fn execute(
        jobs: Arc<dyn JobStore>,
        runner: Arc<dyn JobRunner>,
        due: DueJob,
        cancel: CancellationToken,
    ) {
        match jobs.is_pending(&due.handle).await {
            Ok(false) => {
                debug!("Skipping job {}: deleted before it ran", due.handle);
                return;
            }
            Ok(true) => {}
            Err(e) => warn!("Could not check job {} before running: {}", due.handle, e),
        }

        let label = due.spec.label();
        let handle = due.handle.clone();
        let task = tokio::spawn(async move { runner.run(due, cancel).await });

        match task.await {
            Ok(Ok(())) => debug!("Job {} ({}) finished", handle, label),
            Ok(Err(e)) => match e.downcast_ref::<CoreError>() {
                Some(core) if core.is_device_failure() => {
                    warn!("Job {} ({}) failed: {}", handle, label, core)
                }
                _ => error!("Job {} ({}) failed: {:#}", handle, label, e),
            },
            Err(e) => error!("Job {} ({}) panicked: {}", handle, label, e),
        }

        if let Err(e) = jobs.complete(&handle).await {
            warn!("Failed to mark job {} complete: {}", handle, e);
        }
    }
}

#[async_trait]
impl LifecycleComponent for JobWorker {
    async fn on_start(&mut self) -> Result<()> {
        let Some(mut due_rx) = self.due_rx.take() else {
            return Ok(());
        };
        let jobs = self.jobs.clone();
        let runner = self.runner.clone();
        let shutdown = self.shutdown.clone();

        self.loop_handle = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    next = due_rx.recv() => {
                        let Some(due) = next else { break };
                        tokio::spawn(JobWorker::execute(
                            jobs.clone(),
                            runner.clone(),
                            due,
                            shutdown.child_token(),
                        ));
                    }
                }
            }
            info!("Job worker stopped");
        }));
        info!("Job worker started");
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(handle) = self.loop_handle.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::jobs::manual::ManualJobStore;
    use crate::core::jobs::{JobHandle, JobSpec};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedRunner {
        ran: Mutex<Vec<JobSpec>>,
    }

    #[async_trait]
    impl JobRunner for ScriptedRunner {
        async fn run(&self, job: DueJob, _cancel: CancellationToken) -> Result<()> {
            self.ran.lock().unwrap().push(job.spec.clone());
            match job.spec {
                JobSpec::ClearOverlay { camera_id } if camera_id == "boom" => {
                    panic!("device driver bug")
                }
                JobSpec::ClearOverlay { camera_id } if camera_id == "fail" => {
                    anyhow::bail!("device said no")
                }
                _ => Ok(()),
            }
        }
    }

    fn clear(camera_id: &str) -> DueJob {
        DueJob {
            handle: JobHandle::new(),
            spec: JobSpec::ClearOverlay {
                camera_id: camera_id.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn failing_and_panicking_jobs_are_contained() {
        let jobs = Arc::new(ManualJobStore::default());
        let runner = Arc::new(ScriptedRunner::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let mut worker = JobWorker::new(jobs.clone(), runner.clone(), rx, shutdown.clone());
        worker.on_start().await.unwrap();

        for due in [clear("boom"), clear("fail"), clear("ok")] {
            jobs.track(&due.handle);
            tx.send(due).unwrap();
        }

        for _ in 0..100 {
            if jobs.completed().len() == 3 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(jobs.completed().len(), 3);
        assert_eq!(runner.ran.lock().unwrap().len(), 3);

        worker.on_shutdown().await.unwrap();
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn deleted_job_is_skipped() {
        let jobs = Arc::new(ManualJobStore::default());
        let runner = Arc::new(ScriptedRunner::default());
        let due = clear("c1");
        jobs.track(&due.handle);
        jobs.delete(&due.handle).await.unwrap();

        JobWorker::execute(jobs.clone(), runner.clone(), due, CancellationToken::new()).await;
        assert!(runner.ran.lock().unwrap().is_empty());
    }
}
