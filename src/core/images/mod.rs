//! Deduplicating image retrieval queue.
//!
//! [`ImageRetrievalQueue::try_enqueue`] admits an id at most once while it is
//! pending; [`ImageRetriever`] is the single consumer that fetches the frame
//! and plate crop for each id, in order, one at a time.

pub mod source;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::lifecycle::LifecycleComponent;
use crate::core::store::Store;
use crate::core::store::types::PlateImageRecord;
use source::ImageSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    AlreadyQueued,
    Full,
}

/// Ids currently waiting in the queue. Check-and-insert is a single step.
pub struct AdmissionSet {
    ids: Mutex<HashSet<String>>,
    capacity: usize,
}

impl AdmissionSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: Mutex::new(HashSet::new()),
            capacity,
        }
    }

    pub fn try_admit(&self, id: &str) -> Admission {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        if ids.contains(id) {
            Admission::AlreadyQueued
        } else if ids.len() >= self.capacity {
            Admission::Full
        } else {
            ids.insert(id.to_string());
            Admission::Admitted
        }
    }

    pub fn release(&self, id: &str) {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[derive(Debug, Clone)]
pub struct ImageJob {
    pub openalpr_uuid: String,
}

pub struct ImageRetrievalQueue {
    admission: Arc<AdmissionSet>,
    tx: mpsc::UnboundedSender<ImageJob>,
    closed: AtomicBool,
}

impl ImageRetrievalQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::UnboundedReceiver<ImageJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            admission: Arc::new(AdmissionSet::new(capacity)),
            tx,
            closed: AtomicBool::new(false),
        };
        (queue, rx)
    }

    /// `false` means the id is already waiting (or the queue is full or
    /// closed); it is a normal outcome, not an error.
    pub fn try_enqueue(&self, openalpr_uuid: &str) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            debug!("Image queue closed; rejecting {}", openalpr_uuid);
            return false;
        }
        match self.admission.try_admit(openalpr_uuid) {
            Admission::Admitted => {}
            Admission::AlreadyQueued => {
                debug!("Image job {} already queued", openalpr_uuid);
                return false;
            }
            Admission::Full => {
                warn!("Image queue full; rejecting {}", openalpr_uuid);
                return false;
            }
        }

        let job = ImageJob {
            openalpr_uuid: openalpr_uuid.to_string(),
        };
        if self.tx.send(job).is_err() {
            self.admission.release(openalpr_uuid);
            return false;
        }
        true
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn pending(&self) -> usize {
        self.admission.len()
    }

    pub fn admission(&self) -> Arc<AdmissionSet> {
        self.admission.clone()
    }
}

/// `<root>/<yyyy>/<mm>/<dd>/<id>.jpg`
pub fn dated_image_path(root: &Path, openalpr_uuid: &str, at: DateTime<Utc>) -> PathBuf {
    root.join(at.format("%Y").to_string())
        .join(at.format("%m").to_string())
        .join(at.format("%d").to_string())
        .join(format!("{}.jpg", openalpr_uuid))
}

#[derive(Clone)]
pub struct RetrievalContext {
    pub store: Store,
    pub source: Arc<dyn ImageSource>,
    pub plate_dir: PathBuf,
    pub vehicle_dir: PathBuf,
}

impl RetrievalContext {
    async fn write_image(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Fetch and persist both images for one recognition.
    pub async fn retrieve(&self, openalpr_uuid: &str) -> Result<PlateImageRecord> {
        let agent = self.store.get_agent().await?;
        let now = Utc::now();

        let frame = self.source.fetch_frame(openalpr_uuid).await?;
        let vehicle_path = dated_image_path(&self.vehicle_dir, openalpr_uuid, now);
        Self::write_image(&vehicle_path, &frame).await?;

        let plate_path = match self.store.plate_coordinates(openalpr_uuid).await? {
            Some(coordinates) => {
                let crop = self.source.fetch_crop(openalpr_uuid, &coordinates).await?;
                let path = dated_image_path(&self.plate_dir, openalpr_uuid, now);
                Self::write_image(&path, &crop).await?;
                path.display().to_string()
            }
            None => {
                warn!("No plate coordinates for {}; skipping crop", openalpr_uuid);
                String::new()
            }
        };

        let record = PlateImageRecord {
            openalpr_uuid: openalpr_uuid.to_string(),
            plate_path,
            vehicle_path: vehicle_path.display().to_string(),
            is_compressed: agent.image_compression_enabled,
            scraped_at: now.to_rfc3339(),
        };
        self.store.record_plate_images(&record).await?;
        Ok(record)
    }
}

/// Single consumer of the image queue.
pub struct ImageRetriever {
    queue: Arc<ImageRetrievalQueue>,
    rx: Option<mpsc::UnboundedReceiver<ImageJob>>,
    context: RetrievalContext,
    shutdown: CancellationToken,
    loop_handle: Option<JoinHandle<()>>,
}

impl ImageRetriever {
    pub fn new(
        queue: Arc<ImageRetrievalQueue>,
        rx: mpsc::UnboundedReceiver<ImageJob>,
        context: RetrievalContext,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            rx: Some(rx),
            context,
            shutdown,
            loop_handle: None,
        }
    }

    async fn consume(
        mut rx: mpsc::UnboundedReceiver<ImageJob>,
        admission: Arc<AdmissionSet>,
        context: RetrievalContext,
        shutdown: CancellationToken,
    ) {
        loop {
            let job = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = rx.recv() => match next {
                    Some(job) => job,
                    None => break,
                },
            };
            // Released on dequeue: a repeat request is accepted while this one runs.
            admission.release(&job.openalpr_uuid);

            let ctx = context.clone();
            let id = job.openalpr_uuid.clone();
            let task = tokio::spawn(async move { ctx.retrieve(&id).await });
            match task.await {
                Ok(Ok(record)) => info!(
                    "Retrieved images for {} (compressed={})",
                    record.openalpr_uuid, record.is_compressed
                ),
                Ok(Err(e)) => error!("Image retrieval for {} failed: {:#}", job.openalpr_uuid, e),
                Err(e) => error!("Image retrieval for {} panicked: {}", job.openalpr_uuid, e),
            }
        }
        info!("Image retriever stopped");
    }
}

#[async_trait]
impl LifecycleComponent for ImageRetriever {
    async fn on_start(&mut self) -> Result<()> {
        let Some(rx) = self.rx.take() else {
            return Ok(());
        };
        self.loop_handle = Some(tokio::spawn(Self::consume(
            rx,
            self.queue.admission(),
            self.context.clone(),
            self.shutdown.clone(),
        )));
        info!("Image retriever started");
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        self.queue.close();
        self.shutdown.cancel();
        if let Some(handle) = self.loop_handle.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}
