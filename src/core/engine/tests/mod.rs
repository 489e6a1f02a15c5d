mod daynight;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{CameraUpdateService, EngineSettings};
use crate::core::device::Manufacturer;
use crate::core::device::testing::RecordingFactory;
use crate::core::jobs::manual::{ManualJobStore, ScheduledJob};
use crate::core::jobs::{DueJob, JobHandle, JobRunner, JobStore};
use crate::core::store::Store;
use crate::core::store::types::{AgentRecord, CameraRecord};

pub const LONDON: (f64, f64) = (51.5074, -0.1278);
pub const TROMSO: (f64, f64) = (69.6492, 18.9553);

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// Settable wall clock shared with the service under test.
#[derive(Clone)]
pub struct TestClock(Arc<AtomicI64>);

impl TestClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Arc::new(AtomicI64::new(at.timestamp_millis())))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.0.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0.load(Ordering::SeqCst)).unwrap()
    }
}

pub struct Harness {
    pub service: Arc<CameraUpdateService>,
    pub jobs: Arc<ManualJobStore>,
    pub devices: Arc<RecordingFactory>,
    pub store: Store,
    pub clock: TestClock,
}

impl Harness {
    pub async fn new(site: (f64, f64), now: DateTime<Utc>) -> Self {
        let store = Store::open_in_memory().unwrap();
        store
            .update_agent(&AgentRecord {
                latitude: site.0,
                longitude: site.1,
                image_compression_enabled: false,
            })
            .await
            .unwrap();

        let jobs = Arc::new(ManualJobStore::default());
        let devices = Arc::new(RecordingFactory::default());
        let clock = TestClock::new(now);
        let service_clock = clock.clone();
        let service = CameraUpdateService::new(
            store.clone(),
            jobs.clone(),
            devices.clone(),
            EngineSettings {
                clear_delay: Duration::from_secs(5),
                device_timeout: Duration::from_millis(200),
            },
        )
        .with_clock(Arc::new(move || service_clock.now()));

        Self {
            service: Arc::new(service),
            jobs,
            devices,
            store,
            clock,
        }
    }

    pub async fn add_camera(&self, id: &str, day_night: bool) -> CameraRecord {
        let mut camera = CameraRecord::new(id, Manufacturer::Hikvision);
        camera.name = format!("{} lane", id);
        camera.update_day_night_mode_enabled = day_night;
        self.store.upsert_camera(&camera).await.unwrap();
        camera
    }

    pub async fn camera(&self, id: &str) -> CameraRecord {
        self.store.get_camera(id).await.unwrap().unwrap()
    }

    /// Run everything enqueued so far, in order. Returns how many ran.
    pub async fn run_enqueued(&self) -> usize {
        let due = self.jobs.take_enqueued();
        let count = due.len();
        for job in due {
            let handle = job.handle.clone();
            let _ = self.service.run(job, CancellationToken::new()).await;
            self.jobs.complete(&handle).await.unwrap();
        }
        count
    }

    pub fn scheduled(&self, handle: &JobHandle) -> ScheduledJob {
        self.jobs
            .scheduled()
            .into_iter()
            .find(|job| &job.handle == handle)
            .expect("job was scheduled")
    }

    /// Advance the clock to the job's due time and run it like the worker would.
    pub async fn fire(&self, handle: &JobHandle) -> Result<()> {
        let job = self.scheduled(handle);
        let due_at = self.clock.now() + chrono::Duration::from_std(job.delay).unwrap();
        self.clock.set(due_at);
        let outcome = self
            .service
            .run(
                DueJob {
                    handle: job.handle.clone(),
                    spec: job.spec,
                },
                CancellationToken::new(),
            )
            .await;
        self.jobs.complete(handle).await.unwrap();
        outcome
    }
}
