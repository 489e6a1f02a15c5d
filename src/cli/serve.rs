use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::info;

use super::RunArgs;
use crate::core::config::AppConfig;
use crate::core::device::HttpDeviceFactory;
use crate::core::engine::{CameraUpdateHooks, CameraUpdateService, EngineSettings};
use crate::core::images::source::AgentImageSource;
use crate::core::images::{ImageRetrievalQueue, ImageRetriever, RetrievalContext};
use crate::core::jobs::cron_store::CronJobStore;
use crate::core::jobs::worker::JobWorker;
use crate::core::lifecycle::LifecycleManager;
use crate::core::store::Store;
use crate::core::store::types::AgentRecord;
use crate::core::terminal;
use crate::interfaces::web::{ApiServer, ApiServerConfig};
use crate::logging;

/// Wire every component, run until Ctrl+C, then stop in reverse order.
pub async fn run(args: RunArgs) -> Result<()> {
    let log_tx = logging::init(args.verbose);

    let mut config = AppConfig::load(args.config.as_deref()).await?;
    if let Some(host) = args.api_host {
        config.server.host = host;
    }
    if let Some(port) = args.api_port {
        config.server.port = port;
    }

    let store = Store::open(config.database_path()).await?;
    if let Some(seed) = &config.agent {
        store
            .update_agent(&AgentRecord {
                latitude: seed.latitude,
                longitude: seed.longitude,
                image_compression_enabled: seed.image_compression,
            })
            .await?;
        info!(
            "Agent seeded at ({}, {}) from config",
            seed.latitude, seed.longitude
        );
    }

    let mut lifecycle = LifecycleManager::new().await?;
    let shutdown = lifecycle.shutdown_token.clone();

    let (due_tx, due_rx) = mpsc::unbounded_channel();
    let job_store = CronJobStore::new(lifecycle.scheduler.clone(), store.clone(), due_tx);
    let jobs = Arc::new(job_store.clone());

    let devices = Arc::new(HttpDeviceFactory::new(config.device_timeout())?);
    let service = Arc::new(CameraUpdateService::new(
        store.clone(),
        jobs.clone(),
        devices,
        EngineSettings {
            clear_delay: config.clear_delay(),
            device_timeout: config.device_timeout(),
        },
    ));

    let worker = JobWorker::new(jobs, service.clone(), due_rx, shutdown.clone());
    let hooks = CameraUpdateHooks::new(
        service.clone(),
        lifecycle.scheduler.clone(),
        config.daynight.resync_cron.clone(),
        shutdown.clone(),
    );

    let (queue, image_rx) = ImageRetrievalQueue::new(config.images.queue_capacity);
    let queue = Arc::new(queue);
    let retriever = ImageRetriever::new(
        queue.clone(),
        image_rx,
        RetrievalContext {
            store: store.clone(),
            source: Arc::new(AgentImageSource::new(
                &config.images.agent_url,
                config.device_timeout(),
            )?),
            plate_dir: config.plate_images_dir(),
            vehicle_dir: config.vehicle_images_dir(),
        },
        shutdown.clone(),
    );

    let api = ApiServer::new(ApiServerConfig {
        service,
        images: queue,
        store,
        log_tx,
        api_host: config.server.host.clone(),
        api_port: config.server.port,
    });

    // Stop order is the reverse: API first, job store last.
    lifecycle.attach(Arc::new(Mutex::new(job_store)));
    lifecycle.attach(Arc::new(Mutex::new(worker)));
    lifecycle.attach(Arc::new(Mutex::new(hooks)));
    lifecycle.attach(Arc::new(Mutex::new(retriever)));
    lifecycle.attach(Arc::new(Mutex::new(api)));

    lifecycle.start().await?;
    info!("Lifecycle state: {:?}", lifecycle.state());
    terminal::print_success("camsync is running. Press Ctrl+C to stop.");
    terminal::print_link(
        "API",
        &format!("http://{}:{}", config.server.host, config.server.port),
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down camsync...");
    lifecycle.shutdown().await?;
    terminal::print_goodbye();
    Ok(())
}
