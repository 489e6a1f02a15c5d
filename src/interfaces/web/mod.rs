mod handlers;
mod router;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::engine::CameraUpdateService;
use crate::core::images::ImageRetrievalQueue;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::store::Store;

pub struct ApiServer {
    state: AppState,
    api_host: String,
    api_port: u16,
    shutdown: CancellationToken,
    serve_handle: Option<JoinHandle<()>>,
}

pub struct ApiServerConfig {
    pub service: Arc<CameraUpdateService>,
    pub images: Arc<ImageRetrievalQueue>,
    pub store: Store,
    pub log_tx: tokio::sync::broadcast::Sender<String>,
    pub api_host: String,
    pub api_port: u16,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) service: Arc<CameraUpdateService>,
    pub(crate) images: Arc<ImageRetrievalQueue>,
    pub(crate) store: Store,
    pub(crate) log_tx: tokio::sync::broadcast::Sender<String>,
    pub(crate) api_port: u16,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self {
            state: AppState {
                service: config.service,
                images: config.images,
                store: config.store,
                log_tx: config.log_tx,
                api_port: config.api_port,
            },
            api_host: config.api_host,
            api_port: config.api_port,
            shutdown: CancellationToken::new(),
            serve_handle: None,
        }
    }
}

// --- SSE Logs (used by router) ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(log) => Ok(Event::default().data(log)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Sse::new(stream)
}

// --- Lifecycle Implementations ---

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.api_host, self.api_port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let app = router::build_api_router(self.state.clone());
        let shutdown = self.shutdown.clone();

        self.serve_handle = Some(tokio::spawn(async move {
            info!("API Server running at http://{addr}");
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
            {
                tracing::error!("API Server crashed: {}", e);
            }
        }));
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server Interface shutting down...");
        self.shutdown.cancel();
        if let Some(handle) = self.serve_handle.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}
