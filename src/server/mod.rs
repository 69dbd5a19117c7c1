//! Web interface for document extraction.
//!
//! Provides:
//! - An upload form that redirects to a rendered result page
//! - A JSON API for programmatic processing
//! - A health endpoint

mod handlers;
mod routes;
mod store;
mod template_structs;
mod upload;

pub use routes::create_router;
pub use store::{ResultStore, StoredResult, DEFAULT_RESULT_CAPACITY, DEFAULT_RESULT_TTL};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Settings;
use crate::services::Pipeline;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub settings: Arc<Settings>,
    /// Results waiting to be viewed. Removed once shown or expired.
    pub results: Arc<RwLock<ResultStore>>,
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let pipeline = Pipeline::from_settings(settings)?;
        Ok(Self::with_pipeline(settings.clone(), pipeline))
    }

    pub fn with_pipeline(settings: Settings, pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            settings: Arc::new(settings),
            results: Arc::new(RwLock::new(ResultStore::default())),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
