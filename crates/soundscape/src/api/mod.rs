//! HTTP API for soundscape.
//!
//! An axum router exposing sound records under `/api/sounds`, aggregates
//! under `/api/analytics` and the stored audio under `/uploads`. Every JSON
//! response is wrapped in an [`Envelope`].

pub mod analytics;
pub mod envelope;
pub mod error;
pub mod health;
pub mod sounds;

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use crate::analytics::Aggregator;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::upload::{UploadPolicy, UploadStore};

pub use envelope::Envelope;
pub use error::ApiError;

/// Room for the non-file form fields on top of the audio size limit.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    storage: Arc<Mutex<Storage>>,
    uploads: Arc<UploadStore>,
    aggregator: Arc<Aggregator>,
}

impl AppState {
    /// Create the shared state.
    #[must_use]
    pub fn new(storage: Storage, uploads: UploadStore, aggregator: Aggregator) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            uploads: Arc::new(uploads),
            aggregator: Arc::new(aggregator),
        }
    }

    /// Open the configured database and uploads directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage = Storage::open(config.database_path())?;
        let policy = UploadPolicy {
            allowed: config.allowed_formats(),
            max_bytes: config.upload.max_upload_bytes,
        };
        let uploads = UploadStore::new(config.upload_dir(), policy);
        Ok(Self::new(
            storage,
            uploads,
            Aggregator::new(config.analytics.clone()),
        ))
    }

    /// Lock the database for the duration of one handler step.
    ///
    /// The guard must be dropped before the handler awaits again.
    ///
    /// # Errors
    ///
    /// Returns a 500 if a previous holder panicked.
    pub fn storage(&self) -> std::result::Result<MutexGuard<'_, Storage>, ApiError> {
        self.storage
            .lock()
            .map_err(|_| ApiError::internal("storage mutex poisoned"))
    }

    /// The audio file store.
    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    /// Shared handle to the upload store, for work moved off the runtime.
    #[must_use]
    pub fn shared_uploads(&self) -> Arc<UploadStore> {
        Arc::clone(&self.uploads)
    }

    /// The configured aggregator.
    #[must_use]
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }
}

/// Build the application router.
///
/// `frontend_url` is the only origin CORS lets through.
///
/// # Errors
///
/// Returns a configuration error if `frontend_url` is not a valid origin.
pub fn build_router(state: AppState, frontend_url: &str) -> Result<Router> {
    let origin = HeaderValue::from_str(frontend_url.trim_end_matches('/')).map_err(|_| {
        Error::ConfigValidation {
            message: format!("server.frontend_url is not a valid origin: {frontend_url}"),
        }
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let body_limit = usize::try_from(state.uploads.policy().max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);
    let upload_dir = ServeDir::new(state.uploads.dir());

    let api = Router::new()
        .route(
            "/sounds",
            get(sounds::list_sounds)
                .post(sounds::create_sound)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/sounds/:id",
            get(sounds::get_sound)
                .put(sounds::update_sound)
                .delete(sounds::delete_sound),
        )
        .route("/sounds/:id/tags", post(sounds::add_tag))
        .merge(analytics::analytics_routes())
        .merge(health::health_routes());

    Ok(Router::new()
        .nest("/api", api)
        .nest_service("/uploads", upload_dir)
        .fallback(not_found)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        ))
}

async fn not_found() -> ApiError {
    ApiError::not_found("endpoint not found")
}

/// Serve the API until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the state cannot be built, the address cannot be
/// bound, or the server fails.
pub async fn serve(config: &Config) -> Result<()> {
    let addr = config.bind_addr()?;
    let state = AppState::from_config(config)?;
    let app = build_router(state, &config.server.frontend_url)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
