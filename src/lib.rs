pub mod api;
pub mod config;
pub mod services;

use crate::config::RelayConfig;
use crate::services::converter::{FfmpegConverter, MediaConverter};
use crate::services::forwarder::{Forwarder, HttpForwarder};
use crate::services::pipeline::UploadPipeline;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::welcome::welcome,
        api::handlers::upload::upload_audio,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::upload::UploadForm,
            api::handlers::health::HealthResponse,
            api::error::ErrorResponse,
        )
    ),
    tags(
        (name = "relay", description = "Audio upload, conversion and forwarding"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<UploadPipeline>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        converter: Arc<dyn MediaConverter>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        let pipeline = UploadPipeline::new(converter, forwarder, config.temp_dir.clone());
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }

    /// Wire the real ffmpeg converter and HTTP forwarder from configuration.
    pub fn from_config(config: RelayConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        let converter = FfmpegConverter::new(config.converter_path.clone())
            .with_timeout(config.convert_timeout);
        let forwarder = HttpForwarder::new(client, config.forward_url.clone())
            .with_timeout(config.forward_timeout);

        Ok(Self::new(config, Arc::new(converter), Arc::new(forwarder)))
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::handlers::welcome::welcome))
        .route("/health", get(api::handlers::health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route(
            "/upload",
            post(api::handlers::upload::upload_audio)
                .layer(DefaultBodyLimit::max(state.config.max_upload_size)),
        )
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(api::error::ErrorResponse {
            error: "Internal Server Error".to_string(),
        }),
    )
        .into_response()
}
