//! HTTP API for generating, publishing and reading posts

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use eyre::Result;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::backend::{self, Backend, Provider};
use crate::config::Config;
use crate::generate::{self, GeneratedPost};
use crate::posts::{Post, PostStore, PublishError};
use crate::summarize::Summarizer;
use crate::youtube::{VideoSource, YouTubeClient};

/// Builds the backend for a requested provider
pub type BackendFactory = Arc<dyn Fn(Provider) -> Box<dyn Backend> + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn VideoSource>,
    pub backends: BackendFactory,
    pub default_provider: Provider,
    pub summary_concurrency: usize,
    pub store: PostStore,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        let source = Arc::new(YouTubeClient::from_config(client.clone(), config));

        let backend_config = config.clone();
        let backends: BackendFactory =
            Arc::new(move |provider| backend::create_backend(provider, &backend_config, client.clone()));

        let default_provider = Provider::select(config.default_provider.as_deref(), Provider::default());

        Ok(Self {
            source,
            backends,
            default_provider,
            summary_concurrency: config.summary_concurrency(),
            store: PostStore::new(config.posts_dir()),
        })
    }

    pub fn summarizer(&self, requested: Option<&str>) -> Summarizer {
        let provider = Provider::select(requested, self.default_provider);
        Summarizer::new((self.backends)(provider))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub youtube_url: String,
    pub ai_provider: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub video_id: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub success: bool,
    pub filename: String,
    pub video_id: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/generate-post", post(generate_handler))
        .route("/api/publish-post", post(publish_handler))
        .route("/api/posts", get(list_posts_handler))
        .route("/api/posts/:id", get(get_post_handler))
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{bind}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn generate_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GeneratedPost>, ApiError> {
    let Json(req) = payload?;
    let summarizer = state.summarizer(req.ai_provider.as_deref());
    let source = state.source.clone();
    let url = req.youtube_url;
    let concurrency = state.summary_concurrency;

    // a panic inside the pipeline comes back as a JoinError
    let task = tokio::spawn(async move {
        generate::generate_post(source.as_ref(), &summarizer, &url, concurrency).await
    });

    match task.await {
        Ok(Ok(post)) => Ok(Json(post)),
        Ok(Err(e)) => Err(ApiError::BadRequest(e.to_string())),
        Err(e) => {
            error!("Post generation crashed: {e}");
            Err(ApiError::Internal("failed to generate post"))
        }
    }
}

async fn publish_handler(
    State(state): State<AppState>,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<Json<PublishResponse>, ApiError> {
    let Json(req) = payload?;
    match state
        .store
        .publish(&req.markdown, &req.video_id, req.description.as_deref())
    {
        Ok(filename) => Ok(Json(PublishResponse {
            success: true,
            filename,
            video_id: req.video_id.trim().to_string(),
        })),
        Err(e @ (PublishError::Io(_) | PublishError::FrontMatter(_))) => {
            error!("Publishing {} failed: {e}", req.video_id);
            Err(ApiError::Internal("failed to publish post"))
        }
        Err(e) => Err(ApiError::BadRequest(e.to_string())),
    }
}

async fn list_posts_handler(State(state): State<AppState>) -> Result<Json<Vec<Post>>, ApiError> {
    state.store.list().map(Json).map_err(|e| {
        error!("Listing posts failed: {e}");
        ApiError::Internal("failed to list posts")
    })
}

async fn get_post_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Post>, ApiError> {
    state.store.get(&id).map(Json).map_err(|e| {
        error!("Reading post {id} failed: {e}");
        ApiError::Internal("failed to read post")
    })
}
