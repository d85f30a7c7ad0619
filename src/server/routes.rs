//! Route handlers
//!
//! `GET /` serves the input form, `POST /download` resolves a batch and
//! streams back either the single file or a zip bundle.

use std::path::PathBuf;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::info;

use super::errors::AppError;
use crate::package::{package_blocking, Package};
use crate::service::{BatchRequest, FetchService};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: FetchService,
    /// Where zip bundles are written
    pub bundle_dir: PathBuf,
}

/// Form fields of `POST /download`
#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    pub urls: String,
    pub quality: String,
    #[serde(default = "default_only_audio")]
    pub only_audio: String,
}

fn default_only_audio() -> String {
    "off".to_string()
}

impl From<DownloadForm> for BatchRequest {
    fn from(form: DownloadForm) -> Self {
        BatchRequest {
            audio_only: form.only_audio == "on",
            urls: form.urls,
            quality: form.quality,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/download", post(download))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn download(
    State(state): State<AppState>,
    Form(form): Form<DownloadForm>,
) -> Result<Response, AppError> {
    let batch = BatchRequest::from(form);
    let outcome = state.service.resolve_batch(&batch).await?;
    let package = package_blocking(outcome.files, state.bundle_dir.clone()).await?;

    info!(
        filename = %package.filename,
        path = %package.path.display(),
        "Sending download"
    );
    file_response(&package).await
}

/// Stream a packaged file from disk as an attachment
async fn file_response(package: &Package) -> Result<Response, AppError> {
    let file = tokio::fs::File::open(&package.path).await?;
    let len = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, package.content_type.to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&package.filename)),
        ],
        body,
    )
        .into_response())
}

/// `attachment; filename="..."` with anything outside printable ASCII,
/// quotes and backslashes replaced
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}
