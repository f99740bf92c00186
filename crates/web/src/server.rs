//! Web server implementation

use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use epubseal_common::{
    assertion::ManifestPayload, inspect_package, signing, Action, C2paTool, Config,
    ManifestEngine, Report, ReportFormat,
};

use crate::page;
use crate::reports::ReportStore;
use crate::upload::{self, sanitize_filename, UploadForm};

/// Web server state
#[derive(Clone)]
pub struct WebServer {
    state: Arc<WebServerState>,
}

struct WebServerState {
    config: Config,
    engine: Arc<dyn ManifestEngine>,
    reports: ReportStore,
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let engine = Arc::new(C2paTool::new(config.signer.clone()));
    let addr = config.server.listen;
    WebServer::new(config, engine).serve(addr).await
}

impl WebServer {
    /// Create a new web server
    pub fn new(config: Config, engine: Arc<dyn ManifestEngine>) -> Self {
        let reports = ReportStore::new(
            config.server.report_capacity,
            config.server.report_ttl_secs,
        )
        .with_artifact_root(config.storage.output_dir.clone());
        Self {
            state: Arc::new(WebServerState {
                config,
                engine,
                reports,
            }),
        }
    }

    /// Create router
    pub fn router(&self) -> Router {
        let body_limit = self.state.config.server.max_upload_bytes;

        Router::new()
            .route("/", get(index_handler).post(upload_handler))
            .route("/report/:report_id", get(report_export_handler))
            .route("/outputs/:report_id/:file_name", get(output_download_handler))
            .route("/api/health", get(health_handler))
            .fallback(not_found_handler)
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.state.config.storage.upload_dir).await?;
        tokio::fs::create_dir_all(&self.state.config.storage.output_dir).await?;

        // Expired reports are otherwise only dropped on the next insert.
        let sweeper = self.state.clone();
        let period = std::time::Duration::from_secs(
            self.state.config.server.report_ttl_secs.clamp(1, 60 * 60),
        );
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let purged = sweeper.reports.purge_expired().await;
                if purged > 0 {
                    info!("Purged {} expired reports", purged);
                }
            }
        });

        info!("Web console starting on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

async fn index_handler() -> Html<String> {
    Html(page::index(None))
}

async fn upload_handler(
    State(state): State<Arc<WebServerState>>,
    multipart: Multipart,
) -> Response {
    let form = match upload::receive(&state.config.storage.upload_dir, multipart).await {
        Ok(Some(form)) => form,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Html(page::index(Some("No file uploaded"))),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Upload rejected: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Html(page::index(Some(&format!("Upload failed: {}", e)))),
            )
                .into_response();
        }
    };

    let action = match form.action.as_deref().unwrap_or("").parse::<Action>() {
        Ok(action) => action,
        Err(_) => return Html(page::unknown_action(&form.file_name)).into_response(),
    };

    info!(
        "{} requested for {} ({} bytes)",
        action, form.file_name, form.size
    );

    let report = run_action(&state, action, &form).await;
    // Removes the upload directory.
    drop(form);
    state.reports.insert(report.clone()).await;

    Html(page::result(&report)).into_response()
}

/// Run one action against a stored upload and record the findings
async fn run_action(state: &WebServerState, action: Action, form: &UploadForm) -> Report {
    let mut report = Report::new(&form.file_name, action);

    match action {
        Action::Verify => match state.engine.read(&form.path).await {
            Ok(store) => report.validation = Some(store.validation()),
            Err(e) => report.error = Some(format!("Error reading manifest: {}", e)),
        },
        Action::Manifest => match state.engine.read(&form.path).await {
            Ok(store) => report.manifest = Some(store.active_manifest()),
            Err(e) => report.error = Some(format!("Error reading manifest: {}", e)),
        },
        Action::Sign => {
            let output_dir = state
                .reports
                .artifact_dir(&report.id)
                .unwrap_or_else(|| state.config.storage.output_dir.join(report.id.to_string()));
            match signing::sign_epub(
                state.engine.as_ref(),
                &form.path,
                &output_dir,
                &form.file_name,
                &state.config.manifest.claim_generator,
            )
            .await
            {
                Ok(outcome) => {
                    report.signed_output = outcome
                        .output
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned());
                    report.manifest = Some(outcome.active_manifest);
                    report.validation = Some(outcome.validation);
                    report.payload = Some(outcome.payload);
                }
                Err(e) => {
                    error!("Signing {} failed: {}", form.file_name, e);
                    report.error = Some(format!("Failed to sign manifest store: {}", e));
                }
            }
        }
        Action::Inspect => {
            let path = form.path.clone();
            let generator = state.config.manifest.claim_generator.clone();
            let inspected = tokio::task::spawn_blocking(move || {
                let package = inspect_package(&path)?;
                let payload = ManifestPayload::build(&path, &generator)?;
                Ok::<_, epubseal_common::Error>((package, payload))
            })
            .await;

            match inspected {
                Ok(Ok((package, payload))) => {
                    report.package = Some(package);
                    report.payload = Some(payload);
                }
                Ok(Err(e)) => report.error = Some(format!("Error inspecting EPUB: {}", e)),
                Err(e) => report.error = Some(format!("Task failed: {}", e)),
            }
        }
    }

    report
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    #[serde(default)]
    format: ReportFormat,
}

async fn report_export_handler(
    State(state): State<Arc<WebServerState>>,
    Path(report_id): Path<String>,
    Query(params): Query<ExportParams>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&report_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "invalid report id"})),
        )
            .into_response();
    };

    let Some(report) = state.reports.get(&id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "report not found"})),
        )
            .into_response();
    };

    let body = match report.export(params.format) {
        Ok(body) => body,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    };

    let content_type = match params.format {
        ReportFormat::Json => "application/json",
        ReportFormat::Text => "text/plain; charset=utf-8",
    };
    let disposition = format!(
        "attachment; filename=\"{}\"",
        report.export_name(params.format)
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

async fn output_download_handler(
    State(state): State<Arc<WebServerState>>,
    Path((report_id, file_name)): Path<(String, String)>,
) -> Response {
    if sanitize_filename(&file_name).as_deref() != Some(file_name.as_str()) {
        return (StatusCode::BAD_REQUEST, "Invalid file name").into_response();
    }
    let Ok(id) = Uuid::parse_str(&report_id) else {
        return (StatusCode::BAD_REQUEST, "Invalid report id").into_response();
    };

    // Only files recorded on a live report are served.
    let Some(report) = state.reports.get(&id).await else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };
    if report.signed_output.as_deref() != Some(file_name.as_str()) {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }
    let Some(dir) = state.reports.artifact_dir(&id) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    let full_path = dir.join(&file_name);
    match tokio::fs::read(&full_path).await {
        Ok(bytes) => {
            let mime = mime_for(&full_path);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", file_name),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

fn mime_for(path: &FsPath) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "epubseal-web",
        "version": epubseal_common::VERSION,
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
