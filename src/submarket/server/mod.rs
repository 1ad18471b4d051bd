// SPDX-License-Identifier: MIT

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::submarket::input::ReportRequest;
use crate::submarket::pipeline::ReportPipeline;

/// Shown to clients for any failure past validation; details go to the log
pub const GENERIC_FAILURE: &str = "An error occurred during report generation.";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<ReportPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<ReportPipeline>) -> Self {
        Self { pipeline }
    }
}

/// Routes for the report API. Rendered files under `output_dir` are served at `/reports`.
pub fn router(state: AppState, output_dir: &Path) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/reports", post(create_report))
        .nest_service("/reports", ServeDir::new(output_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(
    state: AppState,
    output_dir: PathBuf,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state, &output_dir);
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct ReportForm {
    #[serde(default)]
    address: String,
    #[serde(default)]
    property_type: String,
}

async fn create_report(
    State(state): State<AppState>,
    Json(form): Json<ReportForm>,
) -> (StatusCode, Json<Value>) {
    let request = match ReportRequest::parse(&form.address, &form.property_type) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("Rejected report request: {}", e);
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    match state.pipeline.generate(&request).await {
        Ok(report) => {
            let file_name = report
                .output_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (
                StatusCode::OK,
                Json(json!({
                    "output_path": report.output_path.to_string_lossy(),
                    "download_url": format!("/reports/{}", file_name),
                    "generated_at": report.generated_at.to_rfc3339(),
                })),
            )
        }
        Err(e) => {
            log::error!(
                "Report generation for '{}' failed: {:?}",
                request.address,
                e
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": GENERIC_FAILURE })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submarket::config::Settings;
    use crate::submarket::pipeline::tests::{components_with, unreachable_components};
    use crate::submarket::pipeline::PipelineComponents;
    use crate::submarket::render::PdfRenderer;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(components: PipelineComponents, output_dir: &Path) -> Router {
        let pipeline = ReportPipeline::new(&components, &Settings::default()).unwrap();
        router(AppState::new(Arc::new(pipeline)), output_dir)
    }

    fn post_report(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/reports")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(unreachable_components(), dir.path());
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_report_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(PdfRenderer::new(dir.path()));
        let app = app(components_with(renderer), dir.path());

        let response = app
            .clone()
            .oneshot(post_report(json!({
                "address": "123 Main St, Austin, TX 78701",
                "property_type": "Single Family"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let url = body["download_url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/reports/final_report_"));
        let output_path = body["output_path"].as_str().unwrap();
        assert!(Path::new(output_path).exists());

        let download = app
            .oneshot(Request::get(url.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(download.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(download.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_invalid_address_is_422() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(unreachable_components(), dir.path())
            .oneshot(post_report(json!({
                "address": "123 Main St Austin TX",
                "property_type": "Condo"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("Street Address, City, ST ZIP"));
    }

    #[tokio::test]
    async fn test_missing_property_type_is_422() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(unreachable_components(), dir.path())
            .oneshot(post_report(json!({"address": "123 Main St, Austin, TX 78701"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Property Type is required"})
        );
    }

    #[tokio::test]
    async fn test_pipeline_failure_is_generic_500() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(unreachable_components(), dir.path())
            .oneshot(post_report(json!({
                "address": "123 Main St, Austin, TX 78701",
                "property_type": "Condo"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({"error": GENERIC_FAILURE}));
    }
}
