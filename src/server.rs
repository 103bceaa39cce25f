//! Web server module.
//!
//! Serves the Prometheus exposition plus a few operational endpoints. Every
//! request to the metrics path runs one full scrape.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::config::DEFAULT_METRICS_PATH;
use crate::exposition::{content_type, encode_text};
use crate::scrape::{Exporter, ScrapeSummary};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub exporter: Arc<Exporter>,
    /// Path serving the exposition.
    pub metrics_path: String,
}

impl AppState {
    pub fn new(exporter: Arc<Exporter>) -> Self {
        Self {
            exporter,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
        }
    }

    pub fn with_metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    cluster: String,
}

/// Active collector listing.
#[derive(Serialize)]
struct CollectorsResponse {
    cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    site: Option<String>,
    collectors: Vec<String>,
    /// Metric families a scrape can produce.
    metrics: Vec<String>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let metrics_path = state.metrics_path.clone();
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(landing_handler))
        .route("/healthz", get(healthz_handler))
        .route("/api/collectors", get(collectors_handler))
        .route("/api/scrape", get(scrape_handler))
        .route(&metrics_path, get(metrics_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Landing page linking to the metrics path.
async fn landing_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>Isilon Exporter</title></head>\n<body>\n\
         <h1>Isilon Exporter</h1>\n<p>Cluster: {}</p>\n\
         <p><a href=\"{}\">Metrics</a></p>\n</body>\n</html>\n",
        state.exporter.identity().name,
        state.metrics_path
    ))
}

/// Liveness check.
async fn healthz_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        cluster: state.exporter.identity().name.clone(),
    })
}

/// Names of the collectors resolved at startup.
async fn collectors_handler(State(state): State<Arc<AppState>>) -> Json<CollectorsResponse> {
    let identity = state.exporter.identity();
    Json(CollectorsResponse {
        cluster: identity.name.clone(),
        site: identity.site.clone(),
        collectors: state.exporter.collector_names(),
        metrics: state
            .exporter
            .descriptors()
            .iter()
            .map(|d| d.fq_name().to_string())
            .collect(),
    })
}

/// Run one scrape and report per-collector outcomes as JSON.
async fn scrape_handler(State(state): State<Arc<AppState>>) -> Json<ScrapeSummary> {
    let report = state.exporter.scrape().await;
    Json(ScrapeSummary::from(&report))
}

/// Run one scrape and render it.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let report = state.exporter.scrape().await;
    match encode_text(&report) {
        Ok(body) => ([(header::CONTENT_TYPE, content_type())], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode scrape");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ClusterIdentity;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        let exporter = Exporter::new(Vec::new(), ClusterIdentity::new("c1", None));
        AppState::new(Arc::new(exporter))
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = create_router(create_test_state());
        let (status, body) = get_body(app, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"isilon_exporter_scrape_success{cluster="c1"} 1"#));
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let app = create_router(create_test_state().with_metrics_path("/stats"));
        let (status, _) = get_body(app.clone(), "/stats").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get_body(app, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_collectors_lists_metric_families() {
        let app = create_router(create_test_state());
        let (status, body) = get_body(app, "/api/collectors").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let metrics = json["metrics"].as_array().unwrap();
        assert!(metrics.contains(&serde_json::json!("isilon_exporter_scrape_success")));
        assert_eq!(metrics.len(), 4);
    }

    #[tokio::test]
    async fn test_scrape_summary_endpoint() {
        let app = create_router(create_test_state());
        let (status, body) = get_body(app, "/api/scrape").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["samples"], 2);
        assert!(json["collectors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_landing_page_links_metrics() {
        let app = create_router(create_test_state());
        let (status, body) = get_body(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"href="/metrics""#));
    }
}
