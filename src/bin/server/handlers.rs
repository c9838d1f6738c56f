//! HTTP Handlers for the SA Exporter server
//!
//! This module contains the scrape, readiness and health endpoints, and the
//! router wiring them together.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use sa_exporter::{Error, PrometheusExporter};
use serde::Serialize;
use tracing::{error, info};

/// Paths served by fixed handlers
const RESERVED_PATHS: [&str; 2] = ["/ready", "/health"];

// =============================================================================
// Application State
// =============================================================================

/// Shared application state
pub struct AppState {
    pub exporter: PrometheusExporter,
    pub metrics_path: String,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

// =============================================================================
// Handlers
// =============================================================================

/// Run one aggregation cycle and return the exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let started = Instant::now();

    match state.exporter.export_http().await {
        Ok((body, content_type)) => {
            info!(
                duration_ms = started.elapsed().as_millis() as u64,
                "Collect finished"
            );
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => {
            error!(error = %e, "Metrics export failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Landing page for readiness checks
pub async fn ready(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>SA Exporter</title></head>\n\
         <body>\n\
         <h1>SA Exporter is ready to rock</h1>\n\
         <p><a href=\"{}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        state.metrics_path
    ))
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// =============================================================================
// Router
// =============================================================================

/// Normalize the telemetry path and reject clashes with fixed routes
pub fn normalize_metrics_path(path: &str) -> Result<String, Error> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        return Err(Error::Configuration(format!(
            "invalid telemetry path {path:?}"
        )));
    }

    let normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };

    if RESERVED_PATHS.contains(&normalized.as_str()) {
        return Err(Error::Configuration(format!(
            "telemetry path {normalized} clashes with a built-in route"
        )));
    }
    Ok(normalized)
}

/// Build the router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.metrics_path, get(metrics))
        .route("/ready", get(ready))
        .route("/health", get(health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sa_exporter::error::QueryError;
    use sa_exporter::types::Sample;
    use sa_exporter::{
        AvailabilityEngine, PrometheusConfig, QueryBackend, ServiceRecord, ServiceType, Topology,
    };
    use std::net::SocketAddr;

    /// Backend with every declared endpoint ready
    struct AllReady {
        up: bool,
    }

    #[async_trait]
    impl QueryBackend for AllReady {
        async fn query(&self, expression: &str) -> Result<Vec<Sample>, QueryError> {
            if !self.up {
                return Err(QueryError::Malformed("backend down".to_string()));
            }
            if expression.starts_with("up{") || expression.contains("ready=\"false\"") {
                return Ok(Vec::new());
            }
            let endpoint = if expression.contains("Wheel|") {
                "Wheel"
            } else {
                "Motor"
            };
            Ok(vec![Sample::new(2.0).with_label("endpoint", endpoint)])
        }
    }

    fn state(up: bool) -> Arc<AppState> {
        let topology = Topology::build(&[
            ServiceRecord::new("Car", ServiceType::Interactive, ["Wheel"]),
            ServiceRecord::new("Car", ServiceType::Batch, ["Motor"]),
        ])
        .unwrap();
        let engine = AvailabilityEngine::builder()
            .with_topology(topology)
            .with_backend(AllReady { up })
            .build()
            .unwrap();
        let exporter = PrometheusExporter::new(
            PrometheusConfig {
                include_self_metrics: false,
                ..Default::default()
            },
            Arc::new(engine),
        )
        .unwrap();

        Arc::new(AppState {
            exporter,
            metrics_path: "/metrics".to_string(),
        })
    }

    async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        addr
    }

    #[test]
    fn test_normalize_metrics_path() {
        assert_eq!(normalize_metrics_path("/metrics").unwrap(), "/metrics");
        assert_eq!(normalize_metrics_path("sa").unwrap(), "/sa");
        assert!(normalize_metrics_path("").is_err());
        assert!(normalize_metrics_path("/").is_err());
        assert!(normalize_metrics_path("/ready").is_err());
        assert!(normalize_metrics_path("health").is_err());
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let addr = spawn_server(state(true)).await;
        let response = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.contains("version=0.0.4"));

        let body = response.text().await.unwrap();
        assert!(body.contains("sa_prom_up{dependancy=\"prometheus\"} 1"));
        assert!(body.contains("sa_service_overall{product=\"Car\"} 1"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint_dependency_down() {
        let addr = spawn_server(state(false)).await;
        let body = reqwest::get(format!("http://{addr}/metrics"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(body.contains("sa_prom_up{dependancy=\"prometheus\"} 0"));
        assert!(!body.contains("sa_service"));
    }

    #[tokio::test]
    async fn test_ready_page() {
        let addr = spawn_server(state(true)).await;
        let body = reqwest::get(format!("http://{addr}/ready"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(body.contains("SA Exporter is ready to rock"));
        assert!(body.contains("href=\"/metrics\""));
    }

    #[tokio::test]
    async fn test_health() {
        let addr = spawn_server(state(true)).await;
        let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
