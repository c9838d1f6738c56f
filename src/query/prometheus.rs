//! Prometheus HTTP API client
//!
//! Issues instant queries against `/api/v1/query` and decodes `vector` and
//! `scalar` results into [`Sample`]s.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::QueryBackend;
use crate::config::PrometheusSettings;
use crate::error::{Error, QueryError, Result};
use crate::types::Sample;

/// Longest response body kept in a [`QueryError::Status`]
const MAX_ERROR_BODY: usize = 512;

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    value: (f64, String),
}

// =============================================================================
// Client
// =============================================================================

/// Query backend talking to a Prometheus server
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: Client,
    query_url: Url,
    auth: Option<(String, String)>,
}

impl PrometheusClient {
    /// Create a client from connection settings
    pub fn new(settings: &PrometheusSettings) -> Result<Self> {
        let base = Url::parse(&settings.base_url())
            .map_err(|e| Error::Configuration(format!("invalid Prometheus endpoint: {e}")))?;
        let query_url = base
            .join("api/v1/query")
            .map_err(|e| Error::Configuration(format!("invalid Prometheus endpoint: {e}")))?;

        let auth = settings
            .basic_auth()
            .map(|(user, password)| (user.to_string(), password.to_string()));
        if auth.is_none() {
            tracing::info!(
                "PROMETHEUS_AUTH_USER and/or PROMETHEUS_AUTH_PWD not set, basic auth disabled"
            );
        }

        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            query_url,
            auth,
        })
    }

    /// Full URL of the instant query endpoint
    pub fn query_url(&self) -> &Url {
        &self.query_url
    }
}

#[async_trait]
impl QueryBackend for PrometheusClient {
    async fn query(&self, expression: &str) -> std::result::Result<Vec<Sample>, QueryError> {
        let mut request = self
            .client
            .get(self.query_url.clone())
            .query(&[("query", expression)]);
        if let Some((user, password)) = &self.auth {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        decode_response(status, &body)
    }
}

// =============================================================================
// Decoding
// =============================================================================

fn decode_response(status: StatusCode, body: &str) -> std::result::Result<Vec<Sample>, QueryError> {
    let response: ApiResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(_) if !status.is_success() => {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: truncate(body, MAX_ERROR_BODY),
            });
        }
        Err(e) => return Err(QueryError::Malformed(e.to_string())),
    };

    if response.status != "success" {
        return Err(QueryError::Api {
            error_type: response.error_type.unwrap_or_default(),
            message: response.error.unwrap_or_default(),
        });
    }

    let data = response
        .data
        .ok_or_else(|| QueryError::Malformed("missing data".to_string()))?;

    match data.result_type.as_str() {
        "vector" => {
            let rows: Vec<VectorSample> = serde_json::from_value(data.result)
                .map_err(|e| QueryError::Malformed(e.to_string()))?;
            rows.into_iter()
                .map(|row| {
                    Ok(Sample {
                        labels: row.metric,
                        value: parse_value(&row.value.1)?,
                    })
                })
                .collect()
        }
        "scalar" => {
            let (_, value): (f64, String) = serde_json::from_value(data.result)
                .map_err(|e| QueryError::Malformed(e.to_string()))?;
            Ok(vec![Sample::new(parse_value(&value)?)])
        }
        other => Err(QueryError::UnsupportedResultType(other.to_string())),
    }
}

fn parse_value(raw: &str) -> std::result::Result<f64, QueryError> {
    raw.parse::<f64>()
        .map_err(|_| QueryError::Malformed(format!("invalid sample value {raw:?}")))
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}
