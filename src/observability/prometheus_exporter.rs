//! Prometheus exposition of availability gauges
//!
//! Every scrape runs one engine cycle and encodes the resulting
//! [`CycleReport`] into a fresh registry, so series from a previous cycle
//! never leak into the next one.

use std::sync::Arc;
use std::time::Instant;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use super::self_metrics::SelfMetrics;
use crate::engine::{AvailabilityEngine, CycleReport};
use crate::error::Result;
use crate::types::ServiceType;

/// Content type of the text exposition format
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Dependency label name of the up gauge
///
/// Spelling kept as-is; existing dashboards select on it.
pub const DEPENDENCY_LABEL: &str = "dependancy";

/// Configuration for Prometheus exporter
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Namespace prefixed to every availability gauge (default: "sa")
    pub namespace: String,
    /// Append the exporter's own metrics to each exposition
    pub include_self_metrics: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            namespace: "sa".to_string(),
            include_self_metrics: true,
        }
    }
}

/// Prometheus metrics exporter
///
/// Formats availability gauges in the text exposition format for scraping by
/// Prometheus or compatible monitoring systems.
pub struct PrometheusExporter {
    /// Configuration
    config: PrometheusConfig,
    /// Engine run on every scrape
    engine: Arc<AvailabilityEngine>,
    /// Exporter's own counters, when enabled
    self_metrics: Option<Arc<SelfMetrics>>,
}

impl PrometheusExporter {
    /// Create a new Prometheus exporter
    pub fn new(config: PrometheusConfig, engine: Arc<AvailabilityEngine>) -> Result<Self> {
        let self_metrics = if config.include_self_metrics {
            Some(Arc::new(SelfMetrics::new()?))
        } else {
            None
        };

        Ok(Self {
            config,
            engine,
            self_metrics,
        })
    }

    /// Run one cycle and export it in Prometheus text format
    pub async fn export(&self) -> Result<String> {
        let started = Instant::now();
        let report = self.engine.run_cycle().await;
        if let Some(self_metrics) = &self.self_metrics {
            self_metrics.observe_cycle(&report, started.elapsed());
        }

        let mut output = self.encode_report(&report)?;
        if let Some(self_metrics) = &self.self_metrics {
            output.push_str(&self_metrics.export()?);
        }

        Ok(output)
    }

    /// Export metrics as HTTP response body with correct content type
    pub async fn export_http(&self) -> Result<(String, &'static str)> {
        let body = self.export().await?;
        Ok((body, TEXT_CONTENT_TYPE))
    }

    /// Encode a cycle report as availability gauges
    ///
    /// When the dependency is down only the up gauge is emitted.
    pub fn encode_report(&self, report: &CycleReport) -> Result<String> {
        let registry = Registry::new();
        let namespace = &self.config.namespace;

        let prom_up = GaugeVec::new(
            Opts::new("prom_up", "Was the dependancy up").namespace(namespace.as_str()),
            &[DEPENDENCY_LABEL],
        )?;
        prom_up
            .with_label_values(&[report.dependency.as_str()])
            .set(report.status.gauge_value());
        registry.register(Box::new(prom_up))?;

        if report.status.is_up() {
            let service = GaugeVec::new(
                Opts::new(
                    "service",
                    "Internal Service Availability 1m for interactive, 5m for batch",
                )
                .namespace(namespace.as_str()),
                &["product", "type", "endpoint"],
            )?;
            for row in report.rows() {
                service
                    .with_label_values(&[
                        row.product.as_str(),
                        row.service_type.as_str(),
                        row.endpoint.as_str(),
                    ])
                    .set(row.value);
            }

            let service_type = GaugeVec::new(
                Opts::new(
                    "service_type",
                    "Interactive or Batch Service Availability aggr 1m or 5m respectively",
                )
                .namespace(namespace.as_str()),
                &["product", "type"],
            )?;
            let service_overall = GaugeVec::new(
                Opts::new("service_overall", "Overall Service Availability aggr")
                    .namespace(namespace.as_str()),
                &["product"],
            )?;
            for rollup in &report.rollups {
                for service_type_value in ServiceType::ALL {
                    service_type
                        .with_label_values(&[rollup.product.as_str(), service_type_value.as_str()])
                        .set(rollup.for_type(service_type_value));
                }
                service_overall
                    .with_label_values(&[rollup.product.as_str()])
                    .set(rollup.overall);
            }

            registry.register(Box::new(service))?;
            registry.register(Box::new(service_type))?;
            registry.register(Box::new(service_overall))?;
        }

        encode(&registry)
    }
}

/// Encode everything gathered from a registry as text
///
/// Vectors without series are pruned by `gather`.
pub(crate) fn encode(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;

    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Metrics contain invalid UTF-8: {e}")).into())
}
