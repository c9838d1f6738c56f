//! Exporter self-metrics
//!
//! Counters about the exporter's own behavior, kept in a registry separate
//! from the per-cycle availability gauges and from the process default
//! registry.

use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

use super::prometheus_exporter::encode;
use crate::engine::CycleReport;
use crate::error::Result;

const NAMESPACE: &str = "sa_exporter";

/// Label value recorded when the liveness query fails
pub const LIVENESS_QUERY_LABEL: &str = "liveness";

/// Scrape counters and timings
pub struct SelfMetrics {
    registry: Registry,
    scrapes: IntCounter,
    query_failures: IntCounterVec,
    consistency_violations: IntCounter,
    unresolved_endpoints: IntCounter,
    scrape_duration: Histogram,
}

impl SelfMetrics {
    /// Create and register every self-metric
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let scrapes = IntCounter::with_opts(
            Opts::new("scrapes_total", "Total scrapes served").namespace(NAMESPACE),
        )?;
        let query_failures = IntCounterVec::new(
            Opts::new(
                "query_failures_total",
                "Upstream queries that failed and were treated as empty",
            )
            .namespace(NAMESPACE),
            &["query"],
        )?;
        let consistency_violations = IntCounter::with_opts(
            Opts::new(
                "consistency_violations_total",
                "Not-ready rows discarded because the endpoint had no total",
            )
            .namespace(NAMESPACE),
        )?;
        let unresolved_endpoints = IntCounter::with_opts(
            Opts::new(
                "unresolved_endpoints_total",
                "Endpoints reported upstream that no product owns",
            )
            .namespace(NAMESPACE),
        )?;
        let scrape_duration = Histogram::with_opts(
            HistogramOpts::new("scrape_duration_seconds", "Time spent running one cycle")
                .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(scrapes.clone()))?;
        registry.register(Box::new(query_failures.clone()))?;
        registry.register(Box::new(consistency_violations.clone()))?;
        registry.register(Box::new(unresolved_endpoints.clone()))?;
        registry.register(Box::new(scrape_duration.clone()))?;

        Ok(Self {
            registry,
            scrapes,
            query_failures,
            consistency_violations,
            unresolved_endpoints,
            scrape_duration,
        })
    }

    /// Record the outcome of one cycle
    pub fn observe_cycle(&self, report: &CycleReport, elapsed: Duration) {
        self.scrapes.inc();
        self.scrape_duration.observe(elapsed.as_secs_f64());

        if !report.status.is_up() {
            self.query_failures
                .with_label_values(&[LIVENESS_QUERY_LABEL])
                .inc();
        }
        for (service_type, kind) in &report.diagnostics.failed_queries {
            let label = format!("{service_type}_{kind}");
            self.query_failures.with_label_values(&[label.as_str()]).inc();
        }

        self.consistency_violations
            .inc_by(report.diagnostics.consistency_violations as u64);
        self.unresolved_endpoints
            .inc_by(report.diagnostics.unresolved_endpoints.len() as u64);
    }

    /// Encode the self-metrics as text
    pub fn export(&self) -> Result<String> {
        encode(&self.registry)
    }
}
