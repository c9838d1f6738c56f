//! Observability layer
//!
//! Turns each aggregation cycle into a Prometheus exposition and keeps the
//! exporter's own scrape metrics.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              PrometheusExporter               │
//! │  ┌────────────────────┐  ┌─────────────────┐  │
//! │  │ per-cycle Registry │  │   SelfMetrics   │  │
//! │  │  sa_* gauges       │  │  sa_exporter_*  │  │
//! │  └─────────▲──────────┘  └────────▲────────┘  │
//! └────────────┼──────────────────────┼───────────┘
//!              └──────────┬───────────┘
//!                  ┌──────┴──────┐
//!                  │ CycleReport │
//!                  └─────────────┘
//! ```

pub mod prometheus_exporter;
pub mod self_metrics;

pub use prometheus_exporter::{PrometheusConfig, PrometheusExporter, TEXT_CONTENT_TYPE};
pub use self_metrics::SelfMetrics;
