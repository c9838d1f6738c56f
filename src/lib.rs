//! SA Exporter
//!
//! Computes service availability (SA) for products running on Kubernetes and
//! exposes it as Prometheus gauges. Availability is derived from the
//! `kube_endpoint_address` counters already scraped by a Prometheus server:
//! an endpoint with zero ready addresses is down, and a single down endpoint
//! takes its product's type-level and overall availability down with it.
//!
//! # Architecture
//!
//! ```text
//!   services.json ──► Topology (TypeIndex + EndpointOwnership)
//!                            │
//!  Prometheus ◄── QueryBackend ◄── AvailabilityEngine::run_cycle
//!                                          │
//!                                          ▼
//!                                     CycleReport
//!                                          │
//!                                          ▼
//!                 PrometheusExporter ──► sa_prom_up / sa_service /
//!                                        sa_service_type / sa_service_overall
//! ```
//!
//! Each scrape runs exactly one cycle. The topology is built once at startup
//! and shared read-only.

pub mod config;
pub mod engine;
pub mod error;
pub mod observability;
pub mod query;
pub mod topology;
pub mod types;

pub use config::ExporterConfig;
pub use engine::{AvailabilityEngine, AvailabilityEngineBuilder, CycleReport, DependencyStatus};
pub use error::{Error, Result};
pub use observability::{PrometheusConfig, PrometheusExporter};
pub use query::{PrometheusClient, QueryBackend};
pub use topology::Topology;
pub use types::{ServiceRecord, ServiceType};
