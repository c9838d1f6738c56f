//! Engine builder and aggregation cycle

use std::sync::Arc;

use super::aggregation::{attribute_readings, roll_up_products, ProductRollup};
use super::health::{check_upstream, DependencyStatus};
use super::readiness::{QueryKind, ReadinessResolution, ReadinessResolver};
use crate::config::{AggregationWindows, PrometheusSettings};
use crate::error::{Error, Result};
use crate::query::QueryBackend;
use crate::topology::Topology;
use crate::types::{SampleRow, ServiceType};

// ============================================================================
// Cycle Report
// ============================================================================

/// Anomalies observed during one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleDiagnostics {
    /// Sub-queries that failed and were treated as empty
    pub failed_queries: Vec<(ServiceType, QueryKind)>,

    /// Not-ready rows discarded for lack of a total count
    pub consistency_violations: usize,

    /// Endpoints reported by the backend that no pattern owns
    pub unresolved_endpoints: Vec<String>,
}

/// Everything one aggregation cycle produced
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Dependency label value of the up gauge
    pub dependency: String,

    /// Upstream reachability
    pub status: DependencyStatus,

    /// Per-endpoint rows for interactive endpoints
    pub interactive_rows: Vec<SampleRow>,

    /// Per-endpoint rows for batch endpoints
    pub batch_rows: Vec<SampleRow>,

    /// Per-product type and overall rollups
    pub rollups: Vec<ProductRollup>,

    /// Anomalies observed along the way
    pub diagnostics: CycleDiagnostics,
}

impl CycleReport {
    fn dependency_down(dependency: String) -> Self {
        Self {
            dependency,
            status: DependencyStatus::Down,
            interactive_rows: Vec::new(),
            batch_rows: Vec::new(),
            rollups: Vec::new(),
            diagnostics: CycleDiagnostics::default(),
        }
    }

    /// All endpoint rows, interactive first
    pub fn rows(&self) -> impl Iterator<Item = &SampleRow> {
        self.interactive_rows.iter().chain(self.batch_rows.iter())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for an [`AvailabilityEngine`]
pub struct AvailabilityEngineBuilder {
    topology: Option<Arc<Topology>>,
    backend: Option<Arc<dyn QueryBackend>>,
    windows: AggregationWindows,
    liveness_query: String,
    dependency_name: String,
}

impl AvailabilityEngineBuilder {
    /// Create a builder with default windows and liveness check
    pub fn new() -> Self {
        let prometheus = PrometheusSettings::default();
        Self {
            topology: None,
            backend: None,
            windows: AggregationWindows::default(),
            liveness_query: prometheus.liveness_query,
            dependency_name: prometheus.dependency_name,
        }
    }

    /// Set the topology the engine aggregates over
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = Some(Arc::new(topology));
        self
    }

    /// Set the query backend
    pub fn with_backend<B>(mut self, backend: B) -> Self
    where
        B: QueryBackend + 'static,
    {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Set a shared query backend
    pub fn with_shared_backend(mut self, backend: Arc<dyn QueryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the aggregation windows
    pub fn with_windows(mut self, windows: AggregationWindows) -> Self {
        self.windows = windows;
        self
    }

    /// Set the liveness query and the dependency name it reports under
    pub fn with_liveness_check(
        mut self,
        liveness_query: impl Into<String>,
        dependency_name: impl Into<String>,
    ) -> Self {
        self.liveness_query = liveness_query.into();
        self.dependency_name = dependency_name.into();
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<AvailabilityEngine> {
        let topology = self
            .topology
            .ok_or_else(|| Error::Configuration("No topology configured".to_string()))?;

        let backend = self
            .backend
            .ok_or_else(|| Error::Configuration("No query backend configured".to_string()))?;

        if self.liveness_query.trim().is_empty() {
            return Err(Error::Configuration("Liveness query is empty".to_string()));
        }

        Ok(AvailabilityEngine {
            topology,
            backend,
            windows: self.windows,
            liveness_query: self.liveness_query,
            dependency_name: self.dependency_name,
        })
    }
}

impl Default for AvailabilityEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Computes service availability for every product, once per scrape
///
/// Holds no per-cycle state, so concurrent scrapes run independent cycles.
pub struct AvailabilityEngine {
    topology: Arc<Topology>,
    backend: Arc<dyn QueryBackend>,
    windows: AggregationWindows,
    liveness_query: String,
    dependency_name: String,
}

impl AvailabilityEngine {
    /// Start building an engine
    pub fn builder() -> AvailabilityEngineBuilder {
        AvailabilityEngineBuilder::new()
    }

    /// Aggregation windows
    pub fn windows(&self) -> &AggregationWindows {
        &self.windows
    }

    /// Check the upstream backend without running a cycle
    pub async fn check_dependency(&self) -> DependencyStatus {
        match check_upstream(
            self.backend.as_ref(),
            &self.liveness_query,
            &self.dependency_name,
        )
        .await
        {
            Ok(()) => DependencyStatus::Up,
            Err(_) => DependencyStatus::Down,
        }
    }

    /// Run one aggregation cycle
    ///
    /// Query failures never abort the cycle. A failed dependency check
    /// short-circuits it with an empty report.
    pub async fn run_cycle(&self) -> CycleReport {
        if self.check_dependency().await == DependencyStatus::Down {
            return CycleReport::dependency_down(self.dependency_name.clone());
        }

        let resolver = ReadinessResolver::new(&self.topology, self.backend.as_ref());
        let (interactive, batch) = tokio::join!(
            resolver.resolve(
                ServiceType::Interactive,
                self.windows.for_type(ServiceType::Interactive)
            ),
            resolver.resolve(ServiceType::Batch, self.windows.for_type(ServiceType::Batch))
        );

        let mut diagnostics = CycleDiagnostics::default();
        let interactive_rows =
            self.attribute(ServiceType::Interactive, interactive, &mut diagnostics);
        let batch_rows = self.attribute(ServiceType::Batch, batch, &mut diagnostics);

        let rollups = roll_up_products(&interactive_rows, &batch_rows);

        tracing::debug!(
            interactive_rows = interactive_rows.len(),
            batch_rows = batch_rows.len(),
            products = rollups.len(),
            "Aggregation cycle complete"
        );

        CycleReport {
            dependency: self.dependency_name.clone(),
            status: DependencyStatus::Up,
            interactive_rows,
            batch_rows,
            rollups,
            diagnostics,
        }
    }

    fn attribute(
        &self,
        service_type: ServiceType,
        resolution: ReadinessResolution,
        diagnostics: &mut CycleDiagnostics,
    ) -> Vec<SampleRow> {
        diagnostics.failed_queries.extend(
            resolution
                .failed_queries
                .iter()
                .map(|kind| (service_type, *kind)),
        );
        diagnostics.consistency_violations += resolution.inconsistent_endpoints.len();

        let (rows, unresolved) =
            attribute_readings(service_type, &resolution.readings, &self.topology);
        diagnostics.unresolved_endpoints.extend(unresolved);
        rows
    }
}
