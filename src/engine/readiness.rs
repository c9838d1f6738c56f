//! Readiness resolution
//!
//! Turns the address counters of `kube_endpoint_address` into a number of
//! ready addresses per endpoint: total addresses minus not-ready addresses.

use std::collections::BTreeMap;
use std::fmt;

use crate::query::QueryBackend;
use crate::topology::Topology;
use crate::types::{EndpointReadiness, ServiceType};

/// Address counter exported by kube-state-metrics (>= 2.14)
pub const ADDRESS_METRIC: &str = "kube_endpoint_address";

/// Label carrying the endpoint name in query results
pub const ENDPOINT_LABEL: &str = "endpoint";

/// The two counter queries issued per service type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Every address, ready or not
    Total,
    /// Addresses flagged `ready="false"`
    NotReady,
}

impl QueryKind {
    /// Label value used in logs and self-metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Total => "total",
            QueryKind::NotReady => "not_ready",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the counter query for an endpoint set
///
/// With an empty `window` the instant value is summed; otherwise the selector
/// is averaged over the window first, which can yield fractional counts.
///
/// Averaging counts every address series that had a sample anywhere in the
/// window. An address that flips from ready to not-ready shows up in both
/// counters until its ready series ages out, so a fully unready endpoint can
/// keep reading as available for up to `window`. Set an empty window to react
/// on the next scrape instead.
pub fn readiness_query(kind: QueryKind, endpoint_set: &str, window: &str) -> String {
    let selector = match kind {
        QueryKind::Total => format!("{ADDRESS_METRIC}{{endpoint=~\"{endpoint_set}\"}}"),
        QueryKind::NotReady => {
            format!("{ADDRESS_METRIC}{{endpoint=~\"{endpoint_set}\",ready=\"false\"}}")
        }
    };

    if window.is_empty() {
        format!("sum by (endpoint)({selector})")
    } else {
        format!("sum by (endpoint)(avg_over_time({selector}[{window}]))")
    }
}

/// Outcome of one readiness resolution
#[derive(Debug, Clone, Default)]
pub struct ReadinessResolution {
    /// Ready address count per endpoint, ordered by endpoint
    pub readings: Vec<EndpointReadiness>,

    /// Sub-queries that failed and were treated as empty
    pub failed_queries: Vec<QueryKind>,

    /// Endpoints reported as not ready without a total count
    pub inconsistent_endpoints: Vec<String>,
}

/// Computes per-endpoint ready address counts for a service type
pub struct ReadinessResolver<'a> {
    topology: &'a Topology,
    backend: &'a dyn QueryBackend,
}

impl<'a> ReadinessResolver<'a> {
    /// Create a resolver over a topology and backend
    pub fn new(topology: &'a Topology, backend: &'a dyn QueryBackend) -> Self {
        Self { topology, backend }
    }

    /// Resolve readiness for every endpoint declared under `service_type`
    ///
    /// Failed sub-queries degrade to empty results. Not-ready rows for
    /// endpoints missing from the total are discarded.
    pub async fn resolve(&self, service_type: ServiceType, window: &str) -> ReadinessResolution {
        let mut resolution = ReadinessResolution::default();

        let endpoint_set = self.topology.endpoint_set_expression(service_type);
        if endpoint_set.is_empty() {
            tracing::debug!(%service_type, "No endpoints declared, skipping readiness queries");
            return resolution;
        }

        let total_query = readiness_query(QueryKind::Total, &endpoint_set, window);
        let not_ready_query = readiness_query(QueryKind::NotReady, &endpoint_set, window);

        let (total, not_ready) = tokio::join!(
            self.backend.query(&total_query),
            self.backend.query(&not_ready_query)
        );

        let mut available: BTreeMap<String, f64> = BTreeMap::new();

        match total {
            Ok(samples) => {
                tracing::debug!(%service_type, query = %total_query, rows = samples.len(), "Total addresses fetched");
                for sample in samples {
                    match sample.label(ENDPOINT_LABEL) {
                        Some(endpoint) => {
                            available.insert(endpoint.to_string(), sample.value);
                        }
                        None => {
                            tracing::warn!(%service_type, "Total address row without endpoint label ignored");
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(%service_type, query = %total_query, error = %e, "Total addresses query failed");
                resolution.failed_queries.push(QueryKind::Total);
            }
        }

        match not_ready {
            Ok(samples) => {
                for sample in samples {
                    let Some(endpoint) = sample.label(ENDPOINT_LABEL) else {
                        tracing::warn!(%service_type, "Not-ready address row without endpoint label ignored");
                        continue;
                    };
                    match available.get_mut(endpoint) {
                        Some(count) => *count -= sample.value,
                        None => {
                            tracing::error!(
                                %service_type,
                                endpoint,
                                "Endpoint has not-ready addresses but no total, row discarded"
                            );
                            resolution.inconsistent_endpoints.push(endpoint.to_string());
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(%service_type, query = %not_ready_query, error = %e, "Not-ready addresses query failed");
                resolution.failed_queries.push(QueryKind::NotReady);
            }
        }

        resolution.readings = available
            .into_iter()
            .map(|(endpoint, available_count)| EndpointReadiness {
                endpoint,
                available_count,
            })
            .collect();

        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::testing::{endpoint_sample, ScriptedBackend};
    use crate::types::ServiceRecord;

    fn topology() -> Topology {
        Topology::build(&[
            ServiceRecord::new("Car", ServiceType::Interactive, ["Wheel"]),
            ServiceRecord::new("Car", ServiceType::Batch, ["Motor", "Axle"]),
        ])
        .unwrap()
    }

    fn reading(endpoint: &str, available_count: f64) -> EndpointReadiness {
        EndpointReadiness {
            endpoint: endpoint.to_string(),
            available_count,
        }
    }

    #[test]
    fn test_readiness_query_instant() {
        assert_eq!(
            readiness_query(QueryKind::Total, "Wheel|", ""),
            "sum by (endpoint)(kube_endpoint_address{endpoint=~\"Wheel|\"})"
        );
        assert_eq!(
            readiness_query(QueryKind::NotReady, "Wheel|", ""),
            "sum by (endpoint)(kube_endpoint_address{endpoint=~\"Wheel|\",ready=\"false\"})"
        );
    }

    #[test]
    fn test_readiness_query_windowed() {
        assert_eq!(
            readiness_query(QueryKind::Total, "a|b|", "5m"),
            "sum by (endpoint)(avg_over_time(kube_endpoint_address{endpoint=~\"a|b|\"}[5m]))"
        );
    }

    #[tokio::test]
    async fn test_resolve_subtracts_not_ready() {
        let backend = ScriptedBackend::new()
            .on(
                "ready=\"false\"",
                vec![endpoint_sample("Motor", 1.0), endpoint_sample("Axle", 0.0)],
            )
            .on(
                ADDRESS_METRIC,
                vec![endpoint_sample("Motor", 3.0), endpoint_sample("Axle", 2.0)],
            );
        let topology = topology();
        let resolver = ReadinessResolver::new(&topology, &backend);

        let resolution = resolver.resolve(ServiceType::Batch, "").await;
        assert_eq!(
            resolution.readings,
            vec![reading("Axle", 2.0), reading("Motor", 2.0)]
        );
        assert!(resolution.failed_queries.is_empty());
        assert!(resolution.inconsistent_endpoints.is_empty());

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|q| q.contains("Motor|Axle|")));
    }

    #[tokio::test]
    async fn test_resolve_discards_inconsistent_rows() {
        let backend = ScriptedBackend::new()
            .on(
                "ready=\"false\"",
                vec![endpoint_sample("Motor", 1.0), endpoint_sample("Ghost", 4.0)],
            )
            .on(ADDRESS_METRIC, vec![endpoint_sample("Motor", 1.0)]);
        let topology = topology();
        let resolver = ReadinessResolver::new(&topology, &backend);

        let resolution = resolver.resolve(ServiceType::Batch, "").await;
        assert_eq!(resolution.readings, vec![reading("Motor", 0.0)]);
        assert_eq!(resolution.inconsistent_endpoints, vec!["Ghost".to_string()]);
        assert!(resolution.readings.iter().all(|r| r.endpoint != "Ghost"));
    }

    #[tokio::test]
    async fn test_resolve_total_failure_yields_nothing() {
        let backend = ScriptedBackend::new()
            .on("ready=\"false\"", vec![endpoint_sample("Motor", 1.0)])
            .fail(ADDRESS_METRIC);
        let topology = topology();
        let resolver = ReadinessResolver::new(&topology, &backend);

        let resolution = resolver.resolve(ServiceType::Batch, "").await;
        assert!(resolution.readings.is_empty());
        assert_eq!(resolution.failed_queries, vec![QueryKind::Total]);
        // Not-ready rows have nothing to subtract from
        assert_eq!(resolution.inconsistent_endpoints, vec!["Motor".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_not_ready_failure_keeps_totals() {
        let backend = ScriptedBackend::new()
            .fail("ready=\"false\"")
            .on(ADDRESS_METRIC, vec![endpoint_sample("Motor", 2.0)]);
        let topology = topology();
        let resolver = ReadinessResolver::new(&topology, &backend);

        let resolution = resolver.resolve(ServiceType::Batch, "").await;
        assert_eq!(resolution.readings, vec![reading("Motor", 2.0)]);
        assert_eq!(resolution.failed_queries, vec![QueryKind::NotReady]);
    }

    #[tokio::test]
    async fn test_resolve_allows_negative_counts() {
        let backend = ScriptedBackend::new()
            .on("ready=\"false\"", vec![endpoint_sample("Wheel", 3.0)])
            .on(ADDRESS_METRIC, vec![endpoint_sample("Wheel", 2.0)]);
        let topology = topology();
        let resolver = ReadinessResolver::new(&topology, &backend);

        let resolution = resolver.resolve(ServiceType::Interactive, "1m").await;
        assert_eq!(resolution.readings, vec![reading("Wheel", -1.0)]);
        assert!(backend.calls().iter().all(|q| q.contains("[1m]")));
    }

    #[tokio::test]
    async fn test_windowed_flip_to_not_ready_reads_available() {
        // The address was ready earlier in the window, so both series average to 1
        let backend = ScriptedBackend::new()
            .on("ready=\"false\"", vec![endpoint_sample("Motor", 1.0)])
            .on(ADDRESS_METRIC, vec![endpoint_sample("Motor", 2.0)]);
        let topology = topology();
        let resolver = ReadinessResolver::new(&topology, &backend);

        let resolution = resolver.resolve(ServiceType::Batch, "5m").await;
        assert_eq!(resolution.readings, vec![reading("Motor", 1.0)]);
        assert!(backend.calls().iter().all(|q| q.contains("avg_over_time(")));
    }

    #[tokio::test]
    async fn test_resolve_empty_type_skips_queries() {
        let topology = Topology::build(&[ServiceRecord::new(
            "Car",
            ServiceType::Batch,
            ["Motor"],
        )])
        .unwrap();
        let backend = ScriptedBackend::new();
        let resolver = ReadinessResolver::new(&topology, &backend);

        let resolution = resolver.resolve(ServiceType::Interactive, "1m").await;
        assert!(resolution.readings.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_ignores_unlabeled_rows() {
        let backend = ScriptedBackend::new().on(ADDRESS_METRIC, vec![crate::types::Sample::new(5.0)]);
        let topology = topology();
        let resolver = ReadinessResolver::new(&topology, &backend);

        let resolution = resolver.resolve(ServiceType::Batch, "").await;
        assert!(resolution.readings.is_empty());
    }
}
