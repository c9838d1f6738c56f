//! Upstream dependency check
//!
//! A liveness query gates every cycle: when it fails, nothing else is
//! queried and only the dependency gauge is reported.

use std::fmt;
use std::time::Instant;

use crate::error::ConnectivityError;
use crate::query::QueryBackend;

// ============================================================================
// Dependency Status
// ============================================================================

/// Reachability of the upstream time-series backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStatus {
    /// Liveness query succeeded
    Up,

    /// Liveness query failed
    Down,
}

impl DependencyStatus {
    /// Value of the `up` gauge for this status
    pub fn gauge_value(&self) -> f64 {
        match self {
            DependencyStatus::Up => 1.0,
            DependencyStatus::Down => 0.0,
        }
    }

    /// Check if the dependency is reachable
    pub fn is_up(&self) -> bool {
        matches!(self, DependencyStatus::Up)
    }
}

impl fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyStatus::Up => f.write_str("up"),
            DependencyStatus::Down => f.write_str("down"),
        }
    }
}

// ============================================================================
// Check
// ============================================================================

/// Run the liveness query against the backend
///
/// Any error from the backend means the dependency is down. The result set
/// itself is not inspected.
pub async fn check_upstream(
    backend: &dyn QueryBackend,
    liveness_query: &str,
    dependency: &str,
) -> Result<(), ConnectivityError> {
    let started = Instant::now();

    match backend.query(liveness_query).await {
        Ok(_) => {
            tracing::debug!(
                dependency,
                duration_ms = started.elapsed().as_millis() as u64,
                "Upstream check OK"
            );
            Ok(())
        }
        Err(source) => {
            tracing::error!(
                dependency,
                duration_ms = started.elapsed().as_millis() as u64,
                error = %source,
                "Upstream check NOK"
            );
            Err(ConnectivityError {
                dependency: dependency.to_string(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::testing::ScriptedBackend;
    use crate::types::Sample;

    const LIVENESS: &str = "up{job=\"prometheus\"}";

    #[test]
    fn test_gauge_value() {
        assert_eq!(DependencyStatus::Up.gauge_value(), 1.0);
        assert_eq!(DependencyStatus::Down.gauge_value(), 0.0);
        assert!(DependencyStatus::Up.is_up());
        assert!(!DependencyStatus::Down.is_up());
        assert_eq!(DependencyStatus::Down.to_string(), "down");
    }

    #[tokio::test]
    async fn test_check_upstream_ok() {
        let backend = ScriptedBackend::new().on("up{", vec![Sample::new(1.0)]);
        assert!(check_upstream(&backend, LIVENESS, "prometheus").await.is_ok());
        assert_eq!(backend.calls(), vec![LIVENESS.to_string()]);
    }

    #[tokio::test]
    async fn test_check_upstream_empty_result_is_ok() {
        let backend = ScriptedBackend::new();
        assert!(check_upstream(&backend, LIVENESS, "prometheus").await.is_ok());
    }

    #[tokio::test]
    async fn test_check_upstream_failure() {
        let backend = ScriptedBackend::new().fail("up{");
        let err = check_upstream(&backend, LIVENESS, "prometheus")
            .await
            .unwrap_err();
        assert_eq!(err.dependency, "prometheus");
        assert!(err.to_string().contains("prometheus"));
    }
}
