//! Error types for the exporter

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the exporter
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream query backend unreachable
    #[error("Connectivity error: {0}")]
    Connectivity(#[from] ConnectivityError),

    /// Query error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Topology error
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Metrics encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raised by the dependency health check when the query backend cannot be reached.
///
/// Gates a whole aggregation cycle: only the dependency-down gauge is exposed.
#[derive(Error, Debug)]
#[error("dependency {dependency} is unreachable: {source}")]
pub struct ConnectivityError {
    /// Name of the dependency (label value of the up gauge)
    pub dependency: String,

    /// Underlying query failure
    #[source]
    pub source: QueryError,
}

/// Query errors
///
/// A failed sub-query degrades to an empty result for that step of the cycle.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-success HTTP status
    #[error("HTTP status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Backend reported an API-level error
    #[error("API error ({error_type}): {message}")]
    Api {
        /// Error class reported by the backend
        error_type: String,
        /// Error message reported by the backend
        message: String,
    },

    /// Response could not be interpreted
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Result type the exporter does not consume
    #[error("Unsupported result type: {0}")]
    UnsupportedResultType(String),
}

/// Topology errors
#[derive(Error, Debug)]
pub enum TopologyError {
    /// Topology file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Topology file is not a valid service list
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Endpoint pattern is not a valid regular expression
    #[error("Invalid endpoint pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Pattern as declared in the topology
        pattern: String,
        /// Regex compilation error
        #[source]
        source: regex::Error,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_error_display() {
        let err = ConnectivityError {
            dependency: "prometheus".to_string(),
            source: QueryError::Malformed("no body".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("prometheus"));
        assert!(msg.contains("no body"));
    }

    #[test]
    fn test_error_conversions() {
        let err: Error = QueryError::Api {
            error_type: "bad_data".to_string(),
            message: "parse error".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Query(QueryError::Api { .. })));
        assert!(err.to_string().contains("bad_data"));

        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
