//! Core data types used throughout the exporter

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Traffic class of an endpoint, each aggregated over its own window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// Latency-sensitive, user-facing traffic
    Interactive,
    /// Background and asynchronous traffic
    Batch,
}

impl ServiceType {
    /// Every service type, in exposition order
    pub const ALL: [ServiceType; 2] = [ServiceType::Interactive, ServiceType::Batch];

    /// Label value used in queries and gauges
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Interactive => "interactive",
            ServiceType::Batch => "batch",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product's declaration of the endpoints it owns for one service type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Owning product name
    pub product: String,
    /// Service type of every endpoint in this record
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    /// Endpoint identifiers (regular expressions, usually literals)
    #[serde(default)]
    pub endpoints: Vec<String>,
}

impl ServiceRecord {
    /// Create a new service record
    pub fn new<I, S>(product: impl Into<String>, service_type: ServiceType, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            product: product.into(),
            service_type,
            endpoints: endpoints.into_iter().map(Into::into).collect(),
        }
    }
}

/// One labeled value returned by the query backend
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    /// Label set of the series
    pub labels: HashMap<String, String>,
    /// Sample value
    pub value: f64,
}

impl Sample {
    /// Create an unlabeled sample
    pub fn new(value: f64) -> Self {
        Self {
            labels: HashMap::new(),
            value,
        }
    }

    /// Add a label to the sample
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Get a label value
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Number of ready addresses computed for one endpoint in a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointReadiness {
    /// Endpoint identifier as reported by the backend
    pub endpoint: String,
    /// Total minus not-ready addresses; may be fractional or negative
    pub available_count: f64,
}

/// Binary availability of one endpoint attributed to one product
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    /// Owning product
    pub product: String,
    /// Service type the endpoint was queried under
    pub service_type: ServiceType,
    /// Endpoint identifier
    pub endpoint: String,
    /// 0.0 or 1.0
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_labels() {
        assert_eq!(ServiceType::Interactive.as_str(), "interactive");
        assert_eq!(ServiceType::Batch.to_string(), "batch");
    }

    #[test]
    fn test_service_record_json() {
        let json = r#"[
            {"product": "Car", "type": "interactive", "endpoints": ["Wheel", "Tires"]},
            {"product": "Car", "type": "batch", "endpoints": ["Motor"]}
        ]"#;
        let records: Vec<ServiceRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].service_type, ServiceType::Interactive);
        assert_eq!(records[0].endpoints, vec!["Wheel", "Tires"]);
        assert_eq!(records[1], ServiceRecord::new("Car", ServiceType::Batch, ["Motor"]));
    }

    #[test]
    fn test_service_record_rejects_unknown_type() {
        let json = r#"{"product": "Car", "type": "streaming", "endpoints": []}"#;
        assert!(serde_json::from_str::<ServiceRecord>(json).is_err());
    }

    #[test]
    fn test_sample_labels() {
        let sample = Sample::new(2.0).with_label("endpoint", "Wheel");
        assert_eq!(sample.label("endpoint"), Some("Wheel"));
        assert_eq!(sample.label("namespace"), None);
        assert_eq!(sample.value, 2.0);
    }
}
