//! Service topology
//!
//! Static view of which endpoints exist per service type and which products
//! own them. Built once from the service records at startup and shared
//! read-only by every aggregation cycle.
//!
//! # Components
//!
//! - **TypeIndex**: service type → declared endpoints (order and duplicates kept)
//! - **EndpointOwnership**: endpoint pattern → owning products
//! - **source**: locating and parsing the service records file

pub mod ownership;
pub mod source;

pub use ownership::EndpointOwnership;
pub use source::{load_records, resolve_source_path};

use std::collections::HashMap;

use crate::error::TopologyError;
use crate::types::{ServiceRecord, ServiceType};

/// Separator between endpoints in a backend regex matcher
pub const ENDPOINT_SEPARATOR: &str = "|";

/// Mapping from service type to the endpoints declared under it
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    endpoints: HashMap<ServiceType, Vec<String>>,
}

impl TypeIndex {
    /// Endpoints declared under a type, empty when none
    pub fn endpoints(&self, service_type: ServiceType) -> &[String] {
        self.endpoints
            .get(&service_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of types with at least one declaration
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether no type has been declared
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    fn extend(&mut self, service_type: ServiceType, endpoints: &[String]) {
        self.endpoints
            .entry(service_type)
            .or_default()
            .extend(endpoints.iter().cloned());
    }
}

/// Immutable topology derived from the service records
#[derive(Debug, Clone, Default)]
pub struct Topology {
    type_index: TypeIndex,
    ownership: EndpointOwnership,
}

impl Topology {
    /// Build both indices from the service records
    ///
    /// Duplicate endpoints across products are allowed: each declaring
    /// product is appended to the endpoint's owner list.
    pub fn build(records: &[ServiceRecord]) -> Result<Self, TopologyError> {
        let mut type_index = TypeIndex::default();
        let mut ownership = EndpointOwnership::new();

        for record in records {
            type_index.extend(record.service_type, &record.endpoints);
            for endpoint in &record.endpoints {
                ownership.declare(endpoint, &record.product)?;
            }
        }

        tracing::info!(
            types = type_index.len(),
            patterns = ownership.len(),
            "Topology indices built"
        );

        Ok(Self {
            type_index,
            ownership,
        })
    }

    /// Type → endpoints index
    pub fn type_index(&self) -> &TypeIndex {
        &self.type_index
    }

    /// Pattern → products index
    pub fn ownership(&self) -> &EndpointOwnership {
        &self.ownership
    }

    /// Disjunctive matcher body for every endpoint of a type
    ///
    /// Each endpoint is followed by the separator, e.g. `a|b|`. Returns an
    /// empty string when the type has no endpoints.
    pub fn endpoint_set_expression(&self, service_type: ServiceType) -> String {
        let mut expr = String::new();
        for endpoint in self.type_index.endpoints(service_type) {
            expr.push_str(endpoint);
            expr.push_str(ENDPOINT_SEPARATOR);
        }
        expr
    }

    /// Owning products of an endpoint reported by the backend
    pub fn resolve_products(&self, endpoint: &str) -> &[String] {
        self.ownership.resolve(endpoint)
    }
}
