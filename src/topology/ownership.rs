//! Endpoint ownership: pattern → products
//!
//! Patterns are kept in order of first declaration so that first-match
//! resolution is deterministic even when patterns overlap.

use std::collections::HashMap;

use regex::Regex;

use crate::error::TopologyError;

/// One endpoint pattern and the products that declared it
#[derive(Debug, Clone)]
struct OwnershipEntry {
    pattern: String,
    regex: Regex,
    products: Vec<String>,
}

/// Mapping from endpoint pattern to owning products
#[derive(Debug, Clone, Default)]
pub struct EndpointOwnership {
    entries: Vec<OwnershipEntry>,
    positions: HashMap<String, usize>,
}

impl EndpointOwnership {
    /// Create an empty ownership map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `product` declared `pattern`
    ///
    /// The pattern is compiled on first declaration only; later declarations
    /// append their product to the existing entry.
    pub fn declare(&mut self, pattern: &str, product: &str) -> Result<(), TopologyError> {
        if let Some(&idx) = self.positions.get(pattern) {
            self.entries[idx].products.push(product.to_string());
            return Ok(());
        }

        let regex = Regex::new(pattern).map_err(|source| TopologyError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        self.positions.insert(pattern.to_string(), self.entries.len());
        self.entries.push(OwnershipEntry {
            pattern: pattern.to_string(),
            regex,
            products: vec![product.to_string()],
        });
        Ok(())
    }

    /// Resolve an endpoint reported by the backend to its owning products
    ///
    /// Returns the products of the first pattern that matches anywhere in
    /// `endpoint`, or an empty slice when nothing matches.
    pub fn resolve(&self, endpoint: &str) -> &[String] {
        for entry in &self.entries {
            if entry.regex.is_match(endpoint) {
                tracing::debug!(endpoint, pattern = %entry.pattern, "Endpoint matched");
                return &entry.products;
            }
        }
        &[]
    }

    /// Number of distinct patterns
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no pattern has been declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
