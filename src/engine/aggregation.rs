//! Availability aggregation
//!
//! Binary conversion of ready counts and the "zero always wins" rollup,
//! applied per product at type level and then overall.

use std::collections::BTreeSet;

use crate::topology::Topology;
use crate::types::{EndpointReadiness, SampleRow, ServiceType};

/// Convert a ready address count into binary availability
///
/// Only an exact zero is unavailable. Negative counts, which show up when the
/// not-ready sum outruns the total across a query window, count as ready.
pub fn ready_value(count: f64) -> f64 {
    if count == 0.0 {
        0.0
    } else {
        1.0
    }
}

/// Zero always wins: any value below 1.0 makes the aggregate 0.0
///
/// An empty input is vacuously available.
pub fn roll_up(values: &[f64]) -> f64 {
    if values.iter().any(|&v| v < 1.0) {
        0.0
    } else {
        1.0
    }
}

/// Per-product rollup of one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRollup {
    /// Product name
    pub product: String,
    /// Rollup over the product's interactive endpoints
    pub interactive: f64,
    /// Rollup over the product's batch endpoints
    pub batch: f64,
    /// Rollup over `[interactive, batch]`
    pub overall: f64,
}

impl ProductRollup {
    /// Type-level value for a service type
    pub fn for_type(&self, service_type: ServiceType) -> f64 {
        match service_type {
            ServiceType::Interactive => self.interactive,
            ServiceType::Batch => self.batch,
        }
    }
}

/// Attribute ready counts to owning products
///
/// Returns the sample rows plus the endpoints no pattern matched; those are
/// left out of every rollup.
pub fn attribute_readings(
    service_type: ServiceType,
    readings: &[EndpointReadiness],
    topology: &Topology,
) -> (Vec<SampleRow>, Vec<String>) {
    let mut rows = Vec::new();
    let mut unresolved = Vec::new();

    for reading in readings {
        let value = ready_value(reading.available_count);
        if value < 1.0 {
            tracing::info!(
                endpoint = %reading.endpoint,
                %service_type,
                available = reading.available_count,
                "SA down for endpoint"
            );
        }

        let products = topology.resolve_products(&reading.endpoint);
        if products.is_empty() {
            tracing::error!(endpoint = %reading.endpoint, "Could not find any product for endpoint");
            unresolved.push(reading.endpoint.clone());
            continue;
        }

        for product in products {
            rows.push(SampleRow {
                product: product.clone(),
                service_type,
                endpoint: reading.endpoint.clone(),
                value,
            });
        }
    }

    (rows, unresolved)
}

/// Distinct products appearing in a set of rows, sorted
pub fn products_in(rows: &[SampleRow]) -> BTreeSet<&str> {
    rows.iter().map(|row| row.product.as_str()).collect()
}

/// Values of every row belonging to `product`
pub fn extract_values(product: &str, rows: &[SampleRow]) -> Vec<f64> {
    rows.iter()
        .filter(|row| row.product == product)
        .map(|row| row.value)
        .collect()
}

/// Products seen in interactive rows but absent from batch rows
pub fn interactive_only_products(
    interactive_rows: &[SampleRow],
    batch_rows: &[SampleRow],
) -> Vec<String> {
    let batch = products_in(batch_rows);
    products_in(interactive_rows)
        .into_iter()
        .filter(|product| !batch.contains(product))
        .map(str::to_string)
        .collect()
}

/// Compute type and overall rollups for every product
///
/// Products are enumerated from the batch rows only; a product with only
/// interactive endpoints gets no rollup and is reported with a warning.
pub fn roll_up_products(
    interactive_rows: &[SampleRow],
    batch_rows: &[SampleRow],
) -> Vec<ProductRollup> {
    for product in interactive_only_products(interactive_rows, batch_rows) {
        tracing::warn!(
            product = %product,
            "Product has no batch endpoints in this cycle, rollup gauges skipped"
        );
    }

    products_in(batch_rows)
        .into_iter()
        .map(|product| {
            tracing::debug!(product, "Computing SA rollups");

            let interactive = type_rollup(product, ServiceType::Interactive, interactive_rows);
            let batch = type_rollup(product, ServiceType::Batch, batch_rows);
            let overall = roll_up(&[interactive, batch]);
            if overall < 1.0 {
                tracing::info!(product, "SA down for product overall");
            }

            ProductRollup {
                product: product.to_string(),
                interactive,
                batch,
                overall,
            }
        })
        .collect()
}

fn type_rollup(product: &str, service_type: ServiceType, rows: &[SampleRow]) -> f64 {
    let values = extract_values(product, rows);
    if values.is_empty() {
        tracing::debug!(product, %service_type, "No endpoints for product, rollup is vacuously available");
    }

    let value = roll_up(&values);
    if value < 1.0 {
        tracing::info!(product, %service_type, "SA down for product type");
    }
    value
}
