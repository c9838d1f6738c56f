//! Availability engine
//!
//! One cycle per scrape:
//!
//! ```text
//! check_upstream ──► ReadinessResolver (interactive ∥ batch)
//!                         │
//!                         ▼
//!                 attribute_readings ──► roll_up_products ──► CycleReport
//! ```

pub mod aggregation;
pub mod builder;
pub mod health;
pub mod readiness;

pub use aggregation::{ready_value, roll_up, ProductRollup};
pub use builder::{AvailabilityEngine, AvailabilityEngineBuilder, CycleDiagnostics, CycleReport};
pub use health::{check_upstream, DependencyStatus};
pub use readiness::{QueryKind, ReadinessResolver};
