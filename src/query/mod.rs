//! Upstream query backend
//!
//! The aggregation engine only depends on [`QueryBackend`]: issue an
//! expression, get back labeled samples or an error. [`PrometheusClient`] is
//! the HTTP implementation used by the server.

pub mod prometheus;

pub use prometheus::PrometheusClient;

use async_trait::async_trait;

use crate::error::QueryError;
use crate::types::Sample;

/// Instant-query interface of the time-series backend
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Evaluate an expression and return the resulting samples
    async fn query(&self, expression: &str) -> Result<Vec<Sample>, QueryError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory backend for engine tests

    use std::sync::Mutex;

    use super::*;

    enum Reply {
        Samples(Vec<Sample>),
        Fail(String),
    }

    /// Answers queries by substring match, first rule wins
    ///
    /// Unmatched expressions return an empty result.
    #[derive(Default)]
    pub struct ScriptedBackend {
        rules: Vec<(String, Reply)>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Reply with `samples` to expressions containing `needle`
        pub fn on(mut self, needle: &str, samples: Vec<Sample>) -> Self {
            self.rules.push((needle.to_string(), Reply::Samples(samples)));
            self
        }

        /// Fail expressions containing `needle`
        pub fn fail(mut self, needle: &str) -> Self {
            self.rules
                .push((needle.to_string(), Reply::Fail(format!("scripted failure for {needle}"))));
            self
        }

        /// Expressions received so far, in order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryBackend for ScriptedBackend {
        async fn query(&self, expression: &str) -> Result<Vec<Sample>, QueryError> {
            self.calls.lock().unwrap().push(expression.to_string());
            for (needle, reply) in &self.rules {
                if expression.contains(needle.as_str()) {
                    return match reply {
                        Reply::Samples(samples) => Ok(samples.clone()),
                        Reply::Fail(message) => Err(QueryError::Api {
                            error_type: "scripted".to_string(),
                            message: message.clone(),
                        }),
                    };
                }
            }
            Ok(Vec::new())
        }
    }

    /// `{endpoint="<name>"} value` sample
    pub fn endpoint_sample(endpoint: &str, value: f64) -> Sample {
        Sample::new(value).with_label("endpoint", endpoint)
    }
}
