//! Exporter configuration
//!
//! Loaded from TOML, then overridden by environment variables:
//!
//! | Variable               | Field                          |
//! |------------------------|--------------------------------|
//! | `PROM_ENDPOINT`        | `prometheus.endpoint`          |
//! | `PROMETHEUS_AUTH_USER` | `prometheus.username`          |
//! | `PROMETHEUS_AUTH_PWD`  | `prometheus.password`          |
//! | `SA_INTERACTIVE_AGGR`  | `aggregation.interactive`      |
//! | `SA_BATCH_AGGR`        | `aggregation.batch`            |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::ServiceType;

/// Environment variable pointing at the TOML configuration file
pub const CONFIG_ENV_VAR: &str = "SA_EXPORTER_CONFIG";

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sa-exporter.toml";

// =============================================================================
// Configuration Types
// =============================================================================

/// Top-level exporter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// HTTP listen address; `:PORT` binds every interface
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path under which metrics are exposed
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    /// Upstream Prometheus connection
    #[serde(default)]
    pub prometheus: PrometheusSettings,

    /// Aggregation windows per service type
    #[serde(default)]
    pub aggregation: AggregationWindows,

    /// Service records location
    #[serde(default)]
    pub topology: TopologySettings,

    /// Append the exporter's own metrics to every scrape
    #[serde(default = "default_true")]
    pub include_self_metrics: bool,
}

/// Upstream Prometheus connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusSettings {
    /// `host:port`, optionally with a scheme and path prefix
    #[serde(default = "default_prom_endpoint")]
    pub endpoint: String,

    /// Basic auth user
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Expression used by the dependency health check
    #[serde(default = "default_liveness_query")]
    pub liveness_query: String,

    /// Label value of the dependency gauge
    #[serde(default = "default_dependency_name")]
    pub dependency_name: String,
}

/// Aggregation window strings, passed through verbatim to range selectors
///
/// An empty window queries the instant value instead.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregationWindows {
    /// Window for interactive endpoints
    #[serde(default = "default_interactive_window")]
    pub interactive: String,

    /// Window for batch endpoints
    #[serde(default = "default_batch_window")]
    pub batch: String,
}

/// Where the service records come from
#[derive(Debug, Clone, Deserialize)]
pub struct TopologySettings {
    /// Service records bundled with the exporter
    #[serde(default = "default_topology_file")]
    pub default_file: PathBuf,

    /// Directory whose first JSON file overrides the default records
    #[serde(default = "default_override_dir")]
    pub override_dir: PathBuf,
}

fn default_listen_addr() -> String {
    ":9800".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_true() -> bool {
    true
}

fn default_prom_endpoint() -> String {
    "localhost:9090".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_liveness_query() -> String {
    "up{job=\"prometheus\"}".to_string()
}

fn default_dependency_name() -> String {
    "prometheus".to_string()
}

fn default_interactive_window() -> String {
    "1m".to_string()
}

fn default_batch_window() -> String {
    "5m".to_string()
}

fn default_topology_file() -> PathBuf {
    PathBuf::from("resources/services.json")
}

fn default_override_dir() -> PathBuf {
    PathBuf::from("mapped-services")
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            metrics_path: default_metrics_path(),
            prometheus: PrometheusSettings::default(),
            aggregation: AggregationWindows::default(),
            topology: TopologySettings::default(),
            include_self_metrics: true,
        }
    }
}

impl Default for PrometheusSettings {
    fn default() -> Self {
        Self {
            endpoint: default_prom_endpoint(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            liveness_query: default_liveness_query(),
            dependency_name: default_dependency_name(),
        }
    }
}

impl Default for AggregationWindows {
    fn default() -> Self {
        Self {
            interactive: default_interactive_window(),
            batch: default_batch_window(),
        }
    }
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            default_file: default_topology_file(),
            override_dir: default_override_dir(),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl ExporterConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Load configuration from file, falling back to defaults
    ///
    /// Lookup order: `explicit`, then `$SA_EXPORTER_CONFIG`, then
    /// `./sa-exporter.toml`. Unreadable or invalid files are logged and skipped.
    pub fn load(explicit: Option<&Path>) -> Self {
        Self::load_with_fallback(explicit, Path::new(DEFAULT_CONFIG_FILE))
    }

    fn load_with_fallback(explicit: Option<&Path>, fallback: &Path) -> Self {
        let candidate = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));

        let path = match candidate {
            Some(path) => path,
            None if fallback.exists() => fallback.to_path_buf(),
            None => {
                tracing::info!("Using default configuration");
                return Self::default();
            }
        };

        match Self::read_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config file, using defaults");
                Self::default()
            }
        }
    }

    /// Read and parse a TOML configuration file
    pub fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration from file");
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an environment lookup
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(endpoint) = get("PROM_ENDPOINT") {
            self.prometheus.endpoint = endpoint;
        }
        if let Some(user) = get("PROMETHEUS_AUTH_USER") {
            self.prometheus.username = Some(user);
        }
        if let Some(password) = get("PROMETHEUS_AUTH_PWD") {
            self.prometheus.password = Some(password);
        }
        if let Some(window) = get("SA_INTERACTIVE_AGGR") {
            self.aggregation.interactive = window;
        }
        if let Some(window) = get("SA_BATCH_AGGR") {
            self.aggregation.batch = window;
        }
    }

    /// Resolve the listen address into a socket address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        };
        addr.parse()
            .map_err(|e| Error::Configuration(format!("invalid listen address {addr:?}: {e}")))
    }
}

impl PrometheusSettings {
    /// Base URL of the Prometheus HTTP API, always ending with `/`
    pub fn base_url(&self) -> String {
        let mut url = if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            format!("http://{}", self.endpoint)
        };
        if !url.ends_with('/') {
            url.push('/');
        }
        url
    }

    /// Credentials, only when both user and password are set
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user, password))
            }
            _ => None,
        }
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AggregationWindows {
    /// Window configured for a service type
    pub fn for_type(&self, service_type: ServiceType) -> &str {
        match service_type {
            ServiceType::Interactive => &self.interactive,
            ServiceType::Batch => &self.batch,
        }
    }
}
