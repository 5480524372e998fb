//! TOML configuration file support for the gateway.

use crate::limiter::QosLimits;
use crate::metrics::DEFAULT_WINDOW_SIZE;
use crate::registry::PlatformRegistry;
use crate::routing::{ScoringWeights, SlaTargets};
use conflux_abstraction::{PlatformDescriptor, ServiceTier};
use conflux_platforms::{AdapterConfig, PlatformFactory, PlatformKind};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Default TTL for cached responses, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_secs: default_cache_ttl_secs() }
    }
}

impl CacheSettings {
    /// The TTL as a duration.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Metrics settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// Ring-buffer size per platform.
    #[serde(default = "default_metrics_window")]
    pub window_size: usize,
}

fn default_metrics_window() -> usize {
    DEFAULT_WINDOW_SIZE
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { window_size: default_metrics_window() }
    }
}

/// Admission-control settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Queue depth for critical priority.
    pub critical_depth: usize,
    /// Queue depth for high priority.
    pub high_depth: usize,
    /// Queue depth for normal priority.
    pub normal_depth: usize,
    /// Queue depth for batch priority.
    pub batch_depth: usize,
    /// Global in-flight ceiling.
    pub global_concurrency: usize,
    /// Bounded admission wait for normal/batch, in milliseconds.
    pub low_priority_max_wait_ms: u64,
    /// Requests admitted per platform per window.
    pub platform_window_ceiling: u32,
    /// Per-platform window length, in seconds.
    pub window_secs: u64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        let defaults = QosLimits::default();
        Self {
            critical_depth: defaults.critical_depth,
            high_depth: defaults.high_depth,
            normal_depth: defaults.normal_depth,
            batch_depth: defaults.batch_depth,
            global_concurrency: defaults.global_concurrency,
            low_priority_max_wait_ms: defaults.low_priority_max_wait.as_millis() as u64,
            platform_window_ceiling: defaults.platform_window_ceiling,
            window_secs: defaults.window_length.as_secs(),
        }
    }
}

impl LimitSettings {
    /// Converts into the limiter's runtime limits.
    #[must_use]
    pub fn to_qos_limits(&self) -> QosLimits {
        QosLimits {
            critical_depth: self.critical_depth,
            high_depth: self.high_depth,
            normal_depth: self.normal_depth,
            batch_depth: self.batch_depth,
            global_concurrency: self.global_concurrency,
            low_priority_max_wait: Duration::from_millis(self.low_priority_max_wait_ms),
            platform_window_ceiling: self.platform_window_ceiling,
            window_length: Duration::from_secs(self.window_secs),
        }
    }
}

/// Scoring settings: the factor weights plus the cold-start prior.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    /// Scoring factor weights.
    #[serde(flatten)]
    pub weights: ScoringWeights,
    /// Reliability assumed for platforms with no samples.
    #[serde(default = "default_cold_start_reliability")]
    pub cold_start_reliability: f64,
}

fn default_cold_start_reliability() -> f64 {
    0.8
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            cold_start_reliability: default_cold_start_reliability(),
        }
    }
}

/// One platform entry in the registry list.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformEntryConfig {
    /// Platform identifier.
    pub id: String,
    /// Platform kind (knowledge, docsearch, automation, mock).
    pub kind: String,
    /// API endpoint (required for HTTP kinds).
    pub endpoint: Option<String>,
    /// Optional API key.
    pub api_key: Option<String>,
    /// Languages the platform answers well in; empty means any.
    #[serde(default)]
    pub languages: Vec<String>,
    /// Operational tier.
    #[serde(default)]
    pub tier: ServiceTier,
    /// Capability tag → affinity score in [0, 1].
    #[serde(default)]
    pub affinity: HashMap<String, f64>,
}

impl PlatformEntryConfig {
    /// Builds the static descriptor for this entry.
    #[must_use]
    pub fn descriptor(&self) -> PlatformDescriptor {
        let mut descriptor = PlatformDescriptor::new(self.id.as_str()).with_tier(self.tier);
        for (capability, score) in &self.affinity {
            descriptor = descriptor.with_affinity(capability.as_str(), *score);
        }
        for language in &self.languages {
            descriptor = descriptor.with_language(language.as_str());
        }
        descriptor
    }
}

/// The full gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// Cache settings.
    #[serde(default)]
    pub cache: CacheSettings,
    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsSettings,
    /// Admission-control settings.
    #[serde(default)]
    pub limits: LimitSettings,
    /// Scoring settings.
    #[serde(default)]
    pub scoring: ScoringSettings,
    /// SLA targets per priority class.
    #[serde(default)]
    pub sla: SlaTargets,
    /// Registered platforms.
    #[serde(default)]
    pub platforms: Vec<PlatformEntryConfig>,
}

/// Configuration loader for the gateway.
pub struct GatewayConfigLoader;

impl GatewayConfigLoader {
    /// Loads and validates gateway configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<GatewayConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validates a gateway configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` describing the first violation.
    pub fn validate(config: &GatewayConfig) -> Result<()> {
        config.scoring.weights.validate().map_err(ConfigError::Validation)?;
        config.sla.validate().map_err(ConfigError::Validation)?;

        if config.cache.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "cache ttl_secs must be positive".to_string(),
            ));
        }
        if config.metrics.window_size == 0 {
            return Err(ConfigError::Validation(
                "metrics window_size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.scoring.cold_start_reliability) {
            return Err(ConfigError::Validation(format!(
                "cold_start_reliability {} must be within [0, 1]",
                config.scoring.cold_start_reliability
            )));
        }

        let limits = &config.limits;
        for (name, depth) in [
            ("critical_depth", limits.critical_depth),
            ("high_depth", limits.high_depth),
            ("normal_depth", limits.normal_depth),
            ("batch_depth", limits.batch_depth),
            ("global_concurrency", limits.global_concurrency),
        ] {
            if depth == 0 {
                return Err(ConfigError::Validation(format!(
                    "limits.{} must be positive",
                    name
                )));
            }
        }
        if limits.platform_window_ceiling == 0 || limits.window_secs == 0 {
            return Err(ConfigError::Validation(
                "platform window ceiling and length must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &config.platforms {
            if entry.id.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "platform id must not be empty".to_string(),
                ));
            }
            if !seen.insert(entry.id.clone()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate platform id '{}'",
                    entry.id
                )));
            }

            let kind = PlatformKind::from_str(&entry.kind).map_err(|()| {
                ConfigError::Validation(format!(
                    "platform '{}': unknown kind '{}'. Valid kinds: knowledge, docsearch, automation, mock",
                    entry.id, entry.kind
                ))
            })?;
            if kind != PlatformKind::Mock && entry.endpoint.is_none() {
                return Err(ConfigError::Validation(format!(
                    "platform '{}': kind '{}' requires an endpoint",
                    entry.id, entry.kind
                )));
            }

            for (capability, score) in &entry.affinity {
                if !(0.0..=1.0).contains(score) {
                    return Err(ConfigError::Validation(format!(
                        "platform '{}': affinity '{}' is {}, must be within [0, 1]",
                        entry.id, capability, score
                    )));
                }
            }
        }

        Ok(())
    }

    /// Builds the platform registry from the configured entries.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` when an adapter cannot be created
    /// or the registry rejects the entries.
    pub fn build_registry(config: &GatewayConfig) -> Result<PlatformRegistry> {
        let mut builder = PlatformRegistry::builder();
        for entry in &config.platforms {
            let kind = PlatformKind::from_str(&entry.kind).map_err(|()| {
                ConfigError::Validation(format!(
                    "platform '{}': unknown kind '{}'",
                    entry.id, entry.kind
                ))
            })?;

            let mut adapter_config = AdapterConfig::new(kind, entry.id.as_str());
            adapter_config.endpoint = entry.endpoint.clone();
            adapter_config.api_key = entry.api_key.clone();

            let adapter = PlatformFactory::create(adapter_config)
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
            builder = builder.register(adapter, entry.descriptor());
        }
        builder.build().map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(
            r#"
[cache]
ttl_secs = 600

[metrics]
window_size = 50

[limits]
global_concurrency = 32
critical_depth = 10

[scoring]
intent = 0.5
performance = 0.3
reliability = 0.1
feature = 0.1
cold_start_reliability = 0.7

[sla.critical]
latency_ms = 800
availability = 0.999

[[platforms]]
id = "doc-search"
kind = "docsearch"
endpoint = "http://doc-search.internal/api/v1"
languages = ["en"]
tier = "enterprise"

[platforms.affinity]
"document-search" = 0.92
"hybrid-retrieval" = 0.89

[[platforms]]
id = "automation"
kind = "automation"
endpoint = "http://automation.internal/api/v1"

[platforms.affinity]
"multi-step-automation" = 0.95
"#,
        );

        let config = GatewayConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.metrics.window_size, 50);
        assert_eq!(config.limits.global_concurrency, 32);
        assert_eq!(config.limits.critical_depth, 10);
        // Unset limits keep their defaults.
        assert_eq!(config.limits.high_depth, 200);
        assert_eq!(config.scoring.weights.intent, 0.5);
        assert_eq!(config.scoring.cold_start_reliability, 0.7);
        assert_eq!(config.sla.critical.latency_ms, 800);
        assert_eq!(config.sla.high.latency_ms, 2000);
        assert_eq!(config.platforms.len(), 2);
        assert_eq!(config.platforms[0].tier, ServiceTier::Enterprise);

        let descriptor = config.platforms[0].descriptor();
        assert_eq!(descriptor.affinity("document-search"), Some(0.92));
        assert!(descriptor.supports_language("en"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let file = write_config("");
        let config = GatewayConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.metrics.window_size, DEFAULT_WINDOW_SIZE);
        assert!(config.platforms.is_empty());
        assert!(config.scoring.weights.validate().is_ok());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let file = write_config(
            r#"
[[platforms]]
id = "x"
kind = "teleport"
endpoint = "http://x"
"#,
        );
        let result = GatewayConfigLoader::load(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_endpoint_is_rejected() {
        let file = write_config(
            r#"
[[platforms]]
id = "kb"
kind = "knowledge"
"#,
        );
        assert!(GatewayConfigLoader::load(file.path()).is_err());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let file = write_config(
            r#"
[[platforms]]
id = "a"
kind = "mock"

[[platforms]]
id = "a"
kind = "mock"
"#,
        );
        assert!(GatewayConfigLoader::load(file.path()).is_err());
    }

    #[test]
    fn test_out_of_range_affinity_is_rejected() {
        let file = write_config(
            r#"
[[platforms]]
id = "a"
kind = "mock"

[platforms.affinity]
"document-search" = 1.2
"#,
        );
        assert!(GatewayConfigLoader::load(file.path()).is_err());
    }

    #[test]
    fn test_unbalanced_weights_are_rejected() {
        let file = write_config(
            r#"
[scoring]
intent = 0.9
performance = 0.3
reliability = 0.2
feature = 0.1
"#,
        );
        assert!(GatewayConfigLoader::load(file.path()).is_err());
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let file = write_config("[cache]\nttl_secs = 0\n");
        assert!(GatewayConfigLoader::load(file.path()).is_err());
    }

    #[test]
    fn test_build_registry_from_config() {
        let file = write_config(
            r#"
[[platforms]]
id = "m1"
kind = "mock"

[[platforms]]
id = "m2"
kind = "mock"
"#,
        );
        let config = GatewayConfigLoader::load(file.path()).unwrap();
        let registry = GatewayConfigLoader::build_registry(&config).unwrap();
        assert_eq!(registry.ids(), vec!["m1", "m2"]);
    }
}
