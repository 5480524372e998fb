//! Adapter factory for creating platform adapters from configuration.
//!
//! This module provides functionality to create adapter instances based on
//! configuration entries, without callers depending on concrete adapter
//! types.

use crate::{AutomationAdapter, DocSearchAdapter, KnowledgeAdapter, MockAdapter};
use conflux_abstraction::{PlatformAdapter, PlatformError};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};

/// Platform kind enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    /// Mock platform for testing.
    Mock,
    /// Conversational knowledge-base service.
    Knowledge,
    /// Document-retrieval service.
    DocSearch,
    /// Workflow-automation engine.
    Automation,
}

impl FromStr for PlatformKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "knowledge" | "knowledge-base" => Ok(Self::Knowledge),
            "docsearch" | "doc-search" | "retrieval" => Ok(Self::DocSearch),
            "automation" | "workflow" => Ok(Self::Automation),
            _ => Err(()),
        }
    }
}

/// Adapter configuration.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// The kind of platform to create an adapter for.
    pub kind: PlatformKind,
    /// The platform identifier (unique within the registry).
    pub id: String,
    /// Base URL of the platform API (required for HTTP kinds).
    pub endpoint: Option<String>,
    /// Optional API key.
    pub api_key: Option<String>,
}

impl AdapterConfig {
    /// Creates a configuration for the given kind and platform id.
    #[must_use]
    pub fn new(kind: PlatformKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into(), endpoint: None, api_key: None }
    }

    /// Sets the platform API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Factory for creating platform adapter instances.
pub struct PlatformFactory;

impl PlatformFactory {
    /// Creates an adapter from the given configuration.
    ///
    /// # Arguments
    /// * `config` - The adapter configuration
    ///
    /// # Errors
    /// Returns a `PlatformError` if the configuration is incomplete for the
    /// requested kind.
    pub fn create(config: AdapterConfig) -> Result<Arc<dyn PlatformAdapter>, PlatformError> {
        debug!(
            kind = ?config.kind,
            platform = %config.id,
            "Creating platform adapter"
        );

        match config.kind {
            PlatformKind::Mock => Ok(Arc::new(MockAdapter::new(config.id))),
            PlatformKind::Knowledge => {
                let endpoint = Self::require_endpoint(&config)?;
                let mut adapter = KnowledgeAdapter::new(config.id, endpoint);
                if let Some(key) = config.api_key {
                    adapter = adapter.with_api_key(key);
                }
                Ok(Arc::new(adapter))
            }
            PlatformKind::DocSearch => {
                let endpoint = Self::require_endpoint(&config)?;
                let mut adapter = DocSearchAdapter::new(config.id, endpoint);
                if let Some(key) = config.api_key {
                    adapter = adapter.with_api_key(key);
                }
                Ok(Arc::new(adapter))
            }
            PlatformKind::Automation => {
                let endpoint = Self::require_endpoint(&config)?;
                let mut adapter = AutomationAdapter::new(config.id, endpoint);
                if let Some(key) = config.api_key {
                    adapter = adapter.with_api_key(key);
                }
                Ok(Arc::new(adapter))
            }
        }
    }

    /// Creates an adapter from a platform kind string and id.
    ///
    /// # Errors
    /// Returns a `PlatformError` if the kind string is unrecognized or
    /// creation fails.
    pub fn create_from_str(
        kind_str: &str,
        id: impl Into<String>,
        endpoint: Option<String>,
    ) -> Result<Arc<dyn PlatformAdapter>, PlatformError> {
        let kind = PlatformKind::from_str(kind_str).map_err(|()| {
            error!(kind = %kind_str, "Unrecognized platform kind");
            PlatformError::Unsupported(format!("unrecognized platform kind: {}", kind_str))
        })?;

        let mut config = AdapterConfig::new(kind, id);
        config.endpoint = endpoint;
        Self::create(config)
    }

    fn require_endpoint(config: &AdapterConfig) -> Result<String, PlatformError> {
        config.endpoint.clone().ok_or_else(|| {
            PlatformError::Unsupported(format!(
                "platform '{}' requires an endpoint. Use AdapterConfig::with_endpoint() to set it.",
                config.id
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_kind_from_str() {
        assert_eq!(PlatformKind::from_str("mock"), Ok(PlatformKind::Mock));
        assert_eq!(PlatformKind::from_str("Knowledge"), Ok(PlatformKind::Knowledge));
        assert_eq!(PlatformKind::from_str("doc-search"), Ok(PlatformKind::DocSearch));
        assert_eq!(PlatformKind::from_str("DOCSEARCH"), Ok(PlatformKind::DocSearch));
        assert_eq!(PlatformKind::from_str("workflow"), Ok(PlatformKind::Automation));
        assert_eq!(PlatformKind::from_str("unknown"), Err(()));
    }

    #[test]
    fn test_factory_create_mock() {
        let adapter =
            PlatformFactory::create(AdapterConfig::new(PlatformKind::Mock, "m1")).unwrap();
        assert_eq!(adapter.name(), "m1");
    }

    #[test]
    fn test_factory_requires_endpoint_for_http_kinds() {
        let result =
            PlatformFactory::create(AdapterConfig::new(PlatformKind::Knowledge, "kb"));
        assert!(matches!(result, Err(PlatformError::Unsupported(_))));
    }

    #[test]
    fn test_factory_create_from_str() {
        let adapter = PlatformFactory::create_from_str(
            "docsearch",
            "doc-search",
            Some("http://localhost:9380/api/v1".to_string()),
        )
        .unwrap();
        assert_eq!(adapter.name(), "doc-search");

        let result = PlatformFactory::create_from_str("invalid", "x", None);
        assert!(result.is_err());
    }
}
