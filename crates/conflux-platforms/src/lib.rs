//! Platform adapter implementations for Conflux.
//!
//! This crate provides concrete implementations of the `PlatformAdapter`
//! trait.
//!
//! # Supported platforms
//!
//! - **Mock**: Testing and development (scripted replies and failures)
//! - **Knowledge**: Conversational knowledge-base services (HTTP)
//! - **DocSearch**: Enterprise document-retrieval services (HTTP)
//! - **Automation**: Workflow-automation engines (HTTP)

pub mod automation;
pub mod docsearch;
pub mod factory;
pub mod knowledge;

use async_trait::async_trait;
use conflux_abstraction::{
    ExecutionContext, PlatformAdapter, PlatformError, PlatformReply, UnifiedQueryRequest,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

pub use automation::AutomationAdapter;
pub use docsearch::DocSearchAdapter;
pub use factory::{AdapterConfig, PlatformFactory, PlatformKind};
pub use knowledge::KnowledgeAdapter;

/// A mock implementation of the `PlatformAdapter` trait for testing.
///
/// Supports a canned reply, an optional artificial delay, and failure
/// scripting: either a fixed error on every call, or a queue of errors
/// consumed one per call before the adapter starts succeeding.
#[derive(Debug)]
pub struct MockAdapter {
    id: String,
    capabilities: Vec<String>,
    reply: PlatformReply,
    delay: Option<Duration>,
    fail_always: Option<PlatformError>,
    scripted_failures: Mutex<VecDeque<PlatformError>>,
    calls: AtomicUsize,
}

impl MockAdapter {
    /// Creates a mock adapter answering with a canned reply.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let reply =
            PlatformReply::new(format!("mock answer from {}", id)).with_confidence(0.9);
        Self {
            id,
            capabilities: Vec::new(),
            reply,
            delay: None,
            fail_always: None,
            scripted_failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Sets the declared capability tags.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the canned reply.
    #[must_use]
    pub fn with_reply(mut self, reply: PlatformReply) -> Self {
        self.reply = reply;
        self
    }

    /// Sets the canned answer text, keeping the default confidence.
    #[must_use]
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.reply.answer = answer.into();
        self
    }

    /// Adds an artificial delay before every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes every call fail with the given error.
    #[must_use]
    pub fn failing(mut self, error: PlatformError) -> Self {
        self.fail_always = Some(error);
        self
    }

    /// Scripts failures for the first calls; later calls succeed.
    #[must_use]
    pub fn with_failures(self, errors: Vec<PlatformError>) -> Self {
        {
            let mut script = self.scripted_failures.lock().expect("failure script poisoned");
            script.extend(errors);
        }
        self
    }

    /// Number of `execute` calls observed so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    async fn execute(
        &self,
        request: &UnifiedQueryRequest,
        _ctx: &ExecutionContext,
    ) -> Result<PlatformReply, PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(
            platform = %self.id,
            query_len = request.query.len(),
            "MockAdapter executing"
        );

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(ref error) = self.fail_always {
            return Err(error.clone());
        }

        let scripted = {
            let mut script = self.scripted_failures.lock().expect("failure script poisoned");
            script.pop_front()
        };
        if let Some(error) = scripted {
            return Err(error);
        }

        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request() -> UnifiedQueryRequest {
        UnifiedQueryRequest::new("test query")
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_mock_adapter_answers() {
        let adapter = MockAdapter::new("mock-1");
        let reply = adapter.execute(&request(), &ctx()).await.unwrap();
        assert_eq!(reply.answer, "mock answer from mock-1");
        assert_eq!(adapter.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_adapter_scripted_failures_then_success() {
        let adapter = MockAdapter::new("mock-1").with_failures(vec![
            PlatformError::Timeout { platform: "mock-1".to_string() },
            PlatformError::Unavailable {
                platform: "mock-1".to_string(),
                message: "down".to_string(),
            },
        ]);

        assert!(adapter.execute(&request(), &ctx()).await.is_err());
        assert!(adapter.execute(&request(), &ctx()).await.is_err());
        assert!(adapter.execute(&request(), &ctx()).await.is_ok());
        assert_eq!(adapter.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_adapter_fail_always() {
        let adapter = MockAdapter::new("mock-1")
            .failing(PlatformError::RateLimited { platform: "mock-1".to_string() });

        for _ in 0..3 {
            let err = adapter.execute(&request(), &ctx()).await.unwrap_err();
            assert!(err.is_retryable());
        }
    }

    #[tokio::test]
    async fn test_mock_adapter_capabilities() {
        let adapter = MockAdapter::new("mock-1")
            .with_capabilities(vec!["document-search".to_string()]);
        assert_eq!(adapter.capabilities(), vec!["document-search".to_string()]);
        assert_eq!(adapter.name(), "mock-1");
    }
}
