//! The reasoning oracle interface.
//!
//! An oracle turns a role instruction and a task prompt into text. Model,
//! region, temperature and token ceiling are bound when the concrete oracle is
//! built; the research loop never sees them.

use crate::error::OracleError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Text-in/text-out reasoning service.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Run one completion. Transient failures are retried inside the
    /// implementation; an error returned here is final.
    async fn invoke(&self, role: &str, prompt: &str) -> Result<String, OracleError>;

    /// Return the model identifier.
    fn model_name(&self) -> &str;
}

/// One recorded `invoke` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleCall {
    pub role: String,
    pub prompt: String,
}

type Router = Box<dyn Fn(&str, &str) -> String + Send + Sync>;

/// A scripted oracle for tests and development.
///
/// Replies come from the queue first, then from the routing closure, then
/// from a fixed fallback text.
pub struct MockOracle {
    model: String,
    queue: Mutex<VecDeque<Result<String, OracleError>>>,
    router: Option<Router>,
    fallback: String,
    calls: Mutex<Vec<OracleCall>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            queue: Mutex::new(VecDeque::new()),
            router: None,
            fallback: "Mock oracle reply.".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockOracle that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        let mut oracle = Self::new();
        oracle.fallback = text.to_string();
        oracle
    }

    /// Create a MockOracle that answers every call with `route(role, prompt)`.
    pub fn from_fn<F>(route: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        let mut oracle = Self::new();
        oracle.router = Some(Box::new(route));
        oracle
    }

    /// Queue a reply for the next call.
    pub fn queue_response(&self, text: impl Into<String>) {
        self.lock_queue().push_back(Ok(text.into()));
    }

    /// Queue a failure for the next call.
    pub fn queue_error(&self, error: OracleError) {
        self.lock_queue().push_back(Err(error));
    }

    /// All calls seen so far, in order.
    pub fn calls(&self) -> Vec<OracleCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls made with the given role.
    pub fn calls_with_role(&self, role: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.role == role)
            .count()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, OracleError>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn invoke(&self, role: &str, prompt: &str) -> Result<String, OracleError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(OracleCall {
                role: role.to_string(),
                prompt: prompt.to_string(),
            });

        if let Some(queued) = self.lock_queue().pop_front() {
            return queued;
        }
        match &self.router {
            Some(route) => Ok(route(role, prompt)),
            None => Ok(self.fallback.clone()),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fallback() {
        let oracle = MockOracle::with_response("fixed");
        assert_eq!(oracle.invoke("r", "p").await.unwrap(), "fixed");
        assert_eq!(oracle.invoke("r", "p").await.unwrap(), "fixed");
        assert_eq!(oracle.model_name(), "mock-model");
    }

    #[tokio::test]
    async fn test_mock_queue_before_router() {
        let oracle = MockOracle::from_fn(|role, _| format!("routed:{role}"));
        oracle.queue_response("queued");
        assert_eq!(oracle.invoke("a", "p").await.unwrap(), "queued");
        assert_eq!(oracle.invoke("b", "p").await.unwrap(), "routed:b");
    }

    #[tokio::test]
    async fn test_mock_queued_error() {
        let oracle = MockOracle::new();
        oracle.queue_error(OracleError::AuthFailed {
            provider: "mock".into(),
        });
        let err = oracle.invoke("r", "p").await.unwrap_err();
        assert!(matches!(err, OracleError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let oracle = MockOracle::new();
        oracle.invoke("planner", "first").await.unwrap();
        oracle.invoke("writer", "second").await.unwrap();
        oracle.invoke("planner", "third").await.unwrap();

        let calls = oracle.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].prompt, "second");
        assert_eq!(oracle.calls_with_role("planner"), 2);
    }
}
