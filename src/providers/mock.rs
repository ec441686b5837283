/*!
 * Mock backend implementations for testing.
 *
 * This module provides mock backends that simulate different behaviors:
 * - `MockBackend::working(pairs)` - Answers from a fixed table, echoes otherwise
 * - `MockBackend::failing()` - Always fails with an error
 * - `MockBackend::empty()` - Returns an empty string
 * - `MockBackend::slow(ms)` - Sleeps before answering, for timeout tests
 * - `MockBackend::panicking()` - Panics inside the call
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::language_utils::Direction;
use crate::providers::TranslationBackend;

/// Behavior mode for the mock backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Answers from the configured table; unknown text is echoed back
    Working,
    /// Returns the input unchanged
    Echo,
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
    /// Panics mid-call
    Panicking,
}

/// Mock backend for testing the resolver cascade
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    behavior: MockBehavior,
    /// Canned translations keyed by input text
    table: HashMap<String, String>,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            name: "mock".to_string(),
            behavior,
            table: HashMap::new(),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a working mock backend answering from `pairs`
    pub fn working(pairs: &[(&str, &str)]) -> Self {
        let mut backend = Self::new(MockBehavior::Working);
        backend.table = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        backend
    }

    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    /// Create a failing mock backend that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    pub fn panicking() -> Self {
        Self::new(MockBehavior::Panicking)
    }

    /// Rename the backend, useful when several mocks share a cascade
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of translate calls received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

impl Clone for MockBackend {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            behavior: self.behavior,
            table: self.table.clone(),
            request_count: Arc::clone(&self.request_count),
        }
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(&self, text: &str, _direction: Direction) -> Result<String, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Working => Ok(self
                .table
                .get(text)
                .cloned()
                .unwrap_or_else(|| text.to_string())),
            MockBehavior::Echo => Ok(text.to_string()),
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "Simulated backend failure".to_string(),
            }),
            MockBehavior::Empty => Ok(String::new()),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(self
                    .table
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| format!("[slow] {}", text)))
            }
            MockBehavior::Panicking => panic!("mock backend panicked on {:?}", text),
        }
    }
}
