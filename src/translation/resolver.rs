/*!
 * Cascading translation resolver.
 *
 * A text is first gated (Latin-only text and text without the source script
 * pass through), then looked up in the term table, and only when the table
 * leaves source-script fragments behind are the backends consulted, one at a
 * time in priority order. When every backend comes back empty handed the
 * partial dictionary result is returned.
 */

use log::debug;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::TranslationConfig;
use crate::language_utils::{Direction, is_latin_only};
use crate::providers::{self, TranslationBackend};
use crate::translation::dictionary::TermTable;

/// Result of a single backend attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// The backend produced a usable translation
    Success(String),
    /// Error, timeout, empty or unchanged output
    NoResult,
}

/// How a resolved text was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionMethod {
    /// Gated out; the input is returned as-is
    Unchanged,
    /// The term table translated the whole text
    Dictionary,
    /// No backend answered; the term table result is returned with leftovers
    PartialDictionary,
    /// Named backend answered
    Backend(String),
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Dictionary => write!(f, "dictionary"),
            Self::PartialDictionary => write!(f, "partial-dictionary"),
            Self::Backend(name) => write!(f, "backend:{}", name),
        }
    }
}

/// A resolved text with its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    pub method: ResolutionMethod,
}

/// Dictionary-first resolver with an ordered backend cascade
#[derive(Clone)]
pub struct TranslationResolver {
    table: Arc<dyn TermTable>,
    backends: Vec<Arc<dyn TranslationBackend>>,
    call_timeout: Duration,
}

impl fmt::Debug for TranslationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationResolver")
            .field("backends", &self.backend_names())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl TranslationResolver {
    pub fn new(
        table: Arc<dyn TermTable>,
        backends: Vec<Arc<dyn TranslationBackend>>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            table,
            backends,
            call_timeout,
        }
    }

    /// Build a resolver with the enabled backends of `config`
    pub fn from_config(table: Arc<dyn TermTable>, config: &TranslationConfig) -> Self {
        Self::new(
            table,
            providers::build_backends(&config.backends),
            Duration::from_secs(config.call_timeout_secs.max(1)),
        )
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    pub fn table(&self) -> &Arc<dyn TermTable> {
        &self.table
    }

    /// Translate `text`, returning only the resulting string
    pub async fn resolve(&self, text: &str, direction: Direction, preserve_latin: bool) -> String {
        self.resolve_detailed(text, direction, preserve_latin).await.text
    }

    /// Translate `text` and report which stage produced the result
    pub async fn resolve_detailed(&self, text: &str, direction: Direction, preserve_latin: bool) -> Resolution {
        if preserve_latin && is_latin_only(text) {
            return Resolution {
                text: text.to_string(),
                method: ResolutionMethod::Unchanged,
            };
        }
        if !direction.has_source_script(text) {
            return Resolution {
                text: text.to_string(),
                method: ResolutionMethod::Unchanged,
            };
        }

        let found = self.table.lookup(text, direction);
        if found.matched_any && !direction.has_source_script(&found.text) {
            return Resolution {
                text: found.text,
                method: ResolutionMethod::Dictionary,
            };
        }

        for backend in &self.backends {
            if let TranslationOutcome::Success(translated) = self.attempt(backend.as_ref(), text, direction).await {
                return Resolution {
                    text: translated,
                    method: ResolutionMethod::Backend(backend.name().to_string()),
                };
            }
        }

        debug!("No backend answered for '{}', keeping dictionary result", preview(text));
        Resolution {
            text: found.text,
            method: ResolutionMethod::PartialDictionary,
        }
    }

    /// One bounded backend call, folded into an outcome
    async fn attempt(&self, backend: &dyn TranslationBackend, text: &str, direction: Direction) -> TranslationOutcome {
        match tokio::time::timeout(self.call_timeout, backend.translate(text, direction)).await {
            Ok(Ok(translated)) => {
                let translated = translated.trim();
                if translated.is_empty() || translated == text.trim() {
                    debug!("{} returned no usable translation", backend.name());
                    TranslationOutcome::NoResult
                } else {
                    TranslationOutcome::Success(translated.to_string())
                }
            }
            Ok(Err(e)) => {
                debug!("{} failed: {}", backend.name(), e);
                TranslationOutcome::NoResult
            }
            Err(_) => {
                debug!("{} timed out after {:?}", backend.name(), self.call_timeout);
                TranslationOutcome::NoResult
            }
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(30).collect()
}
