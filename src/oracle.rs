//! Translation oracle contract.
//!
//! The oracle proposes English names for native names. It is injected into
//! the enricher so tests can substitute a scripted fake.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A unit of work sent to the oracle.
///
/// The wire names match the prompt vocabulary used by the Gemini oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationTask {
    #[serde(rename = "chinese_name")]
    pub native_name: String,
    /// Best available, possibly invalid, name used as weak context
    #[serde(rename = "original_name")]
    pub hint_name: String,
}

/// An English name proposed by the oracle for a submitted native name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TranslationResult {
    #[serde(rename = "chinese_name", alias = "native_name")]
    pub native_name: String,
    pub english_name: String,
}

/// Context sent alongside every batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationContext {
    /// Territory the names belong to (e.g. "Poland")
    pub territory: String,
    /// Language the hints are most likely written in
    pub source_language: Option<String>,
}

impl TranslationContext {
    pub fn new(territory: impl Into<String>, source_language: Option<&str>) -> Self {
        Self {
            territory: territory.into(),
            source_language: source_language.map(str::to_string),
        }
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("oracle API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to parse oracle response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("oracle response violates schema: {0}")]
    Schema(String),

    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
}

impl OracleError {
    /// Rate limits, server errors, timeouts and transport failures are worth
    /// retrying; other client errors and malformed responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                *status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Parse(_) | Self::Schema(_) => false,
        }
    }
}

/// Capability that proposes English names for a batch of tasks.
///
/// Implementations may return fewer results than tasks. Results are
/// untrusted: the caller matches them against the submitted batch.
#[allow(async_fn_in_trait)]
pub trait TranslationOracle {
    async fn translate(
        &self,
        tasks: &[TranslationTask],
        context: &TranslationContext,
    ) -> Result<Vec<TranslationResult>, OracleError>;
}
