//! Generation provider seam and the error taxonomy shared by every AI-backed
//! pipeline.

pub mod activity;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::workspace::ProviderSettings;

pub use activity::{ActivityLog, ActivityRecord};
pub use scripted::ScriptedProvider;

/// What a generation call is for. Recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Suggestion,
    Critique,
    Revision,
    BatchChapters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&ProviderSettings> for GenerationSettings {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            provider: settings.provider.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub kind: GenerationKind,
    pub settings: GenerationSettings,
}

/// Provider failures, split by what the author can do about them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Rate limited or quota exhausted: {0}")]
    RateLimited(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Provider not configured")]
    NotConfigured,
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Provider returned an empty response")]
    EmptyResponse,
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Maps a raw provider message onto a variant by substring.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|needle| lower.contains(needle));
        if has(&["timeout", "timed out"]) {
            GenerationError::Timeout
        } else if has(&["rate limit", "rate-limit", "429", "quota", "too many requests"]) {
            GenerationError::RateLimited(message.to_string())
        } else if has(&[
            "401",
            "403",
            "unauthorized",
            "forbidden",
            "api key",
            "authentication",
            "authorization",
        ]) {
            GenerationError::Auth(message.to_string())
        } else if has(&["network", "connect", "dns", "fetch", "unreachable"]) {
            GenerationError::Network(message.to_string())
        } else {
            GenerationError::Provider(message.to_string())
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerationError::Cancelled)
    }

    pub fn remediation_hint(&self) -> &'static str {
        match self {
            GenerationError::Network(_) => {
                "Could not reach the AI provider. Check your connection or that the local server is running."
            }
            GenerationError::Timeout => {
                "The AI provider took too long to answer. Try again, or shorten the request."
            }
            GenerationError::RateLimited(_) => {
                "The provider rate limit or quota was hit. Wait a moment or check your plan."
            }
            GenerationError::Auth(_) => "The provider rejected the credentials. Check the API key.",
            GenerationError::NotConfigured => "Choose an AI provider in the settings first.",
            GenerationError::Provider(_) => "The AI provider reported an error. Try again.",
            GenerationError::EmptyResponse => "The AI provider returned nothing. Try again.",
            GenerationError::Cancelled => "The request was cancelled.",
        }
    }
}

/// A text generation backend.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// Runs one provider call raced against `cancel`. Blank responses are errors.
pub async fn generate_with_cancel(
    provider: &dyn GenerationProvider,
    request: GenerationRequest,
    cancel: &CancellationToken,
) -> Result<String, GenerationError> {
    if cancel.is_cancelled() {
        return Err(GenerationError::Cancelled);
    }
    let kind = request.kind;
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(provider = provider.id(), ?kind, "generation cancelled");
            return Err(GenerationError::Cancelled);
        }
        result = provider.generate(request) => result?,
    };
    if response.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(response)
}
