use thiserror::Error;
use uuid::Uuid;

use crate::services::ai::GenerationError;

/// Preconditions checked before any provider call or persistence write.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No chapter is selected.")]
    NoChapterSelected,
    #[error("No project is open.")]
    NoProjectOpen,
    #[error("The AI provider is not configured.")]
    ProviderNotConfigured,
    #[error("Select some text in the editor first.")]
    EmptySelection,
    #[error("The selection range {start}..{end} is outside the draft.")]
    InvalidSelection { start: usize, end: usize },
    #[error("The selected text changed since suggestions were requested.")]
    StaleSelection,
    #[error("The chapter draft is empty.")]
    EmptyDraft,
    #[error("Chapter {0} not found.")]
    ChapterNotFound(Uuid),
    #[error("History entry {0} not found.")]
    EntryNotFound(Uuid),
    #[error("Suggestion {0} not found.")]
    SuggestionNotFound(Uuid),
    #[error("The project has no chapters to generate.")]
    NoChapters,
    #[error("Batch generation must be confirmed before it runs.")]
    NotConfirmed,
    #[error("A batch generation is already running.")]
    BatchInProgress,
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("{0}")]
    Parse(String),
    #[error("Persistence failed: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl EngineError {
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Generation(err) if err.is_cancelled())
    }

    /// User-facing remediation hint, when one exists.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            EngineError::Generation(err) => Some(err.remediation_hint()),
            _ => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Result of a cancellable pipeline. Cancellation is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> RunOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            RunOutcome::Completed(value) => Some(value),
            RunOutcome::Cancelled => None,
        }
    }
}
