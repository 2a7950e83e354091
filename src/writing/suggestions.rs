use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::ai::{
    generate_with_cancel, ActivityLog, ActivityRecord, GenerationKind, GenerationProvider,
    GenerationRequest, GenerationSettings,
};
use crate::workspace::SuggestionSettings;

use super::error::{EngineError, EngineResult, RunOutcome, ValidationError};
use super::history::{HistoryController, SnapshotOptions};
use super::prompts::{suggestion_prompt, ChapterContext};
use super::snapshot::HistoryKind;

pub const BEFORE_APPLY_LABEL: &str = "before apply";
pub const AFTER_APPLY_LABEL: &str = "after apply";

static SUGGESTION_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*#{2,3}[ \t]*suggestion[ \t]*(\d+)[ \t]*[:：.\-]?[ \t]*(.*)$").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Rewrite,
    Tone,
    Expand,
    Summary,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::Rewrite => "rewrite",
            SuggestionType::Tone => "tone",
            SuggestionType::Expand => "expand",
            SuggestionType::Summary => "summary",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            SuggestionType::Rewrite => {
                "Rewrite the passage so it reads more vividly and clearly, keeping its meaning."
            }
            SuggestionType::Tone => {
                "Rework the passage's tone and mood while keeping its events intact."
            }
            SuggestionType::Expand => {
                "Expand the passage with sensory detail, interiority and dialogue where it fits."
            }
            SuggestionType::Summary => "Condense the passage to its essential beats.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub id: Uuid,
    pub title: String,
    pub body: String,
}

/// Half-open range in characters (not bytes) of the live draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start: usize,
    pub end: usize,
}

impl SelectionRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The selection as sent to the model. `range` and `original` always cover
/// the full selection, even when `text` was truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedSelection {
    pub text: String,
    pub original: String,
    pub range: SelectionRange,
    pub was_truncated: bool,
}

impl CapturedSelection {
    /// True when `draft` still holds the captured text at `range`.
    pub fn matches(&self, draft: &str) -> bool {
        draft
            .chars()
            .skip(self.range.start)
            .take(self.range.len())
            .eq(self.original.chars())
    }
}

pub fn capture_selection(
    draft: &str,
    range: SelectionRange,
    cap: usize,
) -> Result<CapturedSelection, ValidationError> {
    let total = draft.chars().count();
    if range.start > range.end || range.end > total {
        return Err(ValidationError::InvalidSelection {
            start: range.start,
            end: range.end,
        });
    }
    let selected: String = draft
        .chars()
        .skip(range.start)
        .take(range.len())
        .collect();
    if selected.trim().is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    let was_truncated = range.len() > cap;
    let text = if was_truncated {
        selected.chars().take(cap).collect()
    } else {
        selected.clone()
    };
    Ok(CapturedSelection {
        text,
        original: selected,
        range,
        was_truncated,
    })
}

/// Splits a response on `## Suggestion N: <title>` headings. Text before the
/// first heading and headings with no body are dropped.
pub fn parse_suggestions(raw: &str) -> Vec<Suggestion> {
    let headings: Vec<_> = SUGGESTION_HEADING_RE.captures_iter(raw).collect();
    let mut suggestions = Vec::new();
    for (index, captures) in headings.iter().enumerate() {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let body_end = headings
            .get(index + 1)
            .and_then(|next| next.get(0))
            .map(|next| next.start())
            .unwrap_or(raw.len());
        let body = raw[whole.end()..body_end].trim();
        if body.is_empty() {
            continue;
        }
        let number = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let title = captures
            .get(2)
            .map(|m| m.as_str().trim().trim_matches('*').trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Suggestion {number}"));
        suggestions.push(Suggestion {
            id: Uuid::new_v4(),
            title,
            body: body.to_string(),
        });
    }
    suggestions
}

fn splice(draft: &str, range: SelectionRange, replacement: &str) -> String {
    let mut out: String = draft.chars().take(range.start).collect();
    out.push_str(replacement);
    out.extend(draft.chars().skip(range.end));
    out
}

/// Selection-scoped AI suggestions for the active chapter.
#[derive(Debug)]
pub struct SuggestionPipeline {
    settings: SuggestionSettings,
    chapter_id: Option<Uuid>,
    selection: Option<CapturedSelection>,
    suggestions: Vec<Suggestion>,
}

impl SuggestionPipeline {
    pub fn new(settings: SuggestionSettings) -> Self {
        Self {
            settings,
            chapter_id: None,
            selection: None,
            suggestions: Vec::new(),
        }
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn selection(&self) -> Option<&CapturedSelection> {
        self.selection.as_ref()
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn request(
        &mut self,
        history: &HistoryController,
        provider: &dyn GenerationProvider,
        settings: &GenerationSettings,
        context: &ChapterContext,
        kind: SuggestionType,
        range: SelectionRange,
        activity: &ActivityLog,
        cancel: &CancellationToken,
    ) -> EngineResult<RunOutcome<Vec<Suggestion>>> {
        let (Some(chapter_id), Some(draft)) = (history.chapter_id(), history.draft()) else {
            return Err(ValidationError::NoChapterSelected.into());
        };
        if settings.provider.trim().is_empty() {
            return Err(ValidationError::ProviderNotConfigured.into());
        }
        if range.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }
        let captured = capture_selection(draft, range, self.settings.selection_char_cap)?;
        if captured.was_truncated {
            info!(
                selected = range.len(),
                cap = self.settings.selection_char_cap,
                "selection truncated for suggestion request"
            );
        }

        let prompt = suggestion_prompt(kind, &captured.text, context);
        let request = GenerationRequest {
            prompt: prompt.clone(),
            kind: GenerationKind::Suggestion,
            settings: settings.clone(),
        };
        let outcome = generate_with_cancel(provider, request, cancel).await;
        activity.record(
            ActivityRecord::new(GenerationKind::Suggestion, prompt)
                .for_chapter(Some(chapter_id))
                .with_suggestion_type(kind.as_str())
                .with_outcome(&outcome),
        );
        let raw = match outcome {
            Ok(raw) => raw,
            Err(err) if err.is_cancelled() => return Ok(RunOutcome::Cancelled),
            Err(err) => return Err(err.into()),
        };

        let parsed = parse_suggestions(&raw);
        if parsed.is_empty() {
            warn!(chars = raw.chars().count(), "suggestion response had no suggestion headings");
            return Err(EngineError::Parse("could not parse suggestions".into()));
        }
        info!(%chapter_id, count = parsed.len(), kind = kind.as_str(), "suggestions ready");
        self.chapter_id = Some(chapter_id);
        self.selection = Some(captured);
        self.suggestions = parsed.clone();
        Ok(RunOutcome::Completed(parsed))
    }

    /// Replaces the stored selection with the suggestion body, bracketed by
    /// forced snapshots.
    pub async fn apply(&mut self, history: &mut HistoryController, suggestion_id: Uuid) -> EngineResult<()> {
        let chapter_id = history
            .chapter_id()
            .ok_or(ValidationError::NoChapterSelected)?;
        if self.chapter_id != Some(chapter_id) {
            return Err(ValidationError::SuggestionNotFound(suggestion_id).into());
        }
        let suggestion = self
            .suggestions
            .iter()
            .find(|s| s.id == suggestion_id)
            .cloned()
            .ok_or(ValidationError::SuggestionNotFound(suggestion_id))?;
        let selection = self
            .selection
            .as_ref()
            .ok_or(ValidationError::EmptySelection)?;
        let range = selection.range;
        let draft = history.draft().unwrap_or_default().to_string();
        if range.end > draft.chars().count() {
            return Err(ValidationError::InvalidSelection {
                start: range.start,
                end: range.end,
            }
            .into());
        }
        if !selection.matches(&draft) {
            warn!(%chapter_id, start = range.start, end = range.end, "selection changed before apply");
            return Err(ValidationError::StaleSelection.into());
        }

        history
            .try_snapshot(
                HistoryKind::Manual,
                SnapshotOptions::forced().labelled(BEFORE_APPLY_LABEL),
            )
            .await?;
        history
            .replace_draft(splice(&draft, range, &suggestion.body))
            .await?;
        history
            .snapshot(
                HistoryKind::Manual,
                SnapshotOptions::forced().labelled(AFTER_APPLY_LABEL),
            )
            .await;
        info!(%chapter_id, %suggestion_id, "suggestion applied");
        self.reset();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.chapter_id = None;
        self.selection = None;
        self.suggestions.clear();
    }

    /// Suggestions never outlive the chapter they were made for.
    pub fn on_chapter_switch(&mut self, chapter_id: Option<Uuid>) {
        if self.chapter_id.is_some() && self.chapter_id != chapter_id {
            self.reset();
        }
    }
}
