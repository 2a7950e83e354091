use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::ai::{
    generate_with_cancel, ActivityLog, ActivityRecord, GenerationKind, GenerationProvider,
    GenerationRequest, GenerationSettings,
};
use crate::workspace::RefineSettings;

use super::error::{EngineError, EngineResult, RunOutcome, ValidationError};
use super::history::{HistoryController, SnapshotOptions};
use super::prompts::{critique_prompt, revision_prompt, ChapterContext};
use super::recovery::{parse_record, recover_revision};
use super::snapshot::HistoryKind;

pub const BEFORE_REFINE_LABEL: &str = "before self-refine";
pub const AFTER_REFINE_LABEL: &str = "after self-refine";
pub const TRUNCATION_MARKER: &str = "[truncated]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weakness {
    #[serde(default)]
    pub aspect: String,
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: Option<f32>,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub solutions: Vec<String>,
}

/// Accepts `7`, `7.5`, `"7"`, `"7/10"` or null.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().map(|n| n as f32),
        Value::String(s) => s
            .split('/')
            .next()
            .and_then(|head| head.trim().parse::<f32>().ok()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct CritiqueRecord {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    weaknesses: Vec<Weakness>,
}

/// Phase-one output. When the response had no parseable record, `raw` is
/// carried forward alone and `weaknesses` is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Critique {
    pub summary: String,
    pub weaknesses: Vec<Weakness>,
    pub raw: String,
    pub structured: bool,
}

impl Critique {
    pub fn parse(raw: &str) -> Self {
        match parse_record::<CritiqueRecord>(raw) {
            Some(record) => Self {
                summary: record.summary,
                weaknesses: record.weaknesses,
                raw: raw.to_string(),
                structured: true,
            },
            None => Self {
                summary: String::new(),
                weaknesses: Vec::new(),
                raw: raw.to_string(),
                structured: false,
            },
        }
    }

    /// Text handed to the revision prompt.
    pub fn render(&self) -> String {
        if !self.structured {
            return self.raw.trim().to_string();
        }
        let mut out = String::new();
        if !self.summary.trim().is_empty() {
            out.push_str(self.summary.trim());
            out.push('\n');
        }
        for weakness in &self.weaknesses {
            out.push_str(&format!("- {}", weakness.aspect));
            if let Some(score) = weakness.score {
                out.push_str(&format!(" ({score}/10)"));
            }
            out.push_str(&format!(": {}", weakness.problem));
            if !weakness.solutions.is_empty() {
                out.push_str(&format!(" Fix: {}", weakness.solutions.join("; ")));
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevisionRecord {
    #[serde(default)]
    improvement_summary: String,
    #[serde(default)]
    changes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementLogEntry {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub timestamp_ms: i64,
    pub critique_raw: String,
    pub revision_summary: String,
    pub change_list: Vec<String>,
    pub original_length: usize,
    pub revised_length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefineReport {
    pub critique: Critique,
    pub revised_text: String,
    /// Recovery strategy that produced `revised_text`.
    pub strategy: &'static str,
    pub log_entry: ImprovementLogEntry,
}

/// Caps a draft for the revision prompt, marking the cut.
pub fn cap_for_revision(draft: &str, cap: usize) -> String {
    if draft.chars().count() <= cap {
        return draft.to_string();
    }
    let mut capped: String = draft.chars().take(cap).collect();
    capped.push('\n');
    capped.push_str(TRUNCATION_MARKER);
    capped
}

/// Critique-then-revise loop over the active chapter.
#[derive(Debug)]
pub struct SelfRefineEngine {
    settings: RefineSettings,
    logs: HashMap<Uuid, Vec<ImprovementLogEntry>>,
}

impl SelfRefineEngine {
    pub fn new(settings: RefineSettings) -> Self {
        Self {
            settings,
            logs: HashMap::new(),
        }
    }

    /// Improvement log of a chapter, newest first.
    pub fn log_for(&self, chapter_id: Uuid) -> &[ImprovementLogEntry] {
        self.logs
            .get(&chapter_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub async fn run(
        &mut self,
        history: &mut HistoryController,
        provider: &dyn GenerationProvider,
        settings: &GenerationSettings,
        context: &ChapterContext,
        activity: &ActivityLog,
        cancel: &CancellationToken,
    ) -> EngineResult<RunOutcome<RefineReport>> {
        let (Some(chapter_id), Some(draft)) = (history.chapter_id(), history.draft()) else {
            return Err(ValidationError::NoChapterSelected.into());
        };
        if settings.provider.trim().is_empty() {
            return Err(ValidationError::ProviderNotConfigured.into());
        }
        if draft.trim().is_empty() {
            return Err(ValidationError::EmptyDraft.into());
        }
        let draft = draft.to_string();

        let prompt = critique_prompt(&draft, context);
        let Some(critique_raw) = call(
            provider,
            settings,
            GenerationKind::Critique,
            prompt,
            chapter_id,
            activity,
            cancel,
        )
        .await?
        else {
            return Ok(RunOutcome::Cancelled);
        };
        let critique = Critique::parse(&critique_raw);
        info!(
            %chapter_id,
            structured = critique.structured,
            weaknesses = critique.weaknesses.len(),
            "critique received"
        );

        let capped = cap_for_revision(&draft, self.settings.revise_input_char_cap);
        let prompt = revision_prompt(&capped, &critique, context);
        let Some(revision_raw) = call(
            provider,
            settings,
            GenerationKind::Revision,
            prompt,
            chapter_id,
            activity,
            cancel,
        )
        .await?
        else {
            return Ok(RunOutcome::Cancelled);
        };

        let recovered = recover_revision(&revision_raw, self.settings.min_revision_chars)
            .ok_or_else(|| EngineError::Parse("could not recover revised text".into()))?;
        let record: RevisionRecord = parse_record(&revision_raw).unwrap_or_default();
        if recovered.strategy != "structured" {
            warn!(strategy = recovered.strategy, "revision recovered from malformed response");
        }

        history
            .try_snapshot(
                HistoryKind::Manual,
                SnapshotOptions::forced()
                    .labelled(BEFORE_REFINE_LABEL)
                    .with_content(draft.clone()),
            )
            .await?;
        history.replace_draft(recovered.text.clone()).await?;
        history
            .snapshot(
                HistoryKind::Manual,
                SnapshotOptions::forced().labelled(AFTER_REFINE_LABEL),
            )
            .await;

        let entry = ImprovementLogEntry {
            id: Uuid::new_v4(),
            chapter_id,
            timestamp_ms: Utc::now().timestamp_millis(),
            critique_raw: critique.raw.clone(),
            revision_summary: record.improvement_summary,
            change_list: record.changes,
            original_length: draft.chars().count(),
            revised_length: recovered.text.chars().count(),
        };
        let log = self.logs.entry(chapter_id).or_default();
        log.insert(0, entry.clone());
        log.truncate(self.settings.improvement_log_cap);
        info!(
            %chapter_id,
            strategy = recovered.strategy,
            original = entry.original_length,
            revised = entry.revised_length,
            "self-refine applied"
        );

        Ok(RunOutcome::Completed(RefineReport {
            critique,
            revised_text: recovered.text,
            strategy: recovered.strategy,
            log_entry: entry,
        }))
    }
}

/// One logged provider call. `None` means cancelled.
async fn call(
    provider: &dyn GenerationProvider,
    settings: &GenerationSettings,
    kind: GenerationKind,
    prompt: String,
    chapter_id: Uuid,
    activity: &ActivityLog,
    cancel: &CancellationToken,
) -> EngineResult<Option<String>> {
    let request = GenerationRequest {
        prompt: prompt.clone(),
        kind,
        settings: settings.clone(),
    };
    let outcome = generate_with_cancel(provider, request, cancel).await;
    activity.record(
        ActivityRecord::new(kind, prompt)
            .for_chapter(Some(chapter_id))
            .with_outcome(&outcome),
    );
    match outcome {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.is_cancelled() => Ok(None),
        Err(err) => Err(err.into()),
    }
}
