use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::ai::{
    generate_with_cancel, ActivityLog, ActivityRecord, GenerationKind, GenerationProvider,
    GenerationRequest, GenerationSettings,
};
use crate::storage::ProjectStore;

use super::error::{EngineResult, RunOutcome, ValidationError};
use super::progress::{BatchProgress, BatchProgressTracker};
use super::project::Project;
use super::prompts::batch_prompt;

static CHAPTER_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*#{1,3}[ \t]*chapter[ \t]+\d+\b.*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Confirming,
    Generating {
        progress: BatchProgress,
        status: String,
    },
}

impl BatchPhase {
    pub fn is_generating(&self) -> bool {
        matches!(self, BatchPhase::Generating { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Chapters whose draft was replaced, in chapter order.
    pub updated: Vec<Uuid>,
    /// Chapters left untouched because their block was missing or empty.
    pub skipped: Vec<Uuid>,
    pub block_count: usize,
    pub progress: BatchProgress,
}

/// Splits a response into chapter bodies on `## Chapter N` headings. Text
/// before the first heading is discarded.
pub fn parse_chapter_blocks(raw: &str) -> Vec<String> {
    let headings: Vec<_> = CHAPTER_HEADING_RE.find_iter(raw).collect();
    headings
        .iter()
        .enumerate()
        .map(|(index, heading)| {
            let end = headings
                .get(index + 1)
                .map(|next| next.start())
                .unwrap_or(raw.len());
            raw[heading.end()..end].trim().to_string()
        })
        .collect()
}

/// Confirmation-gated "generate every chapter" flow.
#[derive(Debug)]
pub struct BatchOrchestrator {
    phase: watch::Sender<BatchPhase>,
}

impl Default for BatchOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchOrchestrator {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(BatchPhase::Idle);
        Self { phase }
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase.borrow().clone()
    }

    /// Live view of the phase for progress displays.
    pub fn subscribe(&self) -> watch::Receiver<BatchPhase> {
        self.phase.subscribe()
    }

    pub fn request_confirmation(&mut self, project: &Project) -> EngineResult<()> {
        if self.phase.borrow().is_generating() {
            return Err(ValidationError::BatchInProgress.into());
        }
        if project.chapters.is_empty() {
            return Err(ValidationError::NoChapters.into());
        }
        self.phase.send_replace(BatchPhase::Confirming);
        Ok(())
    }

    pub fn decline(&mut self) {
        if *self.phase.borrow() == BatchPhase::Confirming {
            self.phase.send_replace(BatchPhase::Idle);
        }
    }

    /// Generates every chapter in one call and writes the parsed blocks back.
    /// The phase is `Idle` again whenever this returns.
    pub async fn run(
        &mut self,
        project: &mut Project,
        projects: &dyn ProjectStore,
        provider: &dyn GenerationProvider,
        settings: &GenerationSettings,
        activity: &ActivityLog,
        cancel: &CancellationToken,
    ) -> EngineResult<RunOutcome<BatchReport>> {
        if *self.phase.borrow() != BatchPhase::Confirming {
            return Err(ValidationError::NotConfirmed.into());
        }
        if settings.provider.trim().is_empty() {
            self.phase.send_replace(BatchPhase::Idle);
            return Err(ValidationError::ProviderNotConfigured.into());
        }
        let result = self
            .generate(project, projects, provider, settings, activity, cancel)
            .await;
        self.phase.send_replace(BatchPhase::Idle);
        result
    }

    async fn generate(
        &mut self,
        project: &mut Project,
        projects: &dyn ProjectStore,
        provider: &dyn GenerationProvider,
        settings: &GenerationSettings,
        activity: &ActivityLog,
        cancel: &CancellationToken,
    ) -> EngineResult<RunOutcome<BatchReport>> {
        let mut tracker = BatchProgressTracker::new(project.chapters.len());
        tracker.start("Generating all chapters");
        self.publish(&tracker);

        let prompt = batch_prompt(project);
        let request = GenerationRequest {
            prompt: prompt.clone(),
            kind: GenerationKind::BatchChapters,
            settings: settings.clone(),
        };
        let outcome = generate_with_cancel(provider, request, cancel).await;
        activity.record(ActivityRecord::new(GenerationKind::BatchChapters, prompt).with_outcome(&outcome));
        let raw = match outcome {
            Ok(raw) => raw,
            Err(err) if err.is_cancelled() => {
                info!(project_id = %project.id, "batch generation cancelled");
                return Ok(RunOutcome::Cancelled);
            }
            Err(err) => return Err(err.into()),
        };

        let blocks = parse_chapter_blocks(&raw);
        if blocks.len() != project.chapters.len() {
            warn!(
                blocks = blocks.len(),
                chapters = project.chapters.len(),
                "batch response block count differs from chapter count"
            );
        }
        // The open project changes only once the save has succeeded.
        let mut next = project.clone();
        let mut updated = Vec::new();
        let mut skipped = Vec::new();
        for (index, chapter) in next.chapters.iter_mut().enumerate() {
            match blocks.get(index).filter(|block| !block.is_empty()) {
                Some(block) => {
                    chapter.draft_text = block.clone();
                    updated.push(chapter.id);
                }
                None => skipped.push(chapter.id),
            }
        }
        tracker.complete(updated.len(), "Chapters parsed");
        self.publish(&tracker);

        if !updated.is_empty() {
            next.touch();
            projects.save_project(&next).await?;
            *project = next;
        }
        tracker.finish("Batch generation finished");

        Ok(RunOutcome::Completed(BatchReport {
            job_id: tracker.job_id(),
            started_at: tracker.started_at(),
            updated,
            skipped,
            block_count: blocks.len(),
            progress: tracker.progress(),
        }))
    }

    fn publish(&self, tracker: &BatchProgressTracker) {
        self.phase.send_replace(BatchPhase::Generating {
            progress: tracker.progress(),
            status: tracker.status().to_string(),
        });
    }
}
