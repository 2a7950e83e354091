use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::ai::{ActivityLog, GenerationProvider, GenerationSettings};
use crate::storage::{
    FileHistoryPersistence, FileProjectStore, HistoryPersistence, ProjectStore,
};
use crate::workspace::{AppConfig, Workspace, WorkspacePaths};
use crate::writing::batch::{BatchOrchestrator, BatchPhase, BatchReport};
use crate::writing::diff::DiffSegment;
use crate::writing::error::{EngineError, EngineResult, RunOutcome, ValidationError};
use crate::writing::history::HistoryController;
use crate::writing::plot::{Plot, StructureType};
use crate::writing::plot_editor::{PlotEditor, SyncOutcome};
use crate::writing::project::{Project, ProjectPaths};
use crate::writing::prompts::ChapterContext;
use crate::writing::refine::{ImprovementLogEntry, RefineReport, SelfRefineEngine};
use crate::writing::snapshot::{HistoryEntry, SnapshotStore};
use crate::writing::suggestions::{SelectionRange, Suggestion, SuggestionPipeline, SuggestionType};

/// What a `tick` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub snapshot_written: bool,
    pub plot_saved: bool,
}

/// Single facade over the draft engine for every presentation surface.
pub struct WritingSession {
    config: AppConfig,
    paths: Option<WorkspacePaths>,
    projects: Arc<dyn ProjectStore>,
    provider: Arc<dyn GenerationProvider>,
    activity: ActivityLog,
    project: Option<Project>,
    history: HistoryController,
    suggestions: SuggestionPipeline,
    refine: SelfRefineEngine,
    batch: BatchOrchestrator,
    plot: PlotEditor,
}

impl WritingSession {
    pub fn new(
        config: AppConfig,
        projects: Arc<dyn ProjectStore>,
        history: Arc<dyn HistoryPersistence>,
        provider: Arc<dyn GenerationProvider>,
    ) -> Self {
        let store = SnapshotStore::new(history, config.history.timeline_cap);
        Self {
            history: HistoryController::new(
                store,
                projects.clone(),
                config.history.autosave_debounce(),
            ),
            suggestions: SuggestionPipeline::new(config.suggestions.clone()),
            refine: SelfRefineEngine::new(config.refine.clone()),
            batch: BatchOrchestrator::new(),
            plot: PlotEditor::new(&config.plot),
            paths: None,
            activity: ActivityLog::disabled(),
            project: None,
            projects,
            provider,
            config,
        }
    }

    /// File-backed session rooted in `workspace`. Each opened project gets a
    /// JSONL activity log in its AI layer.
    pub fn for_workspace(workspace: &Workspace, provider: Arc<dyn GenerationProvider>) -> Self {
        let mut session = Self::new(
            workspace.config.clone(),
            Arc::new(FileProjectStore::new(workspace.paths.clone())),
            Arc::new(FileHistoryPersistence::new(workspace.paths.clone())),
            provider,
        );
        session.paths = Some(workspace.paths.clone());
        session
    }

    pub fn with_activity_log(mut self, activity: ActivityLog) -> Self {
        self.activity = activity;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn history(&self) -> &HistoryController {
        &self.history
    }

    fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings::from(&self.config.provider)
    }

    fn active_project(&self) -> EngineResult<&Project> {
        self.project
            .as_ref()
            .ok_or_else(|| ValidationError::NoProjectOpen.into())
    }

    fn chapter_context(&self) -> EngineResult<ChapterContext> {
        let project = self.active_project()?;
        let chapter_id = self
            .history
            .chapter_id()
            .ok_or(ValidationError::NoChapterSelected)?;
        ChapterContext::from_project(project, chapter_id)
            .ok_or_else(|| ValidationError::ChapterNotFound(chapter_id).into())
    }

    /// Copies the live draft into the in-memory project.
    fn sync_live_draft(&mut self) {
        let (Some(chapter_id), Some(draft)) = (self.history.chapter_id(), self.history.draft()) else {
            return;
        };
        if let Some(chapter) = self
            .project
            .as_mut()
            .and_then(|project| project.chapter_mut(chapter_id))
        {
            chapter.draft_text = draft.to_string();
        }
    }

    pub async fn create_project(&mut self, project: Project) -> EngineResult<Uuid> {
        self.projects.save_project(&project).await?;
        info!(project_id = %project.id, title = %project.title, "project created");
        Ok(project.id)
    }

    pub async fn open_project(&mut self, project_id: Uuid, now: Instant) -> EngineResult<()> {
        let project = self
            .projects
            .load_project(project_id)
            .await?
            .ok_or_else(|| EngineError::Persistence(anyhow!("Project {project_id} not found")))?;
        self.sync_live_draft();
        if let Err(err) = self.history.close_chapter().await {
            warn!(error = %err, "failed to flush chapter while switching project");
        }
        self.suggestions.reset();
        self.plot.sync_from_project(project.id, &project.plot, now);
        if let Some(paths) = &self.paths {
            self.activity = ActivityLog::jsonl(ProjectPaths::new(paths, project.id).activity_log_path);
        }
        self.config.last_active_project_id = Some(project.id.to_string());
        info!(%project_id, chapters = project.chapters.len(), "project opened");
        self.project = Some(project);
        Ok(())
    }

    /// Flushes the outgoing chapter, then loads the timeline of `chapter_id`.
    pub async fn select_chapter(&mut self, chapter_id: Uuid) -> EngineResult<()> {
        // Live text must reach the project before the chapter is read back.
        self.sync_live_draft();
        let project = self.active_project()?;
        let project_id = project.id;
        let chapter = project
            .chapter(chapter_id)
            .cloned()
            .ok_or(ValidationError::ChapterNotFound(chapter_id))?;
        if self.history.chapter_id() == Some(chapter_id) {
            return Ok(());
        }
        self.history.open_chapter(project_id, &chapter).await?;
        self.suggestions.on_chapter_switch(Some(chapter_id));
        Ok(())
    }

    pub fn edit(&mut self, text: impl Into<String>, now: Instant) -> EngineResult<()> {
        self.history.edit(text, now)
    }

    /// Drives every timer: draft auto-save and the debounced plot write-back.
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        let snapshot_written = self.history.tick(now).await;
        let mut plot_saved = false;
        if self.plot.take_due_save(now) {
            plot_saved = self.persist_plot().await;
        }
        TickReport {
            snapshot_written,
            plot_saved,
        }
    }

    pub async fn flush(&mut self) -> EngineResult<()> {
        self.history.flush().await?;
        self.sync_live_draft();
        if self.plot.has_pending_save() {
            self.persist_plot().await;
        }
        Ok(())
    }

    pub fn history_entries(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub async fn manual_snapshot(&mut self, label: Option<String>) -> EngineResult<bool> {
        self.history.manual_snapshot(label).await
    }

    pub async fn restore(&mut self, entry_id: Uuid) -> EngineResult<bool> {
        let restored = self.history.restore(entry_id).await?;
        self.sync_live_draft();
        Ok(restored)
    }

    pub async fn delete_entry(&mut self, entry_id: Uuid) -> EngineResult<()> {
        self.history.delete(entry_id).await
    }

    pub fn select_entry(&mut self, entry_id: Uuid) -> EngineResult<()> {
        self.history.select(entry_id)
    }

    pub fn diff_selected(&self) -> Option<Vec<DiffSegment>> {
        self.history.diff_selected()
    }

    pub async fn request_suggestions(
        &mut self,
        kind: SuggestionType,
        range: SelectionRange,
        cancel: &CancellationToken,
    ) -> EngineResult<RunOutcome<Vec<Suggestion>>> {
        if self.history.chapter_id().is_none() {
            return Err(ValidationError::NoChapterSelected.into());
        }
        let context = self.chapter_context()?;
        let settings = self.generation_settings();
        self.suggestions
            .request(
                &self.history,
                self.provider.as_ref(),
                &settings,
                &context,
                kind,
                range,
                &self.activity,
                cancel,
            )
            .await
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        self.suggestions.suggestions()
    }

    pub async fn apply_suggestion(&mut self, suggestion_id: Uuid) -> EngineResult<()> {
        self.suggestions
            .apply(&mut self.history, suggestion_id)
            .await?;
        self.sync_live_draft();
        Ok(())
    }

    pub fn reset_suggestions(&mut self) {
        self.suggestions.reset();
    }

    pub async fn self_refine(&mut self, cancel: &CancellationToken) -> EngineResult<RunOutcome<RefineReport>> {
        if self.history.chapter_id().is_none() {
            return Err(ValidationError::NoChapterSelected.into());
        }
        let context = self.chapter_context()?;
        let settings = self.generation_settings();
        let outcome = self
            .refine
            .run(
                &mut self.history,
                self.provider.as_ref(),
                &settings,
                &context,
                &self.activity,
                cancel,
            )
            .await?;
        self.sync_live_draft();
        Ok(outcome)
    }

    pub fn improvement_log(&self) -> &[ImprovementLogEntry] {
        match self.history.chapter_id() {
            Some(chapter_id) => self.refine.log_for(chapter_id),
            None => &[],
        }
    }

    pub fn batch_phase(&self) -> BatchPhase {
        self.batch.phase()
    }

    pub fn subscribe_batch(&self) -> watch::Receiver<BatchPhase> {
        self.batch.subscribe()
    }

    pub fn request_batch(&mut self) -> EngineResult<()> {
        let project = self
            .project
            .as_ref()
            .ok_or(ValidationError::NoProjectOpen)?;
        self.batch.request_confirmation(project)
    }

    pub fn decline_batch(&mut self) {
        self.batch.decline();
    }

    /// Runs a confirmed batch. The open chapter is flushed first and picks up
    /// its generated draft afterwards.
    pub async fn run_batch(&mut self, cancel: &CancellationToken) -> EngineResult<RunOutcome<BatchReport>> {
        if self.project.is_none() {
            return Err(ValidationError::NoProjectOpen.into());
        }
        if let Err(err) = self.history.flush().await {
            warn!(error = %err, "failed to flush chapter before batch generation");
        }
        self.sync_live_draft();
        let settings = self.generation_settings();
        let Some(project) = self.project.as_mut() else {
            return Err(ValidationError::NoProjectOpen.into());
        };
        let outcome = self
            .batch
            .run(
                project,
                self.projects.as_ref(),
                self.provider.as_ref(),
                &settings,
                &self.activity,
                cancel,
            )
            .await?;
        if let (RunOutcome::Completed(report), Some(chapter_id)) = (&outcome, self.history.chapter_id()) {
            if report.updated.contains(&chapter_id) {
                if let Some(chapter) = project.chapter(chapter_id) {
                    self.history.adopt_external_draft(chapter_id, &chapter.draft_text);
                }
            }
        }
        Ok(outcome)
    }

    pub fn plot(&self) -> &Plot {
        self.plot.plot()
    }

    pub fn plot_guarded(&self, now: Instant) -> bool {
        self.plot.is_guarded(now)
    }

    /// Switches structure and writes it back immediately.
    pub async fn set_structure(&mut self, structure: StructureType, now: Instant) -> EngineResult<bool> {
        self.active_project()?;
        if !self.plot.set_structure(structure, now) {
            return Ok(false);
        }
        self.persist_plot().await;
        Ok(true)
    }

    pub fn set_plot_field(&mut self, name: &str, value: &str, now: Instant) -> EngineResult<bool> {
        self.active_project()?;
        Ok(self.plot.set_field(name, value, now))
    }

    pub fn undo_plot(&mut self, now: Instant) -> Option<Plot> {
        self.plot.undo(now).cloned()
    }

    pub fn redo_plot(&mut self, now: Instant) -> Option<Plot> {
        self.plot.redo(now).cloned()
    }

    pub fn can_undo_plot(&self) -> bool {
        self.plot.can_undo()
    }

    pub fn can_redo_plot(&self) -> bool {
        self.plot.can_redo()
    }

    /// Merges a project update pushed from outside the session (another
    /// window, a reload). The plot goes through the structure guard.
    pub fn apply_external_update(&mut self, mut incoming: Project, now: Instant) -> SyncOutcome {
        let outcome = self.plot.sync_from_project(incoming.id, &incoming.plot, now);
        incoming.plot = self.plot.plot().clone();
        if let (Some(chapter_id), Some(draft)) = (self.history.chapter_id(), self.history.draft()) {
            if let Some(chapter) = incoming.chapter_mut(chapter_id) {
                chapter.draft_text = draft.to_string();
            }
        }
        self.project = Some(incoming);
        outcome
    }

    pub async fn close(&mut self) -> EngineResult<()> {
        self.flush().await?;
        self.history.close_chapter().await?;
        self.suggestions.reset();
        Ok(())
    }

    async fn persist_plot(&mut self) -> bool {
        let plot = self.plot.plot().clone();
        let Some(project) = self.project.as_mut() else {
            return false;
        };
        project.plot = plot.clone();
        match self.projects.save_plot(project.id, &plot).await {
            Ok(()) => true,
            Err(err) => {
                warn!(project_id = %project.id, error = %err, "plot write-back failed");
                false
            }
        }
    }
}
