use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::storage::ProjectStore;

use super::diff::{diff, DiffSegment};
use super::error::{EngineResult, ValidationError};
use super::project::{content_hash, Chapter};
use super::snapshot::{HistoryEntry, HistoryKind, NewSnapshot, SnapshotStore};
use super::timer::DebounceTimer;

pub const INITIAL_STATE_LABEL: &str = "initial state";
pub const PRE_RESTORE_LABEL: &str = "pre-restore";

/// Knobs for a single snapshot attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// Content to record; the live draft when absent.
    pub content: Option<String>,
    pub label: Option<String>,
    /// Skip the compare-to-latest dedup.
    pub force: bool,
}

impl SnapshotOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

#[derive(Debug, Clone)]
struct ActiveChapter {
    project_id: Uuid,
    chapter_id: Uuid,
    draft: String,
    saved_hash: String,
    entries: Vec<HistoryEntry>,
    selected: Option<Uuid>,
}

/// Owns the live draft and timeline of the chapter being edited.
pub struct HistoryController {
    store: SnapshotStore,
    projects: Arc<dyn ProjectStore>,
    autosave: DebounceTimer,
    active: Option<ActiveChapter>,
}

impl HistoryController {
    pub fn new(store: SnapshotStore, projects: Arc<dyn ProjectStore>, autosave_delay: Duration) -> Self {
        Self {
            store,
            projects,
            autosave: DebounceTimer::new(autosave_delay),
            active: None,
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn project_id(&self) -> Option<Uuid> {
        self.active.as_ref().map(|a| a.project_id)
    }

    pub fn chapter_id(&self) -> Option<Uuid> {
        self.active.as_ref().map(|a| a.chapter_id)
    }

    pub fn draft(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.draft.as_str())
    }

    /// Timeline of the active chapter, newest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        self.active
            .as_ref()
            .map(|a| a.entries.as_slice())
            .unwrap_or_default()
    }

    pub fn has_pending_autosave(&self) -> bool {
        self.autosave.is_pending()
    }

    pub fn autosave_deadline(&self) -> Option<Instant> {
        self.autosave.deadline()
    }

    /// Switches to `chapter`, flushing the outgoing one first.
    pub async fn open_chapter(&mut self, project_id: Uuid, chapter: &Chapter) -> EngineResult<()> {
        if let Err(err) = self.flush().await {
            warn!(error = %err, "failed to flush outgoing chapter; switching anyway");
        }
        let entries = self.store.list(project_id, chapter.id).await?;
        let selected = entries.first().map(|e| e.id);
        info!(
            %project_id,
            chapter_id = %chapter.id,
            entries = entries.len(),
            "chapter history loaded"
        );
        let bootstrap = entries.is_empty() && !chapter.draft_text.trim().is_empty();
        self.active = Some(ActiveChapter {
            project_id,
            chapter_id: chapter.id,
            draft: chapter.draft_text.clone(),
            saved_hash: content_hash(&chapter.draft_text),
            entries,
            selected,
        });
        if bootstrap {
            self.snapshot(
                HistoryKind::Manual,
                SnapshotOptions::forced().labelled(INITIAL_STATE_LABEL),
            )
            .await;
        }
        Ok(())
    }

    /// Persists the live draft and settles any pending auto-save.
    pub async fn flush(&mut self) -> EngineResult<()> {
        if self.active.is_none() {
            self.autosave.cancel();
            return Ok(());
        }
        let pending = self.autosave.is_pending();
        self.autosave.cancel();
        let persisted = self.persist_draft().await;
        if pending {
            self.snapshot(HistoryKind::Auto, SnapshotOptions::default())
                .await;
        }
        persisted.map(|_| ())
    }

    pub async fn close_chapter(&mut self) -> EngineResult<()> {
        let flushed = self.flush().await;
        self.active = None;
        flushed
    }

    /// Records an editor change and restarts the auto-save countdown.
    pub fn edit(&mut self, text: impl Into<String>, now: Instant) -> EngineResult<()> {
        let active = self
            .active
            .as_mut()
            .ok_or(ValidationError::NoChapterSelected)?;
        active.draft = text.into();
        self.autosave.restart(now);
        Ok(())
    }

    /// Fires the auto-save when due. Returns true when a snapshot was written.
    pub async fn tick(&mut self, now: Instant) -> bool {
        if !self.autosave.take_due(now) {
            return false;
        }
        if let Err(err) = self.persist_draft().await {
            warn!(error = %err, "auto-save could not persist the draft");
        }
        self.snapshot(HistoryKind::Auto, SnapshotOptions::default())
            .await
    }

    /// Best-effort snapshot. Failures are logged, never returned.
    pub async fn snapshot(&mut self, kind: HistoryKind, options: SnapshotOptions) -> bool {
        match self.try_snapshot(kind, options).await {
            Ok(written) => written,
            Err(err) => {
                warn!(kind = kind.as_str(), error = %err, "snapshot skipped");
                false
            }
        }
    }

    /// Snapshot that surfaces persistence errors. Returns false on a dedup no-op.
    pub async fn try_snapshot(&mut self, kind: HistoryKind, options: SnapshotOptions) -> EngineResult<bool> {
        let active = self
            .active
            .as_mut()
            .ok_or(ValidationError::NoChapterSelected)?;
        let content = options.content.unwrap_or_else(|| active.draft.clone());
        if !options.force
            && active
                .entries
                .first()
                .is_some_and(|latest| latest.content == content)
        {
            debug!(chapter_id = %active.chapter_id, "snapshot matches latest entry; skipped");
            return Ok(false);
        }
        let snapshot = NewSnapshot {
            content,
            kind,
            label: options.label,
        };
        let entry = self
            .store
            .save(active.project_id, active.chapter_id, snapshot)
            .await?;
        info!(
            chapter_id = %active.chapter_id,
            entry_id = %entry.id,
            kind = kind.as_str(),
            label = entry.label.as_deref().unwrap_or(""),
            "snapshot recorded"
        );
        active.selected = Some(entry.id);
        active.entries.insert(0, entry);
        active.entries.truncate(self.store.cap());
        Ok(true)
    }

    pub async fn manual_snapshot(&mut self, label: Option<String>) -> EngineResult<bool> {
        let options = SnapshotOptions {
            label,
            ..SnapshotOptions::default()
        };
        self.try_snapshot(HistoryKind::Manual, options).await
    }

    /// Brings an older entry back as the live draft. Returns false when the
    /// draft already matches it.
    pub async fn restore(&mut self, entry_id: Uuid) -> EngineResult<bool> {
        let active = self
            .active
            .as_ref()
            .ok_or(ValidationError::NoChapterSelected)?;
        let entry = active
            .entries
            .iter()
            .find(|e| e.id == entry_id)
            .ok_or(ValidationError::EntryNotFound(entry_id))?;
        if entry.content == active.draft {
            debug!(%entry_id, "restore target equals live draft; nothing to do");
            return Ok(false);
        }
        let content = entry.content.clone();
        self.try_snapshot(
            HistoryKind::Restore,
            SnapshotOptions::forced().labelled(PRE_RESTORE_LABEL),
        )
        .await?;
        self.replace_draft(content).await?;
        info!(%entry_id, "history entry restored");
        Ok(true)
    }

    pub async fn delete(&mut self, entry_id: Uuid) -> EngineResult<()> {
        let active = self
            .active
            .as_mut()
            .ok_or(ValidationError::NoChapterSelected)?;
        if !active.entries.iter().any(|e| e.id == entry_id) {
            return Err(ValidationError::EntryNotFound(entry_id).into());
        }
        self.store
            .delete(active.project_id, active.chapter_id, entry_id)
            .await?;
        active.entries.retain(|e| e.id != entry_id);
        if active.selected == Some(entry_id) {
            active.selected = active.entries.first().map(|e| e.id);
        }
        Ok(())
    }

    /// Drops the whole timeline of a chapter, e.g. when the chapter is deleted.
    pub async fn clear_history(&mut self, project_id: Uuid, chapter_id: Uuid) -> EngineResult<()> {
        self.store.clear(project_id, chapter_id).await?;
        if let Some(active) = self
            .active
            .as_mut()
            .filter(|a| a.project_id == project_id && a.chapter_id == chapter_id)
        {
            active.entries.clear();
            active.selected = None;
        }
        Ok(())
    }

    pub fn select(&mut self, entry_id: Uuid) -> EngineResult<()> {
        let active = self
            .active
            .as_mut()
            .ok_or(ValidationError::NoChapterSelected)?;
        if !active.entries.iter().any(|e| e.id == entry_id) {
            return Err(ValidationError::EntryNotFound(entry_id).into());
        }
        active.selected = Some(entry_id);
        Ok(())
    }

    pub fn selected(&self) -> Option<&HistoryEntry> {
        let active = self.active.as_ref()?;
        let id = active.selected?;
        active.entries.iter().find(|e| e.id == id)
    }

    /// Selected entry against the live draft.
    pub fn diff_selected(&self) -> Option<Vec<DiffSegment>> {
        let draft = self.draft()?;
        self.selected().map(|entry| diff(&entry.content, draft))
    }

    /// Replaces the live draft and writes it through immediately.
    pub async fn replace_draft(&mut self, text: impl Into<String>) -> EngineResult<()> {
        let active = self
            .active
            .as_mut()
            .ok_or(ValidationError::NoChapterSelected)?;
        active.draft = text.into();
        self.autosave.cancel();
        self.persist_draft().await?;
        Ok(())
    }

    /// Takes a draft that was already persisted elsewhere (batch generation).
    pub fn adopt_external_draft(&mut self, chapter_id: Uuid, text: &str) -> bool {
        match self.active.as_mut() {
            Some(active) if active.chapter_id == chapter_id => {
                active.draft = text.to_string();
                active.saved_hash = content_hash(text);
                self.autosave.cancel();
                true
            }
            _ => false,
        }
    }

    async fn persist_draft(&mut self) -> EngineResult<bool> {
        let Some(active) = self.active.as_mut() else {
            return Ok(false);
        };
        let hash = content_hash(&active.draft);
        if hash == active.saved_hash {
            return Ok(false);
        }
        self.projects
            .save_chapter_draft(active.project_id, active.chapter_id, &active.draft)
            .await?;
        active.saved_hash = hash;
        debug!(chapter_id = %active.chapter_id, "draft persisted");
        Ok(true)
    }
}
