use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::workspace::PlotSettings;

use super::plot::{Plot, StructureType};
use super::protection::ProtectionWindow;
use super::timer::DebounceTimer;
use super::undo::{UndoHistoryState, UndoStack};

/// How an external project update was merged into the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Different project: everything replaced, undo history reset.
    FullResync,
    /// Guard active: field values taken, local structure type kept.
    StructurePreserved,
    /// Guard idle: incoming plot adopted as-is.
    Synced,
}

/// Plot form editing state: undo/redo history, structure guard, and the
/// debounced write-back of field edits.
#[derive(Debug)]
pub struct PlotEditor {
    project_id: Option<Uuid>,
    plot: Plot,
    history: UndoStack<UndoHistoryState>,
    guard: ProtectionWindow,
    pending_save: DebounceTimer,
}

impl PlotEditor {
    pub fn new(settings: &PlotSettings) -> Self {
        Self {
            project_id: None,
            plot: Plot::default(),
            history: UndoStack::new(settings.undo_cap),
            guard: ProtectionWindow::from_settings(settings),
            pending_save: DebounceTimer::new(settings.save_debounce()),
        }
    }

    pub fn plot(&self) -> &Plot {
        &self.plot
    }

    pub fn project_id(&self) -> Option<Uuid> {
        self.project_id
    }

    /// Merges plot data arriving from the project store.
    pub fn sync_from_project(&mut self, project_id: Uuid, incoming: &Plot, now: Instant) -> SyncOutcome {
        if self.project_id != Some(project_id) {
            info!(%project_id, "plot editor switching project; full resync");
            self.project_id = Some(project_id);
            self.plot = incoming.clone();
            self.guard.clear();
            self.pending_save.cancel();
            self.history.reset();
            self.record();
            return SyncOutcome::FullResync;
        }
        if self.guard.is_active(now) {
            debug!(
                local = self.plot.structure_type.as_str(),
                incoming = incoming.structure_type.as_str(),
                "structure guard active; syncing field values only"
            );
            self.plot.form = incoming.form.clone();
            return SyncOutcome::StructurePreserved;
        }
        self.plot = incoming.clone();
        SyncOutcome::Synced
    }

    /// Switches the active structure. The caller writes the plot back
    /// immediately; the guard covers the window until that save lands.
    pub fn set_structure(&mut self, structure: StructureType, now: Instant) -> bool {
        if self.plot.structure_type == structure {
            return false;
        }
        self.plot.structure_type = structure;
        self.guard.arm(now);
        self.record();
        true
    }

    /// Edits a field of the active structure and schedules a debounced save.
    pub fn set_field(&mut self, name: &str, value: &str, now: Instant) -> bool {
        let structure = self.plot.structure_type;
        if self.plot.form.fields(structure).get(name) == Some(value) {
            return false;
        }
        if !self.plot.form.set_field(structure, name, value) {
            return false;
        }
        self.pending_save.restart(now);
        self.record();
        true
    }

    pub fn undo(&mut self, now: Instant) -> Option<&Plot> {
        let state = self.history.undo()?.clone();
        self.apply(state, now);
        Some(&self.plot)
    }

    pub fn redo(&mut self, now: Instant) -> Option<&Plot> {
        let state = self.history.redo()?.clone();
        self.apply(state, now);
        Some(&self.plot)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn is_guarded(&self, now: Instant) -> bool {
        self.guard.is_active(now)
    }

    /// True once the debounced field save should be written.
    pub fn take_due_save(&mut self, now: Instant) -> bool {
        self.pending_save.take_due(now)
    }

    pub fn has_pending_save(&self) -> bool {
        self.pending_save.is_pending()
    }

    fn apply(&mut self, state: UndoHistoryState, now: Instant) {
        if state.structure_type != self.plot.structure_type {
            self.guard.arm(now);
        }
        self.plot.structure_type = state.structure_type;
        self.plot.form = state.form_data;
        self.pending_save.restart(now);
    }

    fn record(&mut self) {
        self.history.push(UndoHistoryState {
            form_data: self.plot.form.clone(),
            structure_type: self.plot.structure_type,
            timestamp_ms: Utc::now().timestamp_millis(),
        });
    }
}
