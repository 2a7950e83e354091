use serde::{Deserialize, Serialize};

use super::plot::{PlotFormState, StructureType};

/// Default number of plot editor states kept for undo.
pub const MAX_HISTORY_SIZE: usize = 50;

/// Snapshot of the plot form pushed on every structural or field edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoHistoryState {
    pub form_data: PlotFormState,
    pub structure_type: StructureType,
    pub timestamp_ms: i64,
}

/// Bounded linear history with a movable cursor.
///
/// Pushing after an undo discards every state past the cursor, so the redo
/// branch is lost. When full, the oldest state is evicted.
#[derive(Debug, Clone)]
pub struct UndoStack<T> {
    states: Vec<T>,
    index: Option<usize>,
    capacity: usize,
}

impl<T> UndoStack<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            states: Vec::new(),
            index: None,
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, state: T) {
        if let Some(index) = self.index {
            self.states.truncate(index + 1);
        } else {
            self.states.clear();
        }
        self.states.push(state);
        if self.states.len() > self.capacity {
            self.states.remove(0);
        }
        self.index = Some(self.states.len() - 1);
    }

    pub fn undo(&mut self) -> Option<&T> {
        match self.index {
            Some(index) if index > 0 => {
                self.index = Some(index - 1);
                self.states.get(index - 1)
            }
            _ => None,
        }
    }

    pub fn redo(&mut self) -> Option<&T> {
        match self.index {
            Some(index) if index + 1 < self.states.len() => {
                self.index = Some(index + 1);
                self.states.get(index + 1)
            }
            _ => None,
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.index.and_then(|index| self.states.get(index))
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.index, Some(index) if index > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.index, Some(index) if index + 1 < self.states.len())
    }

    /// Clears everything; used when the editing context (project) changes.
    pub fn reset(&mut self) {
        self.states.clear();
        self.index = None;
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for UndoStack<T> {
    fn default() -> Self {
        Self::new(MAX_HISTORY_SIZE)
    }
}
