pub mod batch;
pub mod diff;
pub mod error;
pub mod history;
pub mod plot;
pub mod plot_editor;
pub mod progress;
pub mod project;
pub mod prompts;
pub mod protection;
pub mod recovery;
pub mod refine;
pub mod snapshot;
pub mod suggestions;
pub mod timer;
pub mod undo;

pub use error::{EngineError, EngineResult, RunOutcome, ValidationError};
pub use history::{HistoryController, SnapshotOptions};
pub use snapshot::{HistoryEntry, HistoryKind, NewSnapshot, SnapshotStore};

pub type WritingResult<T> = anyhow::Result<T>;
