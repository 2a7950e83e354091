pub mod logging;
pub mod services;
pub mod session;
pub mod storage;
pub mod workspace;
pub mod writing;

// Re-export commonly used types for convenience.
pub use services::ai::{GenerationError, GenerationProvider, ScriptedProvider};
pub use session::WritingSession;
pub use workspace::{AppConfig, Workspace};
pub use writing::error::{EngineError, EngineResult, RunOutcome, ValidationError};
