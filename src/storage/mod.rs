pub mod ai_layer;
pub mod history;
pub mod projects;

pub use history::{FileHistoryPersistence, HistoryPersistence, MemoryHistoryPersistence};
pub use projects::{FileProjectStore, MemoryProjectStore, ProjectStore};
