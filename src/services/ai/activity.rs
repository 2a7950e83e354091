use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::storage::ai_layer::{append_jsonl, read_jsonl};

use super::{GenerationError, GenerationKind};

/// One generation call as seen by the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub kind: GenerationKind,
    pub prompt: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub chapter_id: Option<Uuid>,
    #[serde(default)]
    pub suggestion_type: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(kind: GenerationKind, prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            prompt: prompt.into(),
            response: None,
            error: None,
            chapter_id: None,
            suggestion_type: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_chapter(mut self, chapter_id: Option<Uuid>) -> Self {
        self.chapter_id = chapter_id;
        self
    }

    pub fn with_suggestion_type(mut self, suggestion_type: impl Into<String>) -> Self {
        self.suggestion_type = Some(suggestion_type.into());
        self
    }

    pub fn with_outcome(mut self, outcome: &Result<String, GenerationError>) -> Self {
        match outcome {
            Ok(response) => self.response = Some(response.clone()),
            Err(err) => self.error = Some(err.to_string()),
        }
        self
    }
}

#[derive(Debug)]
enum Sink {
    Jsonl(PathBuf),
    Memory(Mutex<Vec<ActivityRecord>>),
    Disabled,
}

/// Append-only log of generation calls. Recording never fails the caller.
#[derive(Debug)]
pub struct ActivityLog {
    sink: Sink,
}

impl ActivityLog {
    pub fn jsonl(path: impl Into<PathBuf>) -> Self {
        Self {
            sink: Sink::Jsonl(path.into()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            sink: Sink::Memory(Mutex::new(Vec::new())),
        }
    }

    pub fn disabled() -> Self {
        Self { sink: Sink::Disabled }
    }

    pub fn record(&self, record: ActivityRecord) {
        let result = match &self.sink {
            Sink::Jsonl(path) => append_jsonl(path, &record),
            Sink::Memory(records) => records
                .lock()
                .map(|mut records| records.push(record))
                .map_err(|_| anyhow!("activity log lock poisoned")),
            Sink::Disabled => Ok(()),
        };
        if let Err(err) = result {
            warn!(error = %err, "failed to record generation activity");
        }
    }

    /// Records in write order.
    pub fn records(&self) -> Result<Vec<ActivityRecord>> {
        match &self.sink {
            Sink::Jsonl(path) => read_jsonl(path),
            Sink::Memory(records) => records
                .lock()
                .map(|records| records.clone())
                .map_err(|_| anyhow!("activity log lock poisoned")),
            Sink::Disabled => Ok(Vec::new()),
        }
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::disabled()
    }
}
