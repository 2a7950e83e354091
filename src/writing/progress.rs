use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Chapter-count progress of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed.min(self.total) * 100) / self.total) as u8
    }
}

/// Tracks one batch job and emits a structured event per stage.
#[derive(Debug)]
pub struct BatchProgressTracker {
    job_id: Uuid,
    started_at: DateTime<Utc>,
    started_instant: Instant,
    progress: BatchProgress,
    status: String,
}

impl BatchProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            started_at: Utc::now(),
            started_instant: Instant::now(),
            progress: BatchProgress { completed: 0, total },
            status: String::new(),
        }
    }

    pub fn start(&mut self, status: &str) {
        self.emit("start", status);
    }

    /// Sets the completed count once parsing has settled.
    pub fn complete(&mut self, completed: usize, status: &str) {
        self.progress.completed = completed.min(self.progress.total);
        self.emit("progress", status);
    }

    pub fn finish(&mut self, status: &str) {
        self.emit("finish", status);
    }

    fn emit(&mut self, stage: &str, status: &str) {
        self.status = status.to_string();
        info!(
            job_id = %self.job_id,
            stage,
            status,
            completed = self.progress.completed,
            total = self.progress.total,
            percent = self.progress.percent(),
            elapsed_ms = self.elapsed_ms(),
            "batch generation progress"
        );
    }

    pub fn progress(&self) -> BatchProgress {
        self.progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.started_instant.elapsed().as_millis() as i64
    }
}
