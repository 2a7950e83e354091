use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::storage::HistoryPersistence;

/// Default number of entries kept per chapter timeline.
pub const DEFAULT_TIMELINE_CAP: usize = 30;

/// Provenance of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Auto,
    Manual,
    Restore,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Auto => "auto",
            HistoryKind::Manual => "manual",
            HistoryKind::Restore => "restore",
        }
    }
}

/// Immutable point-in-time copy of a chapter draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub timestamp_ms: i64,
    pub content: String,
    pub kind: HistoryKind,
    #[serde(default)]
    pub label: Option<String>,
}

impl HistoryEntry {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }
}

/// Snapshot request before the store assigns identity and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    pub content: String,
    pub kind: HistoryKind,
    pub label: Option<String>,
}

impl NewSnapshot {
    pub fn new(content: impl Into<String>, kind: HistoryKind) -> Self {
        Self {
            content: content.into(),
            kind,
            label: None,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Per-chapter timelines, newest first, capped on every save.
#[derive(Clone)]
pub struct SnapshotStore {
    persistence: Arc<dyn HistoryPersistence>,
    cap: usize,
}

impl SnapshotStore {
    pub fn new(persistence: Arc<dyn HistoryPersistence>, cap: usize) -> Self {
        Self {
            persistence,
            cap: cap.max(1),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub async fn save(
        &self,
        project_id: Uuid,
        chapter_id: Uuid,
        snapshot: NewSnapshot,
    ) -> Result<HistoryEntry> {
        let mut timeline = self.persistence.load_timeline(project_id, chapter_id).await?;
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            chapter_id,
            timestamp_ms: Utc::now().timestamp_millis(),
            content: snapshot.content,
            kind: snapshot.kind,
            label: snapshot.label,
        };
        timeline.insert(0, entry.clone());
        if timeline.len() > self.cap {
            debug!(
                %chapter_id,
                evicted = timeline.len() - self.cap,
                "timeline over capacity; evicting oldest entries"
            );
            timeline.truncate(self.cap);
        }
        self.persistence
            .store_timeline(project_id, chapter_id, &timeline)
            .await?;
        Ok(entry)
    }

    pub async fn list(&self, project_id: Uuid, chapter_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let mut timeline = self.persistence.load_timeline(project_id, chapter_id).await?;
        timeline.truncate(self.cap);
        Ok(timeline)
    }

    /// Returns false when the entry was not in the timeline.
    pub async fn delete(&self, project_id: Uuid, chapter_id: Uuid, entry_id: Uuid) -> Result<bool> {
        let mut timeline = self.persistence.load_timeline(project_id, chapter_id).await?;
        let before = timeline.len();
        timeline.retain(|entry| entry.id != entry_id);
        if timeline.len() == before {
            return Ok(false);
        }
        self.persistence
            .store_timeline(project_id, chapter_id, &timeline)
            .await?;
        Ok(true)
    }

    pub async fn clear(&self, project_id: Uuid, chapter_id: Uuid) -> Result<()> {
        self.persistence.clear_timeline(project_id, chapter_id).await
    }
}
