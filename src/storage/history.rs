use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workspace::WorkspacePaths;
use crate::writing::project::ProjectPaths;
use crate::writing::snapshot::HistoryEntry;

use super::ai_layer::{read_json, remove_if_exists, write_json};

/// Raw timeline storage. Ordering and capping belong to `SnapshotStore`.
#[async_trait]
pub trait HistoryPersistence: Send + Sync {
    async fn load_timeline(&self, project_id: Uuid, chapter_id: Uuid) -> Result<Vec<HistoryEntry>>;

    async fn store_timeline(
        &self,
        project_id: Uuid,
        chapter_id: Uuid,
        entries: &[HistoryEntry],
    ) -> Result<()>;

    async fn clear_timeline(&self, project_id: Uuid, chapter_id: Uuid) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineFile {
    chapter_id: Uuid,
    #[serde(default)]
    entries: Vec<HistoryEntry>,
}

/// One JSON document per chapter under `<ai>/<project>/history/`.
#[derive(Debug, Clone)]
pub struct FileHistoryPersistence {
    paths: WorkspacePaths,
}

impl FileHistoryPersistence {
    pub fn new(paths: WorkspacePaths) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl HistoryPersistence for FileHistoryPersistence {
    async fn load_timeline(&self, project_id: Uuid, chapter_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let path = ProjectPaths::new(&self.paths, project_id).timeline_path(chapter_id);
        let file = tokio::task::spawn_blocking(move || read_json::<TimelineFile>(&path))
            .await
            .context("Timeline read task failed")??;
        let Some(file) = file else {
            return Ok(Vec::new());
        };
        if file.chapter_id != chapter_id {
            bail!(
                "Timeline chapter mismatch: expected {}, found {}",
                chapter_id,
                file.chapter_id
            );
        }
        Ok(file.entries)
    }

    async fn store_timeline(
        &self,
        project_id: Uuid,
        chapter_id: Uuid,
        entries: &[HistoryEntry],
    ) -> Result<()> {
        let path = ProjectPaths::new(&self.paths, project_id).timeline_path(chapter_id);
        let file = TimelineFile {
            chapter_id,
            entries: entries.to_vec(),
        };
        tokio::task::spawn_blocking(move || write_json(&path, &file))
            .await
            .context("Timeline write task failed")?
    }

    async fn clear_timeline(&self, project_id: Uuid, chapter_id: Uuid) -> Result<()> {
        let path = ProjectPaths::new(&self.paths, project_id).timeline_path(chapter_id);
        tokio::task::spawn_blocking(move || remove_if_exists(&path))
            .await
            .context("Timeline remove task failed")?
    }
}

/// In-process backend with a switch for simulating write failures.
#[derive(Debug, Default)]
pub struct MemoryHistoryPersistence {
    timelines: Mutex<HashMap<(Uuid, Uuid), Vec<HistoryEntry>>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryHistoryPersistence {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful `store_timeline` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn guard_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("history storage unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryPersistence for MemoryHistoryPersistence {
    async fn load_timeline(&self, project_id: Uuid, chapter_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let timelines = self
            .timelines
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        Ok(timelines
            .get(&(project_id, chapter_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn store_timeline(
        &self,
        project_id: Uuid,
        chapter_id: Uuid,
        entries: &[HistoryEntry],
    ) -> Result<()> {
        self.guard_write()?;
        let mut timelines = self
            .timelines
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        timelines.insert((project_id, chapter_id), entries.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_timeline(&self, project_id: Uuid, chapter_id: Uuid) -> Result<()> {
        self.guard_write()?;
        let mut timelines = self
            .timelines
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        timelines.remove(&(project_id, chapter_id));
        Ok(())
    }
}
