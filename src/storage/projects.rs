use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::workspace::WorkspacePaths;
use crate::writing::plot::Plot;
use crate::writing::project::{Project, ProjectPaths};

use super::ai_layer::{read_json, write_json};

/// Project manifest persistence.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn load_project(&self, project_id: Uuid) -> Result<Option<Project>>;

    async fn save_project(&self, project: &Project) -> Result<()>;

    /// Overwrites one chapter's draft text.
    async fn save_chapter_draft(&self, project_id: Uuid, chapter_id: Uuid, draft: &str) -> Result<()> {
        let mut project = self
            .load_project(project_id)
            .await?
            .ok_or_else(|| anyhow!("Project {project_id} not found"))?;
        let chapter = project
            .chapter_mut(chapter_id)
            .ok_or_else(|| anyhow!("Chapter {chapter_id} not found in project {project_id}"))?;
        chapter.draft_text = draft.to_string();
        project.touch();
        self.save_project(&project).await
    }

    async fn save_plot(&self, project_id: Uuid, plot: &Plot) -> Result<()> {
        let mut project = self
            .load_project(project_id)
            .await?
            .ok_or_else(|| anyhow!("Project {project_id} not found"))?;
        project.plot = plot.clone();
        project.touch();
        self.save_project(&project).await
    }
}

/// `project.json` manifests under the workspace user layer.
#[derive(Debug, Clone)]
pub struct FileProjectStore {
    paths: WorkspacePaths,
}

impl FileProjectStore {
    pub fn new(paths: WorkspacePaths) -> Self {
        Self { paths }
    }

    pub fn project_paths(&self, project_id: Uuid) -> ProjectPaths {
        ProjectPaths::new(&self.paths, project_id)
    }
}

#[async_trait]
impl ProjectStore for FileProjectStore {
    async fn load_project(&self, project_id: Uuid) -> Result<Option<Project>> {
        let path = self.project_paths(project_id).manifest_path;
        let manifest = tokio::task::spawn_blocking(move || read_json::<Project>(&path))
            .await
            .context("Project read task failed")?
            .with_context(|| format!("Invalid project manifest for {project_id}"))?;
        let Some(manifest) = manifest else {
            return Ok(None);
        };
        if manifest.id != project_id {
            bail!(
                "Manifest id mismatch: expected {}, found {}",
                project_id,
                manifest.id
            );
        }
        Ok(Some(manifest))
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        let path = self.project_paths(project.id).manifest_path;
        let manifest = project.clone();
        tokio::task::spawn_blocking(move || {
            write_json(&path, &manifest)
                .with_context(|| format!("Failed to write project manifest {}", path.display()))
        })
        .await
        .context("Project write task failed")??;
        debug!(project_id = %project.id, "project manifest saved");
        Ok(())
    }
}

/// In-process store with a switch for simulating write failures.
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    projects: Mutex<HashMap<Uuid, Project>>,
    fail_writes: AtomicBool,
}

impl MemoryProjectStore {
    pub fn with_project(project: Project) -> Self {
        let store = Self::default();
        if let Ok(mut projects) = store.projects.lock() {
            projects.insert(project.id, project);
        }
        store
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn load_project(&self, project_id: Uuid) -> Result<Option<Project>> {
        let projects = self
            .projects
            .lock()
            .map_err(|_| anyhow!("project lock poisoned"))?;
        Ok(projects.get(&project_id).cloned())
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("project storage unavailable");
        }
        let mut projects = self
            .projects
            .lock()
            .map_err(|_| anyhow!("project lock poisoned"))?;
        projects.insert(project.id, project.clone());
        Ok(())
    }
}
