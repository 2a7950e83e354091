use std::sync::Arc;
use std::time::{Duration, Instant};

use storybuilder::services::ai::{ActivityLog, ScriptedProvider};
use storybuilder::storage::{MemoryHistoryPersistence, MemoryProjectStore};
use storybuilder::workspace::AppConfig;
use storybuilder::writing::project::{Chapter, Project};
use storybuilder::WritingSession;
use uuid::Uuid;

/// In-memory session over one project, driven by a scripted provider and a
/// fixed clock origin.
pub struct IntegrationHarness {
    pub session: WritingSession,
    pub provider: Arc<ScriptedProvider>,
    pub history: Arc<MemoryHistoryPersistence>,
    pub projects: Arc<MemoryProjectStore>,
    pub project_id: Uuid,
    pub chapter_ids: Vec<Uuid>,
    pub start: Instant,
}

pub fn configured() -> AppConfig {
    let mut config = AppConfig::default();
    config.provider.provider = "scripted".into();
    config.provider.model = "test-model".into();
    config
}

impl IntegrationHarness {
    /// Opens a project whose chapters carry `drafts`, with the first chapter selected.
    pub async fn new(drafts: &[&str], provider: ScriptedProvider) -> Self {
        Self::with_config(configured(), drafts, provider).await
    }

    pub async fn with_config(config: AppConfig, drafts: &[&str], provider: ScriptedProvider) -> Self {
        let mut project = Project::new("The Salt Tithe");
        project.synopsis = Some("An island pays its debts in salt.".into());
        for (index, draft) in drafts.iter().enumerate() {
            project
                .chapters
                .push(Chapter::new(format!("Chapter {}", index + 1)).with_draft(*draft));
        }
        let project_id = project.id;
        let chapter_ids = project.chapters.iter().map(|c| c.id).collect::<Vec<_>>();

        let provider = Arc::new(provider);
        let history = Arc::new(MemoryHistoryPersistence::default());
        let projects = Arc::new(MemoryProjectStore::with_project(project));
        let mut session = WritingSession::new(config, projects.clone(), history.clone(), provider.clone())
            .with_activity_log(ActivityLog::in_memory());

        let start = Instant::now();
        session
            .open_project(project_id, start)
            .await
            .expect("failed to open project");
        if let Some(first) = chapter_ids.first() {
            session
                .select_chapter(*first)
                .await
                .expect("failed to select chapter");
        }
        Self {
            session,
            provider,
            history,
            projects,
            project_id,
            chapter_ids,
            start,
        }
    }

    pub fn at(&self, secs: u64) -> Instant {
        self.start + Duration::from_secs(secs)
    }

    pub fn draft(&self) -> String {
        self.session.history().draft().unwrap_or_default().to_string()
    }
}

/// Prose comfortably above the revision acceptance threshold.
pub fn prose(sentences: usize) -> String {
    "The lamps along the harbour wall went out one by one as the fog came in. "
        .repeat(sentences)
        .trim_end()
        .to_string()
}

mod batch_generation;
mod history_timeline;
mod persistence;
mod self_refine;
mod suggestions_flow;
