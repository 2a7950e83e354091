use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use storybuilder::services::ai::{ActivityRecord, GenerationKind, ScriptedProvider};
use storybuilder::storage::ai_layer::read_jsonl;
use storybuilder::writing::project::{Chapter, Project, ProjectPaths};
use storybuilder::writing::suggestions::{SelectionRange, SuggestionType};
use storybuilder::{Workspace, WritingSession};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn file_session(root: &std::path::Path, provider: Arc<ScriptedProvider>) -> Result<(Workspace, WritingSession)> {
    let mut workspace = Workspace::at(root)?;
    workspace.config.provider.provider = "scripted".into();
    workspace.save_config()?;
    let session = WritingSession::for_workspace(&workspace, provider);
    Ok((workspace, session))
}

#[tokio::test]
async fn timeline_and_draft_survive_a_new_session() -> Result<()> {
    let dir = TempDir::new()?;
    let provider = Arc::new(ScriptedProvider::default());
    let (workspace, mut session) = file_session(dir.path(), provider.clone())?;

    let mut project = Project::new("Lamplight");
    project.chapters.push(Chapter::new("Opening").with_draft("The harbour was quiet."));
    let chapter_id = project.chapters[0].id;
    let project_id = session.create_project(project).await?;
    session.open_project(project_id, Instant::now()).await?;
    session.select_chapter(chapter_id).await?;
    session.edit("The harbour was quiet until the bell.", Instant::now())?;
    session.manual_snapshot(Some("bell".into())).await?;
    session.close().await?;

    let paths = ProjectPaths::new(&workspace.paths, project_id);
    assert!(paths.manifest_path.exists());
    assert!(paths.timeline_path(chapter_id).exists());

    let (_, mut reopened) = file_session(dir.path(), provider)?;
    reopened.open_project(project_id, Instant::now()).await?;
    reopened.select_chapter(chapter_id).await?;
    assert_eq!(
        reopened.history().draft(),
        Some("The harbour was quiet until the bell.")
    );
    let entries = reopened.history_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].label.as_deref(), Some("bell"));
    assert_eq!(entries[1].content, "The harbour was quiet.");
    Ok(())
}

#[tokio::test]
async fn generation_calls_are_appended_to_the_project_activity_log() -> Result<()> {
    let dir = TempDir::new()?;
    let provider = Arc::new(ScriptedProvider::new(["## Suggestion 1: Quieter\nstill"]));
    let (workspace, mut session) = file_session(dir.path(), provider)?;

    let mut project = Project::new("Lamplight");
    project.chapters.push(Chapter::new("Opening").with_draft("The harbour was quiet."));
    let chapter_id = project.chapters[0].id;
    let project_id = session.create_project(project).await?;
    session.open_project(project_id, Instant::now()).await?;
    session.select_chapter(chapter_id).await?;
    session
        .request_suggestions(SuggestionType::Tone, SelectionRange::new(16, 21), &CancellationToken::new())
        .await?;

    let log_path = ProjectPaths::new(&workspace.paths, project_id).activity_log_path;
    let records: Vec<ActivityRecord> = read_jsonl(&log_path)?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, GenerationKind::Suggestion);
    assert_eq!(records[0].chapter_id, Some(chapter_id));
    assert_eq!(records[0].response.as_deref(), Some("## Suggestion 1: Quieter\nstill"));
    assert!(records[0].prompt.contains("quiet"));
    Ok(())
}
