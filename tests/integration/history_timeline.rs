use super::IntegrationHarness;
use anyhow::Result;
use storybuilder::services::ai::ScriptedProvider;
use storybuilder::storage::{HistoryPersistence, ProjectStore};
use storybuilder::writing::history::{INITIAL_STATE_LABEL, PRE_RESTORE_LABEL};
use storybuilder::writing::snapshot::HistoryKind;
use storybuilder::{EngineError, ValidationError};

#[tokio::test]
async fn opening_a_drafted_chapter_records_its_initial_state() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["The fog came in early.", ""], ScriptedProvider::default()).await;
    let entries = harness.session.history_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, HistoryKind::Manual);
    assert_eq!(entries[0].label.as_deref(), Some(INITIAL_STATE_LABEL));
    assert_eq!(entries[0].content, "The fog came in early.");

    harness.session.select_chapter(harness.chapter_ids[1]).await?;
    assert!(harness.session.history_entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn autosave_waits_for_the_quiet_period() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["First line."], ScriptedProvider::default()).await;
    harness.session.edit("First line. Second line.", harness.at(0))?;
    harness.session.edit("First line. Second line. Third.", harness.at(5))?;

    assert!(!harness.session.tick(harness.at(20)).await.snapshot_written);
    assert!(harness.session.tick(harness.at(25)).await.snapshot_written);
    assert!(!harness.session.tick(harness.at(60)).await.snapshot_written);

    let entries = harness.session.history_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind, HistoryKind::Auto);
    assert_eq!(entries[0].content, "First line. Second line. Third.");

    let stored = harness
        .projects
        .load_project(harness.project_id)
        .await?
        .expect("project stored");
    assert_eq!(stored.chapters[0].draft_text, "First line. Second line. Third.");
    Ok(())
}

#[tokio::test]
async fn unchanged_draft_does_not_add_an_entry() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["Nothing changes."], ScriptedProvider::default()).await;
    let writes = harness.history.write_count();
    assert!(!harness.session.manual_snapshot(None).await?);
    assert_eq!(harness.session.history_entries().len(), 1);
    assert_eq!(harness.history.write_count(), writes);
    Ok(())
}

#[tokio::test]
async fn timeline_keeps_the_newest_thirty_entries() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["draft start"], ScriptedProvider::default()).await;
    for n in 0..35 {
        harness.session.edit(format!("draft {n}"), harness.at(0))?;
        assert!(harness.session.manual_snapshot(Some(format!("pass {n}"))).await?);
    }
    let entries = harness.session.history_entries();
    assert_eq!(entries.len(), 30);
    assert_eq!(entries[0].content, "draft 34");
    assert_eq!(entries[29].content, "draft 5");

    let persisted = harness
        .history
        .load_timeline(harness.project_id, harness.chapter_ids[0])
        .await?;
    assert_eq!(persisted.len(), 30);
    assert_eq!(persisted[0].id, entries[0].id);
    Ok(())
}

#[tokio::test]
async fn restore_records_the_outgoing_draft_first() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["version one"], ScriptedProvider::default()).await;
    let initial = harness.session.history_entries()[0].id;
    harness.session.edit("version two", harness.at(1))?;
    harness.session.manual_snapshot(None).await?;

    assert!(harness.session.restore(initial).await?);
    assert_eq!(harness.draft(), "version one");
    let latest = &harness.session.history_entries()[0];
    assert_eq!(latest.kind, HistoryKind::Restore);
    assert_eq!(latest.label.as_deref(), Some(PRE_RESTORE_LABEL));
    assert_eq!(latest.content, "version two");
    assert!(!harness.session.history().has_pending_autosave());

    // Restoring what is already live is a no-op.
    let before = harness.session.history_entries().len();
    assert!(!harness.session.restore(initial).await?);
    assert_eq!(harness.session.history_entries().len(), before);
    Ok(())
}

#[tokio::test]
async fn switching_chapters_flushes_the_pending_autosave() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["Chapter one.", "Chapter two."], ScriptedProvider::default()).await;
    harness.session.edit("Chapter one, revised.", harness.at(1))?;
    harness.session.select_chapter(harness.chapter_ids[1]).await?;

    assert_eq!(harness.draft(), "Chapter two.");
    let first = harness
        .history
        .load_timeline(harness.project_id, harness.chapter_ids[0])
        .await?;
    assert_eq!(first[0].kind, HistoryKind::Auto);
    assert_eq!(first[0].content, "Chapter one, revised.");

    let stored = harness
        .projects
        .load_project(harness.project_id)
        .await?
        .expect("project stored");
    assert_eq!(stored.chapters[0].draft_text, "Chapter one, revised.");
    assert_eq!(
        harness.session.project().and_then(|p| p.chapter(harness.chapter_ids[0])).map(|c| c.draft_text.as_str()),
        Some("Chapter one, revised.")
    );
    Ok(())
}

#[tokio::test]
async fn delete_reselects_and_diff_compares_against_live_draft() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["alpha beta"], ScriptedProvider::default()).await;
    let initial = harness.session.history_entries()[0].id;
    harness.session.edit("alpha gamma", harness.at(1))?;
    harness.session.manual_snapshot(None).await?;
    let newest = harness.session.history_entries()[0].id;

    harness.session.select_entry(initial)?;
    let segments = harness.session.diff_selected().expect("entry selected");
    assert!(segments.iter().any(|s| s.is_change()));

    harness.session.delete_entry(newest).await?;
    assert_eq!(harness.session.history_entries().len(), 1);
    assert_eq!(harness.session.history().selected().map(|e| e.id), Some(initial));

    let err = harness.session.delete_entry(newest).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::EntryNotFound(id)) if id == newest
    ));
    Ok(())
}

#[tokio::test]
async fn reselecting_the_open_chapter_keeps_live_edits() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["original text", "other"], ScriptedProvider::default()).await;
    harness.session.edit("edited live text", harness.at(1))?;
    harness.session.select_chapter(harness.chapter_ids[0]).await?;
    assert_eq!(harness.draft(), "edited live text");
    assert!(harness.session.history().has_pending_autosave());

    // Round trip through another chapter and back.
    harness.session.select_chapter(harness.chapter_ids[1]).await?;
    harness.session.select_chapter(harness.chapter_ids[0]).await?;
    assert_eq!(harness.draft(), "edited live text");
    let stored = harness
        .projects
        .load_project(harness.project_id)
        .await?
        .expect("project stored");
    assert_eq!(stored.chapters[0].draft_text, "edited live text");
    Ok(())
}
