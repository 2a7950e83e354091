use super::{configured, IntegrationHarness};
use anyhow::Result;
use chrono::Utc;
use storybuilder::services::ai::{GenerationKind, ScriptedProvider};
use storybuilder::storage::ProjectStore;
use storybuilder::writing::batch::BatchPhase;
use storybuilder::{EngineError, RunOutcome, ValidationError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const THREE_BLOCKS: &str = "Here is the full draft.\n\n\
    ## Chapter 1: Arrival\nThe ferry came in under a white sky.\n\n\
    ## Chapter 2: The Tithe\nEvery house paid in salt.\n\n\
    ## Chapter 3\nThe keeper refused.\n";

#[tokio::test]
async fn batch_requires_confirmation() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["one", "two"], ScriptedProvider::new([THREE_BLOCKS])).await;
    let err = harness
        .session
        .run_batch(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(ValidationError::NotConfirmed)));

    harness.session.request_batch()?;
    assert_eq!(harness.session.batch_phase(), BatchPhase::Confirming);
    harness.session.decline_batch();
    assert_eq!(harness.session.batch_phase(), BatchPhase::Idle);
    assert_eq!(harness.provider.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn fewer_blocks_than_chapters_updates_the_leading_chapters() -> Result<()> {
    let drafts = ["old one", "old two", "old three", "old four", "old five"];
    let mut harness = IntegrationHarness::new(&drafts, ScriptedProvider::new([THREE_BLOCKS])).await;
    let phases = harness.session.subscribe_batch();

    harness.session.request_batch()?;
    let report = harness
        .session
        .run_batch(&CancellationToken::new())
        .await?
        .completed()
        .expect("not cancelled");

    assert_ne!(report.job_id, Uuid::nil());
    assert!(report.started_at <= Utc::now());
    assert_eq!(report.block_count, 3);
    assert_eq!(report.updated, harness.chapter_ids[..3].to_vec());
    assert_eq!(report.skipped, harness.chapter_ids[3..].to_vec());
    assert_eq!(report.progress.completed, 3);
    assert_eq!(report.progress.total, 5);
    assert_eq!(harness.session.batch_phase(), BatchPhase::Idle);
    assert!(phases.has_changed()?);

    let stored = harness
        .projects
        .load_project(harness.project_id)
        .await?
        .expect("project stored");
    let texts: Vec<_> = stored.chapters.iter().map(|c| c.draft_text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "The ferry came in under a white sky.",
            "Every house paid in salt.",
            "The keeper refused.",
            "old four",
            "old five"
        ]
    );

    // The open chapter picks up its generated text without a pending save.
    assert_eq!(harness.draft(), "The ferry came in under a white sky.");
    assert!(!harness.session.history().has_pending_autosave());

    let requests = harness.provider.requests();
    assert_eq!(requests[0].kind, GenerationKind::BatchChapters);
    assert!(requests[0].prompt.contains("The Salt Tithe"));
    Ok(())
}

#[tokio::test]
async fn cancelled_batch_changes_no_chapter() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["old one", "old two"], ScriptedProvider::hanging()).await;
    harness.session.request_batch()?;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = harness.session.run_batch(&cancel).await?;
    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(harness.session.batch_phase(), BatchPhase::Idle);
    let texts: Vec<_> = harness
        .session
        .project()
        .map(|p| p.chapters.iter().map(|c| c.draft_text.clone()).collect())
        .unwrap_or_default();
    assert_eq!(texts, vec!["old one".to_string(), "old two".to_string()]);
    Ok(())
}

#[tokio::test]
async fn project_without_chapters_cannot_batch() -> Result<()> {
    let mut harness = IntegrationHarness::with_config(configured(), &[], ScriptedProvider::default()).await;
    let err = harness.session.request_batch().unwrap_err();
    assert!(matches!(err, EngineError::Validation(ValidationError::NoChapters)));
    assert_eq!(harness.session.batch_phase(), BatchPhase::Idle);
    Ok(())
}

#[tokio::test]
async fn failed_save_leaves_the_open_project_untouched() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["old one", "old two"], ScriptedProvider::new([THREE_BLOCKS])).await;
    harness.projects.fail_writes(true);
    harness.session.request_batch()?;

    assert!(harness.session.run_batch(&CancellationToken::new()).await.is_err());
    assert_eq!(harness.session.batch_phase(), BatchPhase::Idle);
    let texts: Vec<_> = harness
        .session
        .project()
        .map(|p| p.chapters.iter().map(|c| c.draft_text.clone()).collect())
        .unwrap_or_default();
    assert_eq!(texts, vec!["old one".to_string(), "old two".to_string()]);
    assert_eq!(harness.draft(), "old one");

    harness.projects.fail_writes(false);
    let stored = harness
        .projects
        .load_project(harness.project_id)
        .await?
        .expect("project stored");
    assert_eq!(stored.chapters[0].draft_text, "old one");
    Ok(())
}
