use std::time::Duration;

use super::{prose, IntegrationHarness};
use anyhow::Result;
use storybuilder::services::ai::{GenerationKind, ScriptedProvider};
use storybuilder::writing::refine::{AFTER_REFINE_LABEL, BEFORE_REFINE_LABEL};
use storybuilder::{EngineError, RunOutcome, ValidationError};
use tokio_util::sync::CancellationToken;

const CRITIQUE: &str = "```json\n{\"summary\": \"Atmospheric but static.\", \"weaknesses\": [\
    {\"aspect\": \"pacing\", \"score\": \"4/10\", \"problem\": \"Nothing happens.\", \"solutions\": [\"Give the keeper a task\"]}]}\n```";

#[tokio::test]
async fn structured_revision_replaces_the_draft() -> Result<()> {
    let original = prose(4);
    let revised = "The keeper lit the last lamp by hand, and the fog answered with a bell. ".repeat(3);
    let revision = format!(
        "{{\"revisedText\": \"{}\", \"improvementSummary\": \"Added an action beat.\", \"changes\": [\"keeper lights lamp\", \"bell\"]}}",
        revised.trim_end()
    );
    let provider = ScriptedProvider::new([CRITIQUE.to_string(), revision]);
    let mut harness = IntegrationHarness::new(&[original.as_str()], provider).await;

    let report = harness
        .session
        .self_refine(&CancellationToken::new())
        .await?
        .completed()
        .expect("not cancelled");
    assert_eq!(report.strategy, "structured");
    assert!(report.critique.structured);
    assert_eq!(report.critique.weaknesses[0].score, Some(4.0));
    assert_eq!(harness.draft(), revised.trim_end());

    let entries = harness.session.history_entries();
    assert_eq!(entries[0].label.as_deref(), Some(AFTER_REFINE_LABEL));
    assert_eq!(entries[0].content, revised.trim_end());
    assert_eq!(entries[1].label.as_deref(), Some(BEFORE_REFINE_LABEL));
    assert_eq!(entries[1].content, original);

    let log = harness.session.improvement_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].revision_summary, "Added an action beat.");
    assert_eq!(log[0].change_list.len(), 2);
    assert_eq!(log[0].original_length, original.chars().count());

    let requests = harness.provider.requests();
    assert_eq!(requests[0].kind, GenerationKind::Critique);
    assert_eq!(requests[1].kind, GenerationKind::Revision);
    assert!(requests[1].prompt.contains("Nothing happens."));
    Ok(())
}

#[tokio::test]
async fn bare_narrative_revision_is_recovered() -> Result<()> {
    let original = prose(3);
    let narrative = "The keeper walked the wall with a lantern held low.\n\n\
                     Below her the water turned over, grey and patient, and somewhere out past the \
                     breakwater a bell began to ring.";
    let provider = ScriptedProvider::new(["Too still. Give someone something to do.", narrative]);
    let mut harness = IntegrationHarness::new(&[original.as_str()], provider).await;

    let report = harness
        .session
        .self_refine(&CancellationToken::new())
        .await?
        .completed()
        .expect("not cancelled");
    assert!(!report.critique.structured);
    assert_eq!(report.strategy, "prose");
    assert_eq!(harness.draft(), narrative);
    assert!(harness.session.improvement_log()[0].revision_summary.is_empty());
    Ok(())
}

#[tokio::test]
async fn unusable_revision_leaves_everything_untouched() -> Result<()> {
    let original = prose(3);
    let provider = ScriptedProvider::new([CRITIQUE, "{\"revisedText\": \"Too short.\"}"]);
    let mut harness = IntegrationHarness::new(&[original.as_str()], provider).await;

    let err = harness
        .session
        .self_refine(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
    assert_eq!(harness.draft(), original);
    assert_eq!(harness.session.history_entries().len(), 1);
    assert!(harness.session.improvement_log().is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_draft_is_rejected() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["   "], ScriptedProvider::default()).await;
    let err = harness
        .session
        .self_refine(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(ValidationError::EmptyDraft)));
    assert_eq!(harness.provider.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn cancelling_mid_flight_keeps_the_draft() -> Result<()> {
    let original = prose(3);
    let mut harness = IntegrationHarness::new(&[original.as_str()], ScriptedProvider::hanging()).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcome = harness.session.self_refine(&cancel).await?;
    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(harness.provider.call_count(), 1);
    assert_eq!(harness.draft(), original);
    assert_eq!(harness.session.history_entries().len(), 1);
    assert!(harness.session.improvement_log().is_empty());
    Ok(())
}
