use super::{configured, IntegrationHarness};
use anyhow::Result;
use storybuilder::services::ai::{GenerationError, GenerationKind, ScriptedProvider};
use storybuilder::workspace::AppConfig;
use storybuilder::writing::suggestions::{
    SelectionRange, SuggestionType, AFTER_APPLY_LABEL, BEFORE_APPLY_LABEL,
};
use storybuilder::{EngineError, RunOutcome, ValidationError};
use tokio_util::sync::CancellationToken;

const TWO_SUGGESTIONS: &str = "Sure! Here are some options.\n\n\
    ## Suggestion 1: Plainer\ndog\n\n\
    ## Suggestion 2: **Stranger**\nheron\n";

#[tokio::test]
async fn long_selection_is_truncated_before_prompting() -> Result<()> {
    let draft = "x".repeat(2500);
    let provider = ScriptedProvider::new([TWO_SUGGESTIONS, TWO_SUGGESTIONS]);
    let mut harness = IntegrationHarness::new(&[draft.as_str()], provider).await;
    let cancel = CancellationToken::new();

    let outcome = harness
        .session
        .request_suggestions(SuggestionType::Rewrite, SelectionRange::new(0, 2500), &cancel)
        .await?;
    let suggestions = outcome.completed().expect("not cancelled");
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[1].title, "Stranger");

    harness
        .session
        .request_suggestions(SuggestionType::Tone, SelectionRange::new(0, 1500), &cancel)
        .await?;

    let requests = harness.provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.kind == GenerationKind::Suggestion));
    assert!(requests[0].prompt.contains(&"x".repeat(2000)));
    assert!(!requests[0].prompt.contains(&"x".repeat(2001)));
    assert!(requests[1].prompt.contains(&"x".repeat(1500)));
    assert!(!requests[1].prompt.contains(&"x".repeat(1501)));

    let records = harness.session.activity().records()?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].suggestion_type.as_deref(), Some("tone"));
    Ok(())
}

#[tokio::test]
async fn response_without_headings_is_a_parse_error() -> Result<()> {
    let provider = ScriptedProvider::new(["Try making it punchier and shorter."]);
    let mut harness = IntegrationHarness::new(&["The cat sat on the mat."], provider).await;
    let err = harness
        .session
        .request_suggestions(SuggestionType::Expand, SelectionRange::new(4, 7), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
    assert!(harness.session.suggestions().is_empty());
    Ok(())
}

#[tokio::test]
async fn applying_a_suggestion_is_bracketed_by_snapshots() -> Result<()> {
    let provider = ScriptedProvider::new([TWO_SUGGESTIONS]);
    let mut harness = IntegrationHarness::new(&["The cat sat on the mat."], provider).await;
    harness
        .session
        .request_suggestions(SuggestionType::Rewrite, SelectionRange::new(4, 7), &CancellationToken::new())
        .await?;
    let chosen = harness.session.suggestions()[0].clone();
    assert_eq!(chosen.body, "dog");

    harness.session.apply_suggestion(chosen.id).await?;
    assert_eq!(harness.draft(), "The dog sat on the mat.");
    assert!(harness.session.suggestions().is_empty());

    let entries = harness.session.history_entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].label.as_deref(), Some(AFTER_APPLY_LABEL));
    assert_eq!(entries[0].content, "The dog sat on the mat.");
    assert_eq!(entries[1].label.as_deref(), Some(BEFORE_APPLY_LABEL));
    assert_eq!(entries[1].content, "The cat sat on the mat.");
    Ok(())
}

#[tokio::test]
async fn failed_before_snapshot_leaves_the_draft_alone() -> Result<()> {
    let provider = ScriptedProvider::new([TWO_SUGGESTIONS]);
    let mut harness = IntegrationHarness::new(&["The cat sat on the mat."], provider).await;
    harness
        .session
        .request_suggestions(SuggestionType::Rewrite, SelectionRange::new(4, 7), &CancellationToken::new())
        .await?;
    let chosen = harness.session.suggestions()[0].id;

    harness.history.fail_writes(true);
    let err = harness.session.apply_suggestion(chosen).await.unwrap_err();
    assert!(matches!(err, EngineError::Persistence(_)));
    assert_eq!(harness.draft(), "The cat sat on the mat.");
    assert_eq!(harness.session.history_entries().len(), 1);
    assert_eq!(harness.session.suggestions().len(), 2);
    Ok(())
}

#[tokio::test]
async fn preconditions_fail_before_any_provider_call() -> Result<()> {
    let cancel = CancellationToken::new();

    let mut harness = IntegrationHarness::new(&["Some words here."], ScriptedProvider::default()).await;
    let err = harness
        .session
        .request_suggestions(SuggestionType::Summary, SelectionRange::new(3, 3), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(ValidationError::EmptySelection)));
    assert_eq!(harness.provider.call_count(), 0);

    let mut unconfigured =
        IntegrationHarness::with_config(AppConfig::default(), &["Some words here."], ScriptedProvider::default()).await;
    let err = unconfigured
        .session
        .request_suggestions(SuggestionType::Summary, SelectionRange::new(0, 4), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(ValidationError::ProviderNotConfigured)));
    assert_eq!(unconfigured.provider.call_count(), 0);

    let mut no_chapter = IntegrationHarness::with_config(configured(), &[], ScriptedProvider::default()).await;
    let err = no_chapter
        .session
        .request_suggestions(SuggestionType::Summary, SelectionRange::new(0, 4), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(ValidationError::NoChapterSelected)));
    assert_eq!(no_chapter.provider.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn provider_failures_carry_a_hint() -> Result<()> {
    let provider = ScriptedProvider::failing(GenerationError::classify("429 Too Many Requests"));
    let mut harness = IntegrationHarness::new(&["The cat sat on the mat."], provider).await;
    let err = harness
        .session
        .request_suggestions(SuggestionType::Rewrite, SelectionRange::new(4, 7), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Generation(GenerationError::RateLimited(_))));
    assert!(err.hint().is_some_and(|hint| hint.contains("rate limit")));

    let records = harness.session.activity().records()?;
    assert_eq!(records.len(), 1);
    assert!(records[0].error.is_some());
    Ok(())
}

#[tokio::test]
async fn cancelled_request_changes_nothing() -> Result<()> {
    let mut harness = IntegrationHarness::new(&["The cat sat on the mat."], ScriptedProvider::hanging()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = harness
        .session
        .request_suggestions(SuggestionType::Rewrite, SelectionRange::new(4, 7), &cancel)
        .await?;
    assert_eq!(outcome, RunOutcome::Cancelled);
    assert!(harness.session.suggestions().is_empty());
    assert_eq!(harness.draft(), "The cat sat on the mat.");
    assert_eq!(harness.session.history_entries().len(), 1);
    Ok(())
}

#[tokio::test]
async fn edits_after_the_request_block_a_stale_apply() -> Result<()> {
    let provider = ScriptedProvider::new([TWO_SUGGESTIONS]);
    let mut harness = IntegrationHarness::new(&["The cat sat on the mat."], provider).await;
    harness
        .session
        .request_suggestions(SuggestionType::Rewrite, SelectionRange::new(4, 7), &CancellationToken::new())
        .await?;
    let chosen = harness.session.suggestions()[0].id;

    harness.session.edit("Yes! The cat sat on the mat.", harness.at(1))?;
    let err = harness.session.apply_suggestion(chosen).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(ValidationError::StaleSelection)));
    assert_eq!(harness.draft(), "Yes! The cat sat on the mat.");
    assert_eq!(harness.session.history_entries().len(), 1);
    assert_eq!(harness.session.suggestions().len(), 2);
    Ok(())
}
