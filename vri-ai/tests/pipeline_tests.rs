//! End-to-end pipeline tests over the in-memory document store
//!
//! Model services are scripted fakes from `helpers`.

mod helpers;

use std::sync::Arc;

use helpers::*;
use tokio_util::sync::CancellationToken;
use vri_ai::models::{ClusterAssignment, PipelineRun, PipelineState, Review, Sentiment};
use vri_ai::types::{LabelInductionError, ParseError, PipelineError};
use vri_ai::db::MemoryDocumentStore;

const REVIEWS_WITH_TEXT: usize = 8;

async fn run_pass(
    store: Arc<MemoryDocumentStore>,
    classifier: Arc<FakeClassifier>,
    zero_shot: Arc<FakeZeroShot>,
    completion: Arc<ScriptedCompletion>,
) -> (PipelineRun, Result<(), PipelineError>) {
    let orchestrator = build_orchestrator(store, classifier, zero_shot, completion, &test_settings());
    let mut run = PipelineRun::new();
    let result = orchestrator
        .execute_run(&mut run, &CancellationToken::new())
        .await;
    (run, result)
}

#[tokio::test]
async fn test_full_pass_updates_reviews_and_venues() {
    let store = fixture_store();
    let classifier = Arc::new(FakeClassifier::default());
    let zero_shot = Arc::new(FakeZeroShot::default());
    let completion = Arc::new(ScriptedCompletion::default());

    let (run, result) = run_pass(store.clone(), classifier.clone(), zero_shot.clone(), completion.clone()).await;

    assert!(result.is_ok());
    assert_eq!(run.state, PipelineState::Completed);
    assert!(run.ended_at.is_some());
    assert_eq!(run.vocabulary.len(), VOCABULARY_SIZE);
    assert!(run.warnings.is_empty(), "unexpected warnings: {:?}", run.warnings);

    assert_eq!(classifier.call_count(), REVIEWS_WITH_TEXT);
    assert_eq!(zero_shot.call_count(), REVIEWS_WITH_TEXT);
    assert_eq!(completion.count(PromptKind::Labels), 1);
    // v1: 5 reviews in batches of 2, v2: 2 reviews
    assert_eq!(completion.count(PromptKind::Batch), 4);
    assert_eq!(completion.count(PromptKind::Final), 2);

    let stats = &run.statistics;
    assert_eq!(stats.reviews_loaded, 9);
    assert_eq!(stats.classifying.processed, REVIEWS_WITH_TEXT);
    assert_eq!(stats.classifying.skipped, 1);
    assert_eq!(stats.clustering.processed, REVIEWS_WITH_TEXT);
    assert_eq!(stats.review_writes.updated, REVIEWS_WITH_TEXT);
    assert_eq!(stats.grouping.venues, 2);
    assert_eq!(stats.grouping.reviews, 7);
    assert_eq!(stats.summarizing.venues_updated, 2);
    assert_eq!(stats.summarizing.batches_total, 4);

    let venue = store.venue("v1").await.unwrap();
    assert_eq!(
        venue.ai_summary.as_deref(),
        Some("Avis globalement positifs sur Saveurs & Co.")
    );
    assert_eq!(
        venue.ai_key_points.as_deref(),
        Some("Cuisine soignée, équipe ponctuelle.")
    );
    assert_eq!(venue.ai_global_score.as_deref(), Some("82"));
}

#[tokio::test]
async fn test_clustered_reviews_cover_vocabulary() {
    let store = fixture_store();
    let (run, _) = run_pass(
        store.clone(),
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeZeroShot::default()),
        Arc::new(ScriptedCompletion::default()),
    )
    .await;

    for id in ["r1", "r2", "r3", "r4", "r5", "r6", "r7", "r9"] {
        let review = store.review(id).await.unwrap();
        let clusters = review.clusters.expect("clusters written");
        assert_eq!(clusters.len(), run.vocabulary.len());

        let mut labels: Vec<&str> = clusters.iter().map(|c| c.label.as_str()).collect();
        labels.sort();
        let mut expected: Vec<&str> = run.vocabulary.iter().map(String::as_str).collect();
        expected.sort();
        assert_eq!(labels, expected);

        assert!(clusters.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(review.sentiment.unwrap().label, "positive");
        assert_eq!(store.review_update_count(id).await, 1);
    }
}

#[tokio::test]
async fn test_summarize_is_idempotent() {
    let store = fixture_store();
    let completion = Arc::new(ScriptedCompletion::default());

    let (first_run, _) = run_pass(
        store.clone(),
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeZeroShot::default()),
        completion.clone(),
    )
    .await;
    let first_v1 = store.venue("v1").await.unwrap();
    let first_r1 = store.review("r1").await.unwrap();

    let (second_run, _) = run_pass(
        store.clone(),
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeZeroShot::default()),
        completion.clone(),
    )
    .await;

    assert_eq!(second_run.state, PipelineState::Completed);
    assert_eq!(first_run.vocabulary, second_run.vocabulary);
    assert_eq!(store.venue("v1").await.unwrap(), first_v1);
    assert_eq!(store.review("r1").await.unwrap(), first_r1);
    // Overwritten, never appended
    assert_eq!(store.venue_update_count("v1").await, 2);
    assert_eq!(
        store.review("r1").await.unwrap().clusters.unwrap().len(),
        VOCABULARY_SIZE
    );
}

#[tokio::test]
async fn test_missing_key_points_marker_skips_only_that_venue() {
    let store = fixture_store();
    let completion = Arc::new(ScriptedCompletion::with_final_override(
        "Traiteur Dupont",
        "Résumé : Correct.\nScore global : 60",
    ));

    let (run, result) = run_pass(
        store.clone(),
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeZeroShot::default()),
        completion,
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(run.state, PipelineState::Completed);

    assert_eq!(store.venue_update_count("v2").await, 0);
    let v2 = store.venue("v2").await.unwrap();
    assert!(v2.ai_summary.is_none());
    assert!(v2.ai_key_points.is_none());
    assert!(v2.ai_global_score.is_none());

    let v2_warnings: Vec<_> = run.warnings.iter().filter(|w| w.subject == "v2").collect();
    assert_eq!(v2_warnings.len(), 1);
    assert_eq!(v2_warnings[0].stage, PipelineState::Summarizing);
    assert!(v2_warnings[0].message.contains("Points clés"));

    assert_eq!(store.venue_update_count("v1").await, 1);
    assert_eq!(run.statistics.summarizing.venues_updated, 1);
    assert_eq!(run.statistics.summarizing.venues_skipped, 1);
}

#[tokio::test]
async fn test_prose_label_response_aborts_before_clustering() {
    let store = fixture_store();
    let zero_shot = Arc::new(FakeZeroShot::default());
    let completion = Arc::new(ScriptedCompletion::with_labels(
        "Voici les catégories : service, prix, ponctualité.",
    ));

    let (run, result) = run_pass(
        store.clone(),
        Arc::new(FakeClassifier::default()),
        zero_shot.clone(),
        completion.clone(),
    )
    .await;

    assert!(matches!(
        result,
        Err(PipelineError::LabelInduction(LabelInductionError::Parse(
            ParseError::NotAList(_)
        )))
    ));
    assert_eq!(run.state, PipelineState::Failed);
    assert!(run.error.is_some());
    assert!(run.vocabulary.is_empty());

    assert_eq!(zero_shot.call_count(), 0);
    assert_eq!(completion.count(PromptKind::Batch), 0);
    assert_eq!(completion.count(PromptKind::Final), 0);
    assert_eq!(store.review_update_count("r1").await, 0);
    assert_eq!(store.venue_update_count("v1").await, 0);
}

#[tokio::test]
async fn test_empty_list_label_response_is_fatal() {
    let (run, result) = run_pass(
        fixture_store(),
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeZeroShot::default()),
        Arc::new(ScriptedCompletion::with_labels("[]")),
    )
    .await;

    assert!(matches!(
        result,
        Err(PipelineError::LabelInduction(LabelInductionError::Parse(
            ParseError::EmptyList
        )))
    ));
    assert_eq!(run.state, PipelineState::Failed);
}

#[tokio::test]
async fn test_empty_text_reviews_make_no_calls() {
    let mut classified = Review::new("r-empty", "v1", Some("   "));
    classified.sentiment = Some(Sentiment {
        label: "negative".to_string(),
        score: 0.4,
    });
    let store = Arc::new(MemoryDocumentStore::with_documents(
        fixture_venues(),
        vec![
            Review::new("r1", "v1", Some("Buffet copieux")),
            Review::new("r-none", "v1", None),
            classified.clone(),
        ],
    ));
    let classifier = Arc::new(FakeClassifier::default());
    let zero_shot = Arc::new(FakeZeroShot::default());

    let (run, result) = run_pass(
        store.clone(),
        classifier.clone(),
        zero_shot.clone(),
        Arc::new(ScriptedCompletion::default()),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(classifier.call_count(), 1);
    assert_eq!(zero_shot.call_count(), 1);
    assert_eq!(*classifier.texts.lock().unwrap(), vec!["Buffet copieux".to_string()]);
    assert_eq!(run.statistics.classifying.skipped, 2);
    assert_eq!(run.statistics.clustering.skipped, 2);

    assert_eq!(store.review("r-empty").await.unwrap(), classified);
    assert_eq!(store.review_update_count("r-empty").await, 0);
    assert_eq!(store.review_update_count("r-none").await, 0);
}

#[tokio::test]
async fn test_sample_larger_than_reviews_uses_all() {
    let completion = Arc::new(ScriptedCompletion::default());

    run_pass(
        fixture_store(),
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeZeroShot::default()),
        completion.clone(),
    )
    .await;

    let prompts = completion.prompts_of(PromptKind::Labels);
    assert_eq!(prompts.len(), 1);
    for review in fixture_reviews() {
        if let Some(text) = review.analyzable_text() {
            assert!(prompts[0].contains(text), "sample missing {text:?}");
        }
    }
    assert!(prompts[0].contains(&format!("{}. ", REVIEWS_WITH_TEXT)));
    assert!(!prompts[0].contains(&format!("{}. ", REVIEWS_WITH_TEXT + 1)));
}

/// Fixture store where `review_id` carries derived fields from an earlier run
fn store_with_prior_fields(review_id: &str) -> (Arc<MemoryDocumentStore>, Review) {
    let mut reviews = fixture_reviews();
    let prior = reviews.iter_mut().find(|r| r.id == review_id).unwrap();
    prior.sentiment = Some(Sentiment {
        label: "negative".to_string(),
        score: 0.6,
    });
    prior.clusters = Some(vec![ClusterAssignment {
        label: "ancienne catégorie".to_string(),
        score: 1.0,
    }]);
    let prior = prior.clone();

    let store = Arc::new(MemoryDocumentStore::with_documents(fixture_venues(), reviews));
    (store, prior)
}

#[tokio::test]
async fn test_classification_failure_leaves_review_untouched() {
    let (store, prior) = store_with_prior_fields("r2");
    let zero_shot = Arc::new(FakeZeroShot::default());

    let (run, result) = run_pass(
        store.clone(),
        Arc::new(FakeClassifier::failing_on(&["Service un peu lent"])),
        zero_shot.clone(),
        Arc::new(ScriptedCompletion::default()),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(run.statistics.classifying.failed, 1);
    assert_eq!(run.statistics.classifying.processed, REVIEWS_WITH_TEXT - 1);
    // Still clustered, but without a sentiment nothing is written
    assert_eq!(zero_shot.call_count(), REVIEWS_WITH_TEXT);
    assert_eq!(run.statistics.review_writes.updated, REVIEWS_WITH_TEXT - 1);

    assert_eq!(store.review("r2").await.unwrap(), prior);
    assert_eq!(store.review_update_count("r2").await, 0);

    let warning = run.warnings.iter().find(|w| w.subject == "r2").unwrap();
    assert_eq!(warning.stage, PipelineState::Classifying);
}

#[tokio::test]
async fn test_clustering_failure_is_contained() {
    let store = fixture_store();
    let mut zero_shot = FakeZeroShot::failing_on(&["Très bon rapport qualité prix"]);
    zero_shot
        .drop_label_on
        .insert("Desserts exceptionnels".to_string());

    let (run, result) = run_pass(
        store.clone(),
        Arc::new(FakeClassifier::default()),
        Arc::new(zero_shot),
        Arc::new(ScriptedCompletion::default()),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(run.state, PipelineState::Completed);
    assert_eq!(run.statistics.clustering.failed, 2);

    for id in ["r3", "r5"] {
        let review = store.review(id).await.unwrap();
        assert!(review.clusters.is_none(), "{id} should have no clusters");
        assert!(review.sentiment.is_none(), "{id} should have no sentiment");
        assert_eq!(store.review_update_count(id).await, 0);
    }
    assert_eq!(
        store.review("r4").await.unwrap().clusters.unwrap().len(),
        VOCABULARY_SIZE
    );
    assert_eq!(run.statistics.summarizing.venues_updated, 2);
}

#[tokio::test]
async fn test_clustering_failure_keeps_prior_derived_fields() {
    let (store, prior) = store_with_prior_fields("r1");

    let (run, result) = run_pass(
        store.clone(),
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeZeroShot::failing_on(&["Buffet copieux et raffiné"])),
        Arc::new(ScriptedCompletion::default()),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(run.statistics.classifying.failed, 0);
    assert_eq!(run.statistics.clustering.failed, 1);

    // New sentiment is not paired with clusters from an older vocabulary
    assert_eq!(store.review("r1").await.unwrap(), prior);
    assert_eq!(store.review_update_count("r1").await, 0);
}

#[tokio::test]
async fn test_failed_batch_is_omitted_from_final_prompt() {
    let store = fixture_store();
    let mut completion = ScriptedCompletion::default();
    // Second batch of v1 holds r3 and r4
    completion
        .failing_batch_texts
        .insert("Très bon rapport qualité prix".to_string());
    let completion = Arc::new(completion);

    let (run, _) = run_pass(
        store.clone(),
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeZeroShot::default()),
        completion.clone(),
    )
    .await;

    assert_eq!(run.statistics.summarizing.batches_failed, 1);
    assert_eq!(run.statistics.summarizing.venues_updated, 2);
    assert_eq!(store.venue_update_count("v1").await, 1);

    let final_prompt = completion
        .prompts_of(PromptKind::Final)
        .into_iter()
        .find(|p| p.contains("Saveurs & Co"))
        .unwrap();
    assert!(final_prompt.contains(
        "Synthèse partielle : Buffet copieux et raffiné\n\nSynthèse partielle : Desserts exceptionnels"
    ));
    assert!(!final_prompt.contains("Synthèse partielle : Très bon rapport"));

    let warning = run.warnings.iter().find(|w| w.subject == "v1").unwrap();
    assert!(warning.message.starts_with("batch 1 summary failed"));
}

#[tokio::test]
async fn test_all_batches_failed_skips_final_call() {
    let store = fixture_store();
    let mut completion = ScriptedCompletion::default();
    completion
        .failing_batch_texts
        .insert("Plats froids à l'arrivée".to_string());
    let completion = Arc::new(completion);

    let (run, _) = run_pass(
        store.clone(),
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeZeroShot::default()),
        completion.clone(),
    )
    .await;

    assert_eq!(completion.count(PromptKind::Final), 1);
    assert_eq!(store.venue_update_count("v2").await, 0);
    assert_eq!(run.statistics.summarizing.venues_skipped, 1);
    assert_eq!(run.warnings.iter().filter(|w| w.subject == "v2").count(), 2);
}

#[tokio::test]
async fn test_non_numeric_score_is_persisted_with_warning() {
    let store = fixture_store();
    let completion = Arc::new(ScriptedCompletion::with_final_override(
        "Saveurs & Co",
        "Résumé : Excellent.\nPoints clés : Tout.\nScore global : excellent",
    ));

    let (run, _) = run_pass(
        store.clone(),
        Arc::new(FakeClassifier::default()),
        Arc::new(FakeZeroShot::default()),
        completion,
    )
    .await;

    assert_eq!(
        store.venue("v1").await.unwrap().ai_global_score.as_deref(),
        Some("excellent")
    );
    assert_eq!(run.statistics.summarizing.venues_updated, 2);
    assert_eq!(run.warnings.iter().filter(|w| w.subject == "v1").count(), 1);
}

#[tokio::test]
async fn test_cancelled_run_makes_no_calls() {
    let store = fixture_store();
    let classifier = Arc::new(FakeClassifier::default());
    let completion = Arc::new(ScriptedCompletion::default());
    let orchestrator = build_orchestrator(
        store.clone(),
        classifier.clone(),
        Arc::new(FakeZeroShot::default()),
        completion.clone(),
        &test_settings(),
    );

    let token = CancellationToken::new();
    token.cancel();
    let mut run = PipelineRun::new();
    let result = orchestrator.execute_run(&mut run, &token).await;

    assert!(result.is_ok());
    assert_eq!(run.state, PipelineState::Cancelled);
    assert_eq!(classifier.call_count(), 0);
    assert_eq!(completion.count(PromptKind::Labels), 0);
    assert_eq!(store.review_update_count("r1").await, 0);
}

#[tokio::test]
async fn test_run_timeout_cancels_run() {
    let store = fixture_store();
    let settings = vri_common::config::PipelineSettings {
        run_timeout_secs: Some(1),
        ..test_settings()
    };
    let orchestrator = build_orchestrator(
        store.clone(),
        Arc::new(FakeClassifier::slow(std::time::Duration::from_secs(5))),
        Arc::new(FakeZeroShot::default()),
        Arc::new(ScriptedCompletion::default()),
        &settings,
    );

    let token = CancellationToken::new();
    let mut run = PipelineRun::new();
    let result = orchestrator.execute_run(&mut run, &token).await;

    assert!(result.is_ok());
    assert_eq!(run.state, PipelineState::Cancelled);
    assert!(token.is_cancelled());
    assert_eq!(run.warnings.len(), 1);
    assert_eq!(store.review_update_count("r1").await, 0);
}
