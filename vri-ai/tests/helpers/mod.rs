//! Shared test helpers: scripted model services and fixtures
//!
//! Each integration test binary uses a different subset.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vri_ai::db::{DocumentStore, MemoryDocumentStore};
use vri_ai::models::{Review, Sentiment, Venue};
use vri_ai::services::{PipelineOrchestrator, ServiceRegistry};
use vri_ai::types::{
    Classifier, CompletionService, ServiceError, ZeroShotScorer, ZeroShotScores,
};
use vri_common::config::PipelineSettings;

pub const VOCABULARY_RESPONSE: &str =
    "['qualité des plats', 'service client', 'rapport qualité/prix', 'ponctualité']";
pub const VOCABULARY_SIZE: usize = 4;

/// Classifier answering "positive" unless the text is scripted to fail
#[derive(Default)]
pub struct FakeClassifier {
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
    pub fail_on: HashSet<String>,
    pub delay: Option<Duration>,
}

impl FakeClassifier {
    pub fn failing_on(texts: &[&str]) -> Self {
        Self {
            fail_on: texts.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, text: &str) -> Result<Sentiment, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_on.contains(text) {
            return Err(ServiceError::Api(500, "classifier unavailable".to_string()));
        }

        Ok(Sentiment {
            label: "positive".to_string(),
            score: 0.9,
        })
    }
}

/// Zero-shot scorer returning every candidate label, reversed, with
/// increasing scores summing to one
#[derive(Default)]
pub struct FakeZeroShot {
    pub calls: AtomicUsize,
    pub fail_on: HashSet<String>,
    /// Leave the first candidate out of the answer for these texts
    pub drop_label_on: HashSet<String>,
}

impl FakeZeroShot {
    pub fn failing_on(texts: &[&str]) -> Self {
        Self {
            fail_on: texts.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ZeroShotScorer for FakeZeroShot {
    async fn score(
        &self,
        text: &str,
        candidate_labels: &[String],
        _hypothesis_template: &str,
    ) -> Result<ZeroShotScores, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_on.contains(text) {
            return Err(ServiceError::Timeout("zero-shot timed out".to_string()));
        }

        let mut labels: Vec<String> = candidate_labels.iter().rev().cloned().collect();
        if self.drop_label_on.contains(text) {
            labels.pop();
        }

        let n = labels.len() as f64;
        let total = n * (n + 1.0) / 2.0;
        let scores = (1..=labels.len()).map(|i| i as f64 / total).collect();

        Ok(ZeroShotScores { labels, scores })
    }
}

/// Kind of prompt received by `ScriptedCompletion`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Labels,
    Batch,
    Final,
}

/// Completion service answering by prompt kind
///
/// - label prompts get `labels_response`
/// - batch prompts get "Synthèse partielle : <first review text>"
/// - final prompts get a well-formed three-section answer naming the venue,
///   unless `final_overrides` holds an answer for that venue
pub struct ScriptedCompletion {
    pub labels_response: String,
    pub final_overrides: HashMap<String, String>,
    /// Batch prompts containing one of these texts fail
    pub failing_batch_texts: HashSet<String>,
    pub prompts: Mutex<Vec<(PromptKind, String)>>,
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self {
            labels_response: VOCABULARY_RESPONSE.to_string(),
            final_overrides: HashMap::new(),
            failing_batch_texts: HashSet::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedCompletion {
    pub fn with_labels(response: &str) -> Self {
        Self {
            labels_response: response.to_string(),
            ..Self::default()
        }
    }

    pub fn with_final_override(venue_name: &str, response: &str) -> Self {
        let mut completion = Self::default();
        completion
            .final_overrides
            .insert(venue_name.to_string(), response.to_string());
        completion
    }

    pub fn count(&self, kind: PromptKind) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn prompts_of(&self, kind: PromptKind) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

fn venue_name_in(prompt: &str) -> String {
    prompt
        .split_once("« ")
        .and_then(|(_, rest)| rest.split_once(" »"))
        .map(|(name, _)| name.to_string())
        .unwrap_or_default()
}

fn first_review_text(prompt: &str) -> String {
    prompt
        .split_once("Avis : ")
        .and_then(|(_, rest)| rest.split_once('\n'))
        .map(|(text, _)| text.to_string())
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String, ServiceError> {
        let kind = if prompt.contains("catégories courtes") {
            PromptKind::Labels
        } else if prompt.contains("synthèse finale") {
            PromptKind::Final
        } else {
            PromptKind::Batch
        };
        self.prompts
            .lock()
            .unwrap()
            .push((kind, prompt.to_string()));

        match kind {
            PromptKind::Labels => Ok(self.labels_response.clone()),
            PromptKind::Batch => {
                if self
                    .failing_batch_texts
                    .iter()
                    .any(|text| prompt.contains(text.as_str()))
                {
                    return Err(ServiceError::RateLimited);
                }
                Ok(format!("Synthèse partielle : {}", first_review_text(prompt)))
            }
            PromptKind::Final => {
                let venue = venue_name_in(prompt);
                Ok(self.final_overrides.get(&venue).cloned().unwrap_or_else(|| {
                    format!(
                        "Résumé : Avis globalement positifs sur {venue}.\n\
                         Points clés : Cuisine soignée, équipe ponctuelle.\n\
                         Score global : 82"
                    )
                }))
            }
        }
    }
}

/// Two venues, seven reviews with text, one empty review and one orphan
pub fn fixture_venues() -> Vec<Venue> {
    vec![Venue::new("v1", "Saveurs & Co"), Venue::new("v2", "Traiteur Dupont")]
}

pub fn fixture_reviews() -> Vec<Review> {
    vec![
        Review::new("r1", "v1", Some("Buffet copieux et raffiné")),
        Review::new("r2", "v1", Some("Service un peu lent")),
        Review::new("r3", "v1", Some("Très bon rapport qualité prix")),
        Review::new("r4", "v1", Some("Équipe arrivée en retard")),
        Review::new("r5", "v1", Some("Desserts exceptionnels")),
        Review::new("r6", "v2", Some("Plats froids à l'arrivée")),
        Review::new("r7", "v2", Some("Personnel aimable")),
        Review::new("r8", "v1", None),
        Review::new("r9", "v404", Some("Avis sans prestataire")),
    ]
}

pub fn fixture_store() -> Arc<MemoryDocumentStore> {
    Arc::new(MemoryDocumentStore::with_documents(
        fixture_venues(),
        fixture_reviews(),
    ))
}

/// Small batches so venue v1 spans several
pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        label_count: VOCABULARY_SIZE,
        batch_size: 2,
        max_concurrency: 3,
        ..PipelineSettings::default()
    }
}

pub fn build_orchestrator(
    store: Arc<dyn DocumentStore>,
    classifier: Arc<FakeClassifier>,
    zero_shot: Arc<FakeZeroShot>,
    completion: Arc<ScriptedCompletion>,
    settings: &PipelineSettings,
) -> PipelineOrchestrator {
    let registry = ServiceRegistry::new(classifier, zero_shot, completion);
    PipelineOrchestrator::new(&registry, store, settings)
}
