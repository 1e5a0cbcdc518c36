//! Category vocabulary induction
//!
//! Samples review texts with a fixed seed, asks the generative service for a
//! list of short category phrases and parses the answer as a list literal.
//! The vocabulary lives for one run only.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::Review;
use crate::types::{CompletionService, LabelInductionError, ParseError};

/// Induction parameters
#[derive(Debug, Clone)]
pub struct LabelInductionConfig {
    /// Number of categories requested
    pub target_count: usize,
    /// Maximum number of reviews shown to the model
    pub sample_size: usize,
    /// Sampling seed
    pub seed: u64,
    pub temperature: f32,
}

impl Default for LabelInductionConfig {
    fn default() -> Self {
        Self {
            target_count: 10,
            sample_size: 100,
            seed: 42,
            temperature: 0.2,
        }
    }
}

/// Induces the run vocabulary through the generative service
pub struct LabelInducer {
    completion: Arc<dyn CompletionService>,
    config: LabelInductionConfig,
}

impl LabelInducer {
    pub fn new(completion: Arc<dyn CompletionService>, config: LabelInductionConfig) -> Self {
        Self { completion, config }
    }

    /// Produce the category vocabulary from `reviews`
    ///
    /// # Errors
    /// - `NoReviews` when no review has text
    /// - `Service` when the completion call fails
    /// - `Parse` when the answer is not a non-empty list of strings
    pub async fn induce_labels(&self, reviews: &[Review]) -> Result<Vec<String>, LabelInductionError> {
        let sample = sample_texts(reviews, self.config.sample_size, self.config.seed);
        if sample.is_empty() {
            return Err(LabelInductionError::NoReviews);
        }

        tracing::info!(
            sampled = sample.len(),
            target_count = self.config.target_count,
            "Inducing category vocabulary"
        );

        let prompt = build_label_prompt(&sample, self.config.target_count);
        let response = self
            .completion
            .complete(&prompt, self.config.temperature)
            .await?;

        let labels = parse_list_literal(&response)?;

        if labels.len() != self.config.target_count {
            tracing::warn!(
                expected = self.config.target_count,
                received = labels.len(),
                "Vocabulary size differs from requested count"
            );
        }

        tracing::info!(labels = ?labels, "Category vocabulary induced");
        Ok(labels)
    }
}

/// Deterministic sample of non-empty review texts
///
/// All texts are used, in input order, when there are no more than
/// `sample_size` of them.
pub fn sample_texts(reviews: &[Review], sample_size: usize, seed: u64) -> Vec<&str> {
    let texts: Vec<&str> = reviews.iter().filter_map(Review::analyzable_text).collect();

    if texts.len() <= sample_size {
        return texts;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    texts
        .choose_multiple(&mut rng, sample_size)
        .copied()
        .collect()
}

/// Instruction prompt listing the sampled reviews as numbered lines
pub fn build_label_prompt(sample: &[&str], target_count: usize) -> String {
    let numbered: Vec<String> = sample
        .iter()
        .enumerate()
        .map(|(i, text)| format!("{}. {}", i + 1, single_line(text)))
        .collect();

    format!(
        "Voici un échantillon d'avis clients sur des prestataires :\n\n\
         {}\n\n\
         Propose exactement {} catégories courtes (deux à quatre mots) qui résument \
         les thèmes abordés dans ces avis.\n\
         Réponds uniquement par une liste de chaînes, par exemple \
         ['catégorie 1', 'catégorie 2'], sans aucun autre texte.",
        numbered.join("\n"),
        target_count
    )
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a list-of-strings literal
///
/// Accepts JSON arrays and single-quoted literals, optionally inside a
/// Markdown code fence. Items are trimmed, empty items dropped and duplicates
/// removed, keeping first occurrences.
pub fn parse_list_literal(text: &str) -> Result<Vec<String>, ParseError> {
    let body = strip_code_fence(text.trim());

    if !(body.starts_with('[') && body.ends_with(']')) {
        return Err(ParseError::NotAList(excerpt(text)));
    }

    let raw = match serde_json::from_str::<Vec<serde_json::Value>>(body) {
        Ok(values) => values
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => Ok(s),
                other => Err(ParseError::NotAList(format!("non-string item {}", other))),
            })
            .collect::<Result<Vec<String>, ParseError>>()?,
        Err(_) => parse_quoted_items(body).ok_or_else(|| ParseError::NotAList(excerpt(text)))?,
    };

    let mut seen = HashSet::new();
    let labels: Vec<String> = raw
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.clone()))
        .collect();

    if labels.is_empty() {
        return Err(ParseError::EmptyList);
    }

    Ok(labels)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (```json) up to the first newline
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Items of a bracketed list of single- or double-quoted strings
fn parse_quoted_items(body: &str) -> Option<Vec<String>> {
    let inner = body.strip_prefix('[')?.strip_suffix(']')?;
    let mut chars = inner.chars().peekable();
    let mut items = Vec::new();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let quote = match chars.next() {
            None => break,
            Some(q @ ('\'' | '"')) => q,
            Some(_) => return None,
        };

        let mut item = String::new();
        loop {
            match chars.next()? {
                '\\' => item.push(chars.next()?),
                c if c == quote => break,
                c => item.push(c),
            }
        }
        items.push(item);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(_) => return None,
        }
    }

    Some(items)
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(80) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
