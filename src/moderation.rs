use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value, json};

use crate::errors::{AiError, AiResult};
use crate::schema::{JsonSchema, TypeDescriptor, parse_value};

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Category names understood by the native moderation endpoints
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "harassment",
    "harassment/threatening",
    "hate",
    "hate/threatening",
    "illicit",
    "illicit/violent",
    "self-harm",
    "self-harm/instructions",
    "self-harm/intent",
    "sexual",
    "sexual/minors",
    "violence",
    "violence/graphic",
];

/// Which categories to evaluate and when to flag
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationOptions {
    categories: BTreeSet<String>,
    threshold: f64,
}

impl Default for ModerationOptions {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ModerationOptions {
    pub fn builder() -> ModerationOptionsBuilder {
        ModerationOptionsBuilder::default()
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[derive(Debug, Default)]
pub struct ModerationOptionsBuilder {
    categories: BTreeSet<String>,
    threshold: Option<f64>,
}

impl ModerationOptionsBuilder {
    pub fn category(mut self, category: impl AsRef<str>) -> Self {
        let category = category.as_ref().trim();
        if !category.is_empty() {
            self.categories.insert(category.to_string());
        }
        self
    }

    pub fn categories<I, S>(self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        categories.into_iter().fold(self, |builder, c| builder.category(c))
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn build(self) -> AiResult<ModerationOptions> {
        let threshold = self.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AiError::invalid_input(format!(
                "Moderation threshold must be between 0.0 and 1.0, got {}",
                threshold
            )));
        }
        let categories = if self.categories.is_empty() {
            ModerationOptions::default().categories
        } else {
            self.categories
        };
        Ok(ModerationOptions {
            categories,
            threshold,
        })
    }
}

/// Category scores of one moderation call.
///
/// Everything except the scores and the threshold is derived on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationResult {
    scores: BTreeMap<String, f64>,
    threshold: f64,
    flagged: bool,
}

impl ModerationResult {
    /// Scores are clamped into `[0, 1]`; a category is flagged when its score
    /// is strictly greater than the threshold.
    pub fn new(scores: BTreeMap<String, f64>, threshold: f64) -> Self {
        let scores: BTreeMap<String, f64> = scores
            .into_iter()
            .map(|(category, score)| (category, clamp_score(score)))
            .collect();
        let flagged = scores.values().any(|score| *score > threshold);
        Self {
            scores,
            threshold,
            flagged,
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged
    }

    pub fn is_flagged_category(&self, category: &str) -> bool {
        self.scores
            .get(category)
            .is_some_and(|score| *score > self.threshold)
    }

    pub fn scores(&self) -> &BTreeMap<String, f64> {
        &self.scores
    }

    pub fn score(&self, category: &str) -> Option<f64> {
        self.scores.get(category).copied()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Category with the highest score; ties resolve to the first in name order
    pub fn highest_category(&self) -> Option<(&str, f64)> {
        self.scores
            .iter()
            .fold(None, |best: Option<(&str, f64)>, (category, score)| match best {
                Some((_, best_score)) if best_score >= *score => best,
                _ => Some((category.as_str(), *score)),
            })
    }

    pub fn categories_above_threshold(&self) -> Vec<&str> {
        self.scores
            .iter()
            .filter(|(_, score)| **score > self.threshold)
            .map(|(category, _)| category.as_str())
            .collect()
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

/// Schema of the `{category: score}` object a chat model is asked to return
pub fn moderation_schema(options: &ModerationOptions) -> JsonSchema {
    let properties: Map<String, Value> = options
        .categories()
        .iter()
        .map(|category| {
            (
                category.clone(),
                json!({"type": "number", "minimum": 0.0, "maximum": 1.0}),
            )
        })
        .collect();

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    schema.insert("required".to_string(), json!(options.categories()));
    schema.insert("additionalProperties".to_string(), Value::Bool(false));
    JsonSchema::from_map(schema)
}

/// System prompt for vendors without a moderation endpoint
pub fn moderation_prompt(options: &ModerationOptions) -> String {
    let categories = options
        .categories()
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You are a content moderation classifier. Rate the user's content for each of these \
         categories: {}. For every category return a score between 0.0 (certainly absent) and \
         1.0 (certainly present). Respond only with a JSON object mapping each category name to \
         its score.",
        categories
    )
}

/// Turn a `{category: score}` object into a result, keeping requested categories only
pub fn parse_category_scores(scores: &Value, options: &ModerationOptions) -> AiResult<ModerationResult> {
    let normalized = parse_value(scores, &TypeDescriptor::map(TypeDescriptor::Number))?;

    let scores = normalized
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(category, _)| options.categories().contains(category.as_str()))
        .filter_map(|(category, score)| Some((category.clone(), score.as_f64()?)))
        .collect();

    Ok(ModerationResult::new(scores, options.threshold()))
}
