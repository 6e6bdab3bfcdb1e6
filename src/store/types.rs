use crate::models::ModelKey;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Derived description of a user's writing style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleProfile {
    /// Human-readable summary used as the style constraint in prompts.
    pub summary: String,
    /// Structured traits (tone, structure, common phrases, ...).
    pub structured: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StyleProfile {
    pub fn new(summary: impl Into<String>, structured: serde_json::Value) -> Self {
        Self {
            summary: summary.into(),
            structured,
            updated_at: None,
        }
    }

    /// A profile without summary text cannot steer generation on its own,
    /// but still counts as present when the structured half has content.
    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty()
            && self
                .structured
                .as_object()
                .is_none_or(serde_json::Map::is_empty)
    }
}

/// Plain-text writing sample uploaded by a user.
#[derive(Debug, Clone, Serialize)]
pub struct StoredArticle {
    pub id: String,
    pub filename: String,
    pub text: String,
    pub char_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Which column set a generation write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSet {
    /// Every column, including model attribution and optional request fields.
    Extended,
    /// Columns present before model selection existed.
    Legacy,
}

/// Everything persisted for one finished generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRecord {
    pub user_id: String,
    pub model_key: ModelKey,
    pub model_id: String,
    pub target_length: u32,
    pub content_outline: String,
    pub key_points: String,
    pub constraint_conditions: Option<String>,
    pub author_persona: Option<String>,
    pub concrete_cases: Option<String>,
    pub reference_sources: Option<String>,
    pub include_subheadings: bool,
    pub title: String,
    pub article: String,
    pub article_char_count: usize,
    pub deviation_percent: i64,
}

/// A generation after it was written, with store-assigned identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredGeneration {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: GenerationRecord,
}

/// History row. Legacy rows lack model attribution and deviation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSummary {
    pub id: String,
    pub model_key: String,
    pub model_id: Option<String>,
    pub target_length: i64,
    pub content_outline: String,
    pub key_points: String,
    pub title: String,
    pub article: String,
    pub article_char_count: i64,
    pub deviation_percent: Option<i64>,
    pub created_at: DateTime<Utc>,
}
