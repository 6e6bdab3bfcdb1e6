use crate::error::GenerationError;
use crate::models::ModelKey;
use crate::store::StoredGeneration;
use crate::utils::text::char_len;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_TARGET_LENGTH: i64 = 10_000;
pub const MAX_OUTLINE_CHARS: usize = 10_000;
pub const MAX_KEY_POINTS_CHARS: usize = 5_000;
pub const MAX_OPTIONAL_FIELD_CHARS: usize = 5_000;

/// Generation request as received from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationRequest {
    pub target_length: i64,
    pub content_outline: String,
    pub key_points: String,
    #[serde(default)]
    pub constraint_conditions: Option<String>,
    #[serde(default)]
    pub author_persona: Option<String>,
    #[serde(default)]
    pub concrete_cases: Option<String>,
    /// Raw URL list separated by newlines or commas.
    #[serde(default)]
    pub reference_sources: Option<String>,
    #[serde(default)]
    pub include_subheadings: bool,
    #[serde(default)]
    pub model_key: ModelKey,
}

/// A request that passed field validation. Optional fields are `None` when blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub target_length: u32,
    pub content_outline: String,
    pub key_points: String,
    pub constraint_conditions: Option<String>,
    pub author_persona: Option<String>,
    pub concrete_cases: Option<String>,
    pub reference_sources: Option<String>,
    pub include_subheadings: bool,
    pub model_key: ModelKey,
}

fn required_field(
    value: &str,
    label: &str,
    max_chars: usize,
) -> Result<String, GenerationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(GenerationError::Validation(format!("{label} is required")));
    }
    if char_len(value) > max_chars {
        return Err(GenerationError::Validation(format!(
            "{label} must be at most {max_chars} characters"
        )));
    }
    Ok(value.to_string())
}

fn optional_field(value: Option<&str>, label: &str) -> Result<Option<String>, GenerationError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if char_len(value) > MAX_OPTIONAL_FIELD_CHARS {
        return Err(GenerationError::Validation(format!(
            "{label} must be at most {MAX_OPTIONAL_FIELD_CHARS} characters"
        )));
    }
    Ok(Some(value.to_string()))
}

impl GenerationRequest {
    pub fn validate(&self) -> Result<ValidatedRequest, GenerationError> {
        if !(1..=MAX_TARGET_LENGTH).contains(&self.target_length) {
            return Err(GenerationError::Validation(format!(
                "target_length must be between 1 and {MAX_TARGET_LENGTH}"
            )));
        }
        let target_length = u32::try_from(self.target_length).map_err(|_| {
            GenerationError::Validation("target_length is out of range".to_string())
        })?;

        Ok(ValidatedRequest {
            target_length,
            content_outline: required_field(
                &self.content_outline,
                "content_outline",
                MAX_OUTLINE_CHARS,
            )?,
            key_points: required_field(&self.key_points, "key_points", MAX_KEY_POINTS_CHARS)?,
            constraint_conditions: optional_field(
                self.constraint_conditions.as_deref(),
                "constraint_conditions",
            )?,
            author_persona: optional_field(self.author_persona.as_deref(), "author_persona")?,
            concrete_cases: optional_field(self.concrete_cases.as_deref(), "concrete_cases")?,
            reference_sources: optional_field(
                self.reference_sources.as_deref(),
                "reference_sources",
            )?,
            include_subheadings: self.include_subheadings,
            model_key: self.model_key,
        })
    }
}

/// Final state of the length-conformance loop.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub title: String,
    pub body: String,
    pub body_char_count: usize,
    pub resolved_model_id: String,
    pub deviation_percent: i64,
    /// Adjustment rounds that replaced the body.
    pub adjustments: u32,
    pub in_tolerance: bool,
    pub warnings: Vec<String>,
}

/// Success payload returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResponse {
    pub id: String,
    pub model_key: ModelKey,
    pub model_id: String,
    pub title: String,
    pub article: String,
    pub article_char_count: usize,
    pub target_length: u32,
    pub deviation_percent: i64,
    pub created_at: DateTime<Utc>,
    pub reference_warnings: Vec<String>,
    pub reference_urls_used: Vec<String>,
    pub reference_urls_truncated: bool,
    pub warnings: Vec<String>,
}

impl GenerationResponse {
    pub fn from_stored(
        stored: StoredGeneration,
        reference_warnings: Vec<String>,
        reference_urls_used: Vec<String>,
        reference_urls_truncated: bool,
        warnings: Vec<String>,
    ) -> Self {
        let record = stored.record;
        Self {
            id: stored.id,
            model_key: record.model_key,
            model_id: record.model_id,
            title: record.title,
            article: record.article,
            article_char_count: record.article_char_count,
            target_length: record.target_length,
            deviation_percent: record.deviation_percent,
            created_at: stored.created_at,
            reference_warnings,
            reference_urls_used,
            reference_urls_truncated,
            warnings,
        }
    }
}
