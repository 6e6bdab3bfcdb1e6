use crate::error::StyleError;
use crate::llm::{ChatMessage, ChatProvider, ChatRequest, SamplingParams, sanitize_api_error};
use crate::pipeline::extract::find_json_object;
use crate::store::{ArticleStore, StoredArticle, StyleProfile, StyleRebuilder, StyleSource};
use crate::utils::text::clip_chars;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Upper bound on sample text sent for analysis.
pub const MAX_SAMPLE_CHARS: usize = 80_000;
const SUMMARY_MARKER: &str = "---SUMMARY---";
const FALLBACK_SUMMARY_CHARS: usize = 500;

const ANALYSIS_PARAMS: SamplingParams = SamplingParams {
    temperature: 0.3,
    max_tokens: 2048,
};

const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a writing-style analyst. From the author's articles, extract their writing style and reply with strict JSON followed by a readable summary.

Output:
1. First one JSON object (no markdown code block) with the keys: tone, structure, heading_style (subheading style and density), common_phrases (array of recurring expressions), paragraph_rhythm, opening_pattern, closing_pattern, other_notes.
2. Then a single line "---SUMMARY---", followed by an 8 to 12 line readable style summary, written in the language of the articles, to be used as the style constraint for future articles."#;

/// Concatenate samples as `【filename】` blocks, clipped to the analysis budget.
pub fn combine_samples(articles: &[StoredArticle]) -> String {
    let combined = articles
        .iter()
        .map(|a| format!("【{}】\n{}", a.filename, a.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    clip_chars(&combined, MAX_SAMPLE_CHARS).to_string()
}

/// Split an analysis reply into `(summary, structured)`.
///
/// The summary is whatever follows the marker. When no JSON object can be
/// recovered, or no marker is present, the first 500 chars of the reply stand
/// in for the summary.
pub fn parse_analysis(raw: &str) -> (String, Value) {
    let mut summary = raw
        .find(SUMMARY_MARKER)
        .map(|idx| raw[idx + SUMMARY_MARKER.len()..].trim().to_string())
        .unwrap_or_default();

    let head = raw.find(SUMMARY_MARKER).map_or(raw, |idx| &raw[..idx]);
    let structured = find_json_object(head)
        .or_else(|| find_json_object(raw))
        .map(Value::Object);

    if summary.is_empty() {
        summary = clip_chars(raw.trim(), FALLBACK_SUMMARY_CHARS).to_string();
    }

    (
        summary,
        structured.unwrap_or_else(|| Value::Object(serde_json::Map::new())),
    )
}

/// Builds style profiles from a user's uploaded articles with the built-in model.
pub struct StyleAnalyzer {
    articles: Arc<dyn ArticleStore>,
    styles: Arc<dyn StyleSource>,
    provider: Arc<dyn ChatProvider>,
    model_id: String,
}

impl StyleAnalyzer {
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        styles: Arc<dyn StyleSource>,
        provider: Arc<dyn ChatProvider>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            articles,
            styles,
            provider,
            model_id: model_id.into(),
        }
    }

    async fn analyze(&self, user_id: &str) -> Result<StyleProfile, StyleError> {
        let articles = self.articles.list_articles(user_id).await?;
        if articles.is_empty() {
            return Err(StyleError::NoSourceMaterial);
        }

        let samples = combine_samples(&articles);
        let messages = [
            ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Analyze the following articles and reply with the JSON and the summary:\n\n{samples}"
            )),
        ];
        let request = ChatRequest::new(&self.model_id, &messages, ANALYSIS_PARAMS);

        tracing::info!(
            user_id,
            articles = articles.len(),
            model_id = self.model_id.as_str(),
            "Building style profile"
        );
        let raw = self.provider.complete(&request).await.map_err(|e| {
            let message = sanitize_api_error(&e.to_string());
            tracing::error!(provider = self.provider.name(), error = %message, "Style analysis failed");
            StyleError::Analysis(message)
        })?;

        let (summary, structured) = parse_analysis(&raw);
        let profile = StyleProfile::new(summary, structured);
        self.styles.save_style(user_id, &profile).await?;

        Ok(self.styles.get_style(user_id).await?.unwrap_or(profile))
    }
}

impl StyleRebuilder for StyleAnalyzer {
    fn rebuild<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<StyleProfile, StyleError>> + Send + 'a>> {
        Box::pin(self.analyze(user_id))
    }
}
