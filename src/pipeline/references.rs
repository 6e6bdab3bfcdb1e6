//! Reference URL parsing and fetching.
//!
//! Parsing is strict: one malformed entry rejects the whole request before
//! anything is fetched. Fetching is lenient: every per-URL failure becomes a
//! warning and the pipeline carries on with whatever text it gathered.

use crate::config::ReferenceConfig;
use crate::error::GenerationError;
use crate::utils::text::{char_len, clip_chars, collapse_whitespace};
use anyhow::{Context, Result};
use scraper::{Html, Node};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

const SEPARATORS: [char; 3] = ['\n', ',', '\u{FF0C}'];
const MAX_REPORTED_INVALID: usize = 3;
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Outcome of parsing the raw reference field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReferences {
    /// Unique, fragment-free URLs in input order, capped at the configured count.
    pub urls: Vec<Url>,
    /// Raw entries that are not absolute http(s) URLs.
    pub invalid: Vec<String>,
    /// More distinct URLs were supplied than the cap allows.
    pub truncated: bool,
}

impl ParsedReferences {
    pub fn ensure_valid(&self) -> Result<(), GenerationError> {
        if self.invalid.is_empty() {
            return Ok(());
        }
        let shown = self
            .invalid
            .iter()
            .take(MAX_REPORTED_INVALID)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Err(GenerationError::Validation(format!(
            "Invalid reference URL(s): {shown}"
        )))
    }
}

/// Parse one entry into a normalized URL: absolute, http(s), fragment removed.
pub fn normalize_reference_url(entry: &str) -> Option<Url> {
    let mut url = Url::parse(entry.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Split the raw field on newlines, commas and full-width commas.
pub fn parse_reference_sources(raw: &str, max_urls: usize) -> ParsedReferences {
    let mut parsed = ParsedReferences::default();
    let mut seen = HashSet::new();

    for entry in raw.split(SEPARATORS).map(str::trim).filter(|e| !e.is_empty()) {
        let Some(url) = normalize_reference_url(entry) else {
            parsed.invalid.push(entry.to_string());
            continue;
        };
        if !seen.insert(url.to_string()) {
            continue;
        }
        if parsed.urls.len() >= max_urls {
            parsed.truncated = true;
            continue;
        }
        parsed.urls.push(url);
    }

    parsed
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceSnippet {
    pub source_url: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedReferences {
    pub snippets: Vec<ReferenceSnippet>,
    pub warnings: Vec<String>,
    /// URLs that contributed a snippet.
    pub urls_used: Vec<String>,
    pub truncated: bool,
}

/// Fetches reference pages sequentially under per-URL and aggregate budgets.
pub struct ReferenceResolver {
    client: reqwest::Client,
    config: ReferenceConfig,
}

impl ReferenceResolver {
    pub fn new(config: &ReferenceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to build reference fetch client")?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ReferenceConfig {
        &self.config
    }

    /// Never fails; problems are reported in `warnings`.
    pub async fn resolve(&self, parsed: &ParsedReferences) -> ResolvedReferences {
        let mut resolved = ResolvedReferences {
            truncated: parsed.truncated,
            ..ResolvedReferences::default()
        };
        if parsed.truncated {
            resolved.warnings.push(format!(
                "Only the first {} reference URLs were used",
                self.config.max_urls
            ));
        }

        let mut remaining = self.config.total_chars;

        for url in &parsed.urls {
            if remaining == 0 {
                tracing::warn!(url = %url, "Reference budget exhausted, skipping");
                resolved
                    .warnings
                    .push(format!("Skipped {url}: reference text budget exhausted"));
                continue;
            }

            let text = match self.fetch_text(url).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Reference fetch failed");
                    resolved.warnings.push(format!("Could not fetch {url}: {e}"));
                    continue;
                }
            };

            if text.is_empty() {
                tracing::warn!(url = %url, "Reference has no readable text");
                resolved
                    .warnings
                    .push(format!("No readable text found at {url}"));
                continue;
            }

            let mut snippet = clip_chars(&text, self.config.per_url_chars);
            if char_len(snippet) > remaining {
                snippet = clip_chars(snippet, remaining);
                tracing::warn!(url = %url, remaining, "Reference clipped to fit budget");
                resolved
                    .warnings
                    .push(format!("Reference {url} was shortened to fit the text budget"));
            }
            remaining -= char_len(snippet);

            tracing::debug!(url = %url, chars = char_len(snippet), "Reference resolved");
            resolved.urls_used.push(url.to_string());
            resolved.snippets.push(ReferenceSnippet {
                source_url: url.to_string(),
                text: snippet.to_string(),
            });
        }

        resolved
    }

    async fn fetch_text(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!("timed out after {}s", self.config.timeout_secs)
                } else {
                    anyhow::anyhow!("request failed: {e}")
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {}", status.as_u16());
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("html"));

        let body = response.text().await.context("body could not be read")?;

        Ok(if is_html {
            html_to_text(&body)
        } else {
            collapse_whitespace(&body)
        })
    }
}

/// Visible text of an HTML document: non-rendered elements dropped,
/// entities decoded by the parser, whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            parts.push(text);
        }
    }

    collapse_whitespace(&parts.join(" "))
}
