//! OpenAI-compatible chat completions client.
//! Both the built-in provider and the routed provider speak the same
//! `/chat/completions` format; this module serves them with one implementation.

use super::scrub::sanitize_api_error;
use super::traits::ChatProvider;
use super::types::ChatRequest;
use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub struct OpenAiCompatibleProvider {
    pub(crate) name: String,
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    /// Pre-computed chat completions URL (avoids `format!` per request).
    cached_chat_url: String,
    /// Attribution headers. Dropped for one retry when upstream rejects them.
    extra_headers: Vec<(&'static str, String)>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<MessageContent>,
}

/// Routed providers may return content as a list of typed parts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Parts(parts) => parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
                .trim()
                .to_string(),
        }
    }
}

fn build_provider_client_with_timeout(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Keep printable ASCII only; header values with anything else are rejected by HTTP stacks.
fn to_safe_header_value(input: &str) -> String {
    input
        .chars()
        .filter(|c| (' '..='~').contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn looks_like_header_issue(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    [
        "header",
        "referer",
        "x-title",
        "bytestring",
        "invalid character",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

fn extract_chat_text(response: ChatResponse, provider_name: &str) -> anyhow::Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(MessageContent::into_text)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| anyhow::anyhow!("{provider_name} returned no content"))
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>, timeout_secs: u64) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let cached_chat_url = if base_url.contains("chat/completions") {
            base_url.to_string()
        } else {
            format!("{base_url}/chat/completions")
        };

        Self {
            name: name.to_string(),
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            cached_chat_url,
            extra_headers: Vec::new(),
            client: build_provider_client_with_timeout(timeout_secs),
        }
    }

    /// Attach an optional header. Values that sanitize to nothing are skipped.
    pub fn with_optional_header(mut self, name: &'static str, value: &str) -> Self {
        let value = to_safe_header_value(value);
        if !value.is_empty() {
            self.extra_headers.push((name, value));
        }
        self
    }

    fn chat_completions_url(&self) -> &str {
        &self.cached_chat_url
    }

    async fn send(
        &self,
        request: &ChatRequest,
        auth_header: &str,
        with_extra_headers: bool,
    ) -> anyhow::Result<(StatusCode, String)> {
        let mut builder = self
            .client
            .post(self.chat_completions_url())
            .header("Authorization", auth_header)
            .json(request);

        if with_extra_headers {
            for (name, value) in &self.extra_headers {
                builder = builder.header(*name, value);
            }
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("{} chat completions request failed", self.name))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("{} response body could not be read", self.name))?;
        Ok((status, body))
    }

    async fn complete_internal(&self, request: &ChatRequest) -> anyhow::Result<String> {
        let auth_header = self.cached_auth_header.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "{} API key not set. Add it to config.toml or set the provider env var.",
                self.name
            )
        })?;

        let (mut status, mut body) = self.send(request, auth_header, true).await?;

        if !status.is_success() && !self.extra_headers.is_empty() && looks_like_header_issue(&body)
        {
            tracing::warn!(
                provider = self.name.as_str(),
                status = status.as_u16(),
                "Upstream rejected attribution headers, retrying without them"
            );
            (status, body) = self.send(request, auth_header, false).await?;
        }

        if !status.is_success() {
            let sanitized = sanitize_api_error(&body);
            anyhow::bail!("{} API error ({status}): {sanitized}", self.name);
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .with_context(|| format!("{} chat completions JSON decode failed", self.name))?;
        extract_chat_text(parsed, &self.name)
    }
}

impl ChatProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(self.complete_internal(request))
    }
}
