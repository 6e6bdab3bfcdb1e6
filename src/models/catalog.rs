use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::IntoEnumIterator;

/// Logical model keys exposed to callers.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum ModelKey {
    #[default]
    #[serde(rename = "deepseek")]
    #[strum(serialize = "deepseek")]
    Deepseek,
    #[serde(rename = "grok")]
    #[strum(serialize = "grok")]
    Grok,
    #[serde(rename = "gpt_5_2")]
    #[strum(serialize = "gpt_5_2")]
    Gpt52,
    #[serde(rename = "gemini")]
    #[strum(serialize = "gemini")]
    Gemini,
    #[serde(rename = "opus_4_6")]
    #[strum(serialize = "opus_4_6")]
    Opus46,
}

/// Which upstream API serves a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    /// The built-in free-tier provider. Dispatched directly, never with fallback.
    Deepseek,
    Openrouter,
}

impl ProviderKind {
    pub fn is_builtin(self) -> bool {
        matches!(self, Self::Deepseek)
    }
}

/// Static routing for one logical model key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub key: ModelKey,
    pub label: String,
    pub provider: ProviderKind,
    pub primary_model_id: String,
    #[serde(default)]
    pub fallback_model_ids: Vec<String>,
    #[serde(default)]
    pub invite_required: bool,
}

impl ModelSelection {
    /// Ordered candidate model ids. The built-in provider only ever tries its primary id.
    pub fn candidates(&self) -> Vec<&str> {
        let mut ids = vec![self.primary_model_id.as_str()];
        if !self.provider.is_builtin() {
            ids.extend(self.fallback_model_ids.iter().map(String::as_str));
        }
        ids
    }
}

/// Entry shown to clients choosing a model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelOption {
    pub key: ModelKey,
    pub label: String,
    pub invite_required: bool,
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    entries: HashMap<ModelKey, ModelSelection>,
}

impl ModelCatalog {
    /// Built-in catalog with `overrides` replacing entries by key.
    pub fn with_overrides(overrides: &[ModelSelection]) -> Self {
        let mut entries: HashMap<ModelKey, ModelSelection> = default_selections()
            .into_iter()
            .map(|selection| (selection.key, selection))
            .collect();
        for selection in overrides {
            entries.insert(selection.key, selection.clone());
        }
        Self { entries }
    }

    pub fn get(&self, key: ModelKey) -> Option<&ModelSelection> {
        self.entries.get(&key)
    }

    /// Options in declaration order of [`ModelKey`].
    pub fn options(&self) -> Vec<ModelOption> {
        ModelKey::iter()
            .filter_map(|key| self.entries.get(&key))
            .map(|selection| ModelOption {
                key: selection.key,
                label: selection.label.clone(),
                invite_required: selection.invite_required,
            })
            .collect()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::with_overrides(&[])
    }
}

fn selection(
    key: ModelKey,
    label: &str,
    provider: ProviderKind,
    primary: &str,
    fallbacks: &[&str],
    invite_required: bool,
) -> ModelSelection {
    ModelSelection {
        key,
        label: label.to_string(),
        provider,
        primary_model_id: primary.to_string(),
        fallback_model_ids: fallbacks.iter().map(ToString::to_string).collect(),
        invite_required,
    }
}

fn default_selections() -> Vec<ModelSelection> {
    vec![
        selection(
            ModelKey::Deepseek,
            "DeepSeek",
            ProviderKind::Deepseek,
            "deepseek-chat",
            &[],
            false,
        ),
        selection(
            ModelKey::Grok,
            "Grok",
            ProviderKind::Openrouter,
            "x-ai/grok-4",
            &["x-ai/grok-3"],
            true,
        ),
        selection(
            ModelKey::Gpt52,
            "GPT 5.2",
            ProviderKind::Openrouter,
            "openai/gpt-5.2",
            &["openai/gpt-5.1", "openai/gpt-5"],
            true,
        ),
        selection(
            ModelKey::Gemini,
            "Gemini",
            ProviderKind::Openrouter,
            "google/gemini-2.5-pro",
            &["google/gemini-2.5-flash"],
            true,
        ),
        selection(
            ModelKey::Opus46,
            "Opus 4.6",
            ProviderKind::Openrouter,
            "anthropic/claude-opus-4.6",
            &["anthropic/claude-opus-4.5"],
            true,
        ),
    ]
}
