use super::compatible::OpenAiCompatibleProvider;
use super::traits::ChatProvider;
use crate::config::ProvidersConfig;
use crate::models::ProviderKind;
use std::collections::HashMap;
use std::sync::Arc;

/// Env vars still honored for the routed provider key, with a deprecation warning.
const LEGACY_OPENROUTER_ENV: [&str; 2] = ["OPEN_ROUTER_API", "Open_Router_API"];

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolve the API key for a provider kind.
///
/// Resolution order:
/// 1. Explicit config value (trimmed, ignored when empty)
/// 2. Provider env var (`DEEPSEEK_API_KEY`, `OPENROUTER_API_KEY`)
/// 3. Legacy routed-provider env vars, logged as deprecated
pub fn resolve_api_key(kind: ProviderKind, explicit_api_key: Option<&str>) -> Option<String> {
    if let Some(key) = explicit_api_key.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    match kind {
        ProviderKind::Deepseek => non_empty_env("DEEPSEEK_API_KEY"),
        ProviderKind::Openrouter => non_empty_env("OPENROUTER_API_KEY").or_else(|| {
            LEGACY_OPENROUTER_ENV.iter().find_map(|name| {
                let value = non_empty_env(name)?;
                tracing::warn!(
                    env = *name,
                    "Deprecated env var for the OpenRouter key, use OPENROUTER_API_KEY"
                );
                Some(value)
            })
        }),
    }
}

/// The built-in provider is configured with its bare host; its API lives under `/v1`.
fn deepseek_api_base(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") || base.contains("chat/completions") {
        base.to_string()
    } else {
        format!("{base}/v1")
    }
}

pub fn create_provider(kind: ProviderKind, config: &ProvidersConfig) -> Box<dyn ChatProvider> {
    match kind {
        ProviderKind::Deepseek => {
            let cfg = &config.deepseek;
            let api_key = resolve_api_key(kind, cfg.api_key.as_deref());
            Box::new(OpenAiCompatibleProvider::new(
                "DeepSeek",
                &deepseek_api_base(&cfg.base_url),
                api_key.as_deref(),
                cfg.timeout_secs,
            ))
        }
        ProviderKind::Openrouter => {
            let cfg = &config.openrouter;
            let api_key = resolve_api_key(kind, cfg.api_key.as_deref());
            Box::new(
                OpenAiCompatibleProvider::new(
                    "OpenRouter",
                    &cfg.base_url,
                    api_key.as_deref(),
                    cfg.timeout_secs,
                )
                .with_optional_header("HTTP-Referer", &cfg.site_url)
                .with_optional_header("X-Title", &cfg.app_name),
            )
        }
    }
}

/// One shared provider instance per [`ProviderKind`].
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn from_config(config: &ProvidersConfig) -> Self {
        [ProviderKind::Deepseek, ProviderKind::Openrouter]
            .into_iter()
            .fold(Self::default(), |registry, kind| {
                registry.with_provider(kind, Arc::from(create_provider(kind, config)))
            })
    }

    pub fn with_provider(mut self, kind: ProviderKind, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ChatProvider>> {
        self.providers.get(&kind).cloned()
    }
}
