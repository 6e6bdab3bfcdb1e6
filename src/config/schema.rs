use crate::error::ConfigError;
use crate::models::{ModelCatalog, ModelKey, ModelSelection};
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Data directory - computed from home, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// SQLite database file (default: `<data_dir>/stylegen.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Invite code unlocking gated models
    #[serde(default = "default_invite_code")]
    pub invite_code: String,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub references: ReferenceConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Catalog overrides, replacing built-in entries by key
    #[serde(default)]
    pub models: Vec<ModelSelection>,
}

fn default_invite_code() -> String {
    "ocean11".into()
}

// ── Generation ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Allowed relative deviation from the target length (default: 0.1)
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Adjustment rounds after the initial attempt (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_adjust_temperature")]
    pub adjust_temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Body characters sent back to the model in an adjustment prompt
    #[serde(default = "default_adjust_body_cap")]
    pub adjust_body_cap: usize,
    /// Wall-clock budget for one generation, references and adjustments included.
    /// Adjustments still in flight when it runs out are abandoned.
    #[serde(default = "default_time_budget_secs")]
    pub time_budget_secs: u64,
}

fn default_tolerance() -> f64 {
    0.1
}

fn default_max_retries() -> u32 {
    2
}

fn default_temperature() -> f64 {
    0.7
}

fn default_adjust_temperature() -> f64 {
    0.5
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_adjust_body_cap() -> usize {
    12_000
}

fn default_time_budget_secs() -> u64 {
    240
}

/// Headroom the gateway keeps beyond the generation budget for persisting the result.
pub const GATEWAY_TIMEOUT_HEADROOM_SECS: u64 = 30;

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_retries: default_max_retries(),
            temperature: default_temperature(),
            adjust_temperature: default_adjust_temperature(),
            max_tokens: default_max_tokens(),
            adjust_body_cap: default_adjust_body_cap(),
            time_budget_secs: default_time_budget_secs(),
        }
    }
}

// ── Reference sources ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,
    #[serde(default = "default_reference_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_per_url_chars")]
    pub per_url_chars: usize,
    #[serde(default = "default_total_chars")]
    pub total_chars: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_max_urls() -> usize {
    5
}

fn default_reference_timeout_secs() -> u64 {
    8
}

fn default_per_url_chars() -> usize {
    3_000
}

fn default_total_chars() -> usize {
    12_000
}

fn default_user_agent() -> String {
    "stylegen/0.1".into()
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            max_urls: default_max_urls(),
            timeout_secs: default_reference_timeout_secs(),
            per_url_chars: default_per_url_chars(),
            total_chars: default_total_chars(),
            user_agent: default_user_agent(),
        }
    }
}

// ── Providers ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub deepseek: DeepseekConfig,
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepseekConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_deepseek_base_url")]
    pub base_url: String,
    /// Primary model id for the built-in provider
    #[serde(default = "default_deepseek_model")]
    pub model: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_deepseek_base_url() -> String {
    "https://api.deepseek.com".into()
}

fn default_deepseek_model() -> String {
    "deepseek-chat".into()
}

fn default_provider_timeout_secs() -> u64 {
    120
}

impl Default for DeepseekConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_deepseek_base_url(),
            model: default_deepseek_model(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
    /// Sent as `X-Title`
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Sent as `HTTP-Referer`
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

fn default_app_name() -> String {
    "Stylegen".into()
}

fn default_site_url() -> String {
    "http://localhost:3000".into()
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openrouter_base_url(),
            app_name: default_app_name(),
            site_url: default_site_url(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

// ── Gateway ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Gateway port (default: 3000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Whole-request timeout; a generation makes several model calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let stylegen_dir = home.join(".stylegen");

        Self {
            config_path: stylegen_dir.join("config.toml"),
            data_dir: stylegen_dir,
            database_path: None,
            invite_code: default_invite_code(),
            generation: GenerationConfig::default(),
            references: ReferenceConfig::default(),
            providers: ProvidersConfig::default(),
            gateway: GatewayConfig::default(),
            models: Vec::new(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let stylegen_dir = home.join(".stylegen");
        let config_path = stylegen_dir.join("config.toml");

        if !stylegen_dir.exists() {
            fs::create_dir_all(&stylegen_dir).context("Failed to create .stylegen directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            // Set computed paths that are skipped during serialization
            config.config_path.clone_from(&config_path);
            config.data_dir.clone_from(&stylegen_dir);
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                data_dir: stylegen_dir.clone(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = non_empty_env("STYLEGEN_DATABASE") {
            self.database_path = Some(PathBuf::from(path));
        }

        if let Some(code) = non_empty_env("STYLEGEN_INVITE_CODE") {
            self.invite_code = code;
        }

        if let Some(host) = non_empty_env("STYLEGEN_GATEWAY_HOST") {
            self.gateway.host = host;
        }

        if let Some(port) = non_empty_env("STYLEGEN_GATEWAY_PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }

        if let Some(base_url) = non_empty_env("DEEPSEEK_BASE_URL") {
            self.providers.deepseek.base_url = base_url;
        }

        if let Some(model) = non_empty_env("DEEPSEEK_MODEL") {
            self.providers.deepseek.model = model;
        }

        if let Some(base_url) = non_empty_env("OPENROUTER_BASE_URL") {
            self.providers.openrouter.base_url = base_url;
        }

        if let Some(app_name) = non_empty_env("OPENROUTER_APP_NAME") {
            self.providers.openrouter.app_name = app_name;
        }

        if let Some(site_url) = non_empty_env("STYLEGEN_SITE_URL") {
            self.providers.openrouter.site_url = site_url;
        }
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let generation = &self.generation;
        if !(generation.tolerance > 0.0 && generation.tolerance < 1.0) {
            return Err(ConfigError::Validation(format!(
                "generation.tolerance must be between 0 and 1 (got {})",
                generation.tolerance
            )));
        }
        if !(0.0..=2.0).contains(&generation.temperature)
            || !(0.0..=2.0).contains(&generation.adjust_temperature)
        {
            return Err(ConfigError::Validation(
                "generation temperatures must be within 0.0..=2.0".into(),
            ));
        }
        if generation.max_tokens == 0 || generation.adjust_body_cap == 0 {
            return Err(ConfigError::Validation(
                "generation.max_tokens and generation.adjust_body_cap must be positive".into(),
            ));
        }

        if generation.time_budget_secs == 0 {
            return Err(ConfigError::Validation(
                "generation.time_budget_secs must be positive".into(),
            ));
        }
        let needed = generation.time_budget_secs + GATEWAY_TIMEOUT_HEADROOM_SECS;
        if self.gateway.request_timeout_secs < needed {
            return Err(ConfigError::Validation(format!(
                "gateway.request_timeout_secs must be at least {needed} \
                 (generation.time_budget_secs + {GATEWAY_TIMEOUT_HEADROOM_SECS})"
            )));
        }

        let references = &self.references;
        if references.max_urls == 0
            || references.per_url_chars == 0
            || references.total_chars == 0
            || references.timeout_secs == 0
        {
            return Err(ConfigError::Validation(
                "references limits and timeout must be positive".into(),
            ));
        }

        if self.invite_code.trim().is_empty() {
            return Err(ConfigError::Validation("invite_code must not be empty".into()));
        }

        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("stylegen.db"))
    }

    /// Catalog with config overrides applied. The built-in provider's primary
    /// id follows `providers.deepseek.model` unless explicitly overridden.
    pub fn model_catalog(&self) -> ModelCatalog {
        let mut overrides = self.models.clone();
        if !overrides.iter().any(|m| m.key == ModelKey::Deepseek) {
            if let Some(builtin) = ModelCatalog::default().get(ModelKey::Deepseek) {
                let mut builtin = builtin.clone();
                builtin.primary_model_id.clone_from(&self.providers.deepseek.model);
                overrides.push(builtin);
            }
        }
        ModelCatalog::with_overrides(&overrides)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
