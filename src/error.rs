use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `stylegen`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal plumbing continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum StylegenError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Generation pipeline ─────────────────────────────────────────────
    #[error("generation: {0}")]
    Generation(#[from] GenerationError),

    // ── Storage ─────────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Style profile ───────────────────────────────────────────────────
    #[error("style: {0}")]
    Style(#[from] StyleError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Generation errors ───────────────────────────────────────────────────────

/// Request-level failures of the generation pipeline.
///
/// `Display` carries the operator-facing detail; [`GenerationError::user_message`]
/// is the single sentence returned to callers.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("model {model_key} requires invite verification")]
    VerificationRequired { model_key: String },

    #[error("no style profile: {0}")]
    NoStyleProfile(String),

    #[error("all dispatch candidates failed: {message}")]
    Provider { message: String },

    #[error("model reply could not be parsed: {message}")]
    Parse { message: String },

    #[error("persistence failed: {message}")]
    Persistence { message: String },
}

impl GenerationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::VerificationRequired { .. } => "VERIFICATION_REQUIRED",
            Self::NoStyleProfile(_) => "NO_STYLE_PROFILE",
            Self::Provider { .. } => "AI_ERROR",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::Persistence { .. } => "DB_ERROR",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::NoStyleProfile(message) => message.clone(),
            Self::VerificationRequired { .. } => {
                "This model requires invite verification before use.".to_string()
            }
            Self::Provider { .. } => "Generation failed, please try again later.".to_string(),
            Self::Parse { .. } => "The generated result could not be parsed.".to_string(),
            Self::Persistence { .. } => "Failed to save the generation record.".to_string(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::NoStyleProfile(_) => 400,
            Self::VerificationRequired { .. } => 403,
            Self::Provider { .. } | Self::Parse { .. } => 502,
            Self::Persistence { .. } => 500,
        }
    }
}

// ─── Storage errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing schema lacks a column the write or read referenced.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("storage failure: {0}")]
    Other(String),
}

impl StoreError {
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::SchemaMismatch(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let message = err.to_string();
        if is_missing_column_message(&message) {
            Self::SchemaMismatch(message)
        } else {
            Self::Other(message)
        }
    }
}

/// SQLite reports unknown columns as `no such column: x` on reads and
/// `table t has no column named x` on inserts.
fn is_missing_column_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("no such column") || lower.contains("has no column named")
}

// ─── Style profile errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("no source material: upload at least one article first")]
    NoSourceMaterial,

    #[error("style analysis failed: {0}")]
    Analysis(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, StylegenError>;
