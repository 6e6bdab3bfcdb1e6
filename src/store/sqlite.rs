use super::traits::{ArticleStore, GenerationStore, StoreFuture, StyleSource, VerificationStore};
use super::types::{
    FieldSet, GenerationRecord, GenerationSummary, StoredArticle, StoredGeneration, StyleProfile,
};
use crate::error::StoreError;
use crate::utils::text::{char_len, clean_text};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

/// Model attribution filled into rows written before model selection existed.
const LEGACY_MODEL_KEY: &str = "deepseek";
const LEGACY_MODEL_ID: &str = "deepseek-chat";

/// SQLite-backed implementation of every store trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database; a single connection keeps every query on it.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool. Tables that already exist are left untouched,
    /// so an older `generations` layout stays in its legacy shape.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert_generation(
        &self,
        record: &GenerationRecord,
        fields: FieldSet,
    ) -> std::result::Result<StoredGeneration, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let created_at_text = to_db_timestamp(created_at);
        let target_length = i64::from(record.target_length);
        let char_count = i64::try_from(record.article_char_count).unwrap_or(i64::MAX);

        match fields {
            FieldSet::Extended => {
                sqlx::query(
                    "INSERT INTO generations (
                        id, user_id, target_length, content_outline, key_points, title, article,
                        article_char_count, created_at, model_key, model_id, deviation_percent,
                        constraint_conditions, author_persona, concrete_cases, reference_sources,
                        include_subheadings
                     ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(&record.user_id)
                .bind(target_length)
                .bind(&record.content_outline)
                .bind(&record.key_points)
                .bind(&record.title)
                .bind(&record.article)
                .bind(char_count)
                .bind(&created_at_text)
                .bind(record.model_key.to_string())
                .bind(&record.model_id)
                .bind(record.deviation_percent)
                .bind(record.constraint_conditions.as_deref())
                .bind(record.author_persona.as_deref())
                .bind(record.concrete_cases.as_deref())
                .bind(record.reference_sources.as_deref())
                .bind(record.include_subheadings)
                .execute(&self.pool)
                .await?;
            }
            FieldSet::Legacy => {
                sqlx::query(
                    "INSERT INTO generations (
                        id, user_id, target_length, content_outline, key_points, title, article,
                        article_char_count, created_at
                     ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(&record.user_id)
                .bind(target_length)
                .bind(&record.content_outline)
                .bind(&record.key_points)
                .bind(&record.title)
                .bind(&record.article)
                .bind(char_count)
                .bind(&created_at_text)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(StoredGeneration {
            id,
            created_at,
            record: record.clone(),
        })
    }

    async fn list_generations(
        &self,
        user_id: &str,
        limit: u32,
    ) -> std::result::Result<Vec<GenerationSummary>, StoreError> {
        let limit = i64::from(limit.clamp(1, 50));
        let extended = sqlx::query(
            "SELECT id, model_key, model_id, deviation_percent, target_length, content_outline,
                    key_points, title, article, article_char_count, created_at
             FROM generations
             WHERE user_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from);

        match extended {
            Ok(rows) => rows.iter().map(|row| row_to_summary(row, true)).collect(),
            Err(err) if err.is_schema_mismatch() => {
                tracing::warn!(error = %err, "Generation history uses legacy columns");
                let rows = sqlx::query(
                    "SELECT id, target_length, content_outline, key_points, title, article,
                            article_char_count, created_at
                     FROM generations
                     WHERE user_id = ?
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
                rows.iter().map(|row| row_to_summary(row, false)).collect()
            }
            Err(err) => Err(err),
        }
    }
}

// ── Trait impls ─────────────────────────────────────────────────────────────

impl StyleSource for SqliteStore {
    fn get_style<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, Option<StyleProfile>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT profile_json, profile_summary, updated_at
                 FROM user_style_profiles WHERE user_id = ?",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

            let Some(row) = row else {
                return Ok(None);
            };

            let raw_json: Option<String> = row.try_get("profile_json")?;
            let structured = raw_json
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_else(|| serde_json::json!({}));
            let summary: Option<String> = row.try_get("profile_summary")?;
            let updated_at: Option<String> = row.try_get("updated_at")?;

            Ok(Some(StyleProfile {
                summary: summary.unwrap_or_default(),
                structured,
                updated_at: updated_at.as_deref().map(parse_db_timestamp).transpose()?,
            }))
        })
    }

    fn save_style<'a>(
        &'a self,
        user_id: &'a str,
        profile: &'a StyleProfile,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO user_style_profiles (user_id, profile_json, profile_summary, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(user_id) DO UPDATE SET
                    profile_json = excluded.profile_json,
                    profile_summary = excluded.profile_summary,
                    updated_at = excluded.updated_at",
            )
            .bind(user_id)
            .bind(profile.structured.to_string())
            .bind(&profile.summary)
            .bind(to_db_timestamp(profile.updated_at.unwrap_or_else(Utc::now)))
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }
}

impl VerificationStore for SqliteStore {
    fn is_verified<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let verified: Option<bool> = sqlx::query_scalar(
                "SELECT invite_verified FROM user_model_access WHERE user_id = ?",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(verified.unwrap_or(false))
        })
    }

    fn mark_verified<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let now = to_db_timestamp(Utc::now());
            sqlx::query(
                "INSERT INTO user_model_access (user_id, invite_verified, verified_at, updated_at)
                 VALUES (?, 1, ?, ?)
                 ON CONFLICT(user_id) DO UPDATE SET
                    invite_verified = 1,
                    verified_at = excluded.verified_at,
                    updated_at = excluded.updated_at",
            )
            .bind(user_id)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }
}

impl GenerationStore for SqliteStore {
    fn record<'a>(
        &'a self,
        record: &'a GenerationRecord,
        fields: FieldSet,
    ) -> StoreFuture<'a, StoredGeneration> {
        Box::pin(self.insert_generation(record, fields))
    }

    fn list<'a>(&'a self, user_id: &'a str, limit: u32) -> StoreFuture<'a, Vec<GenerationSummary>> {
        Box::pin(self.list_generations(user_id, limit))
    }

    fn delete<'a>(&'a self, user_id: &'a str, id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM generations WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }
}

impl ArticleStore for SqliteStore {
    fn add_article<'a>(
        &'a self,
        user_id: &'a str,
        filename: &'a str,
        text: &'a str,
    ) -> StoreFuture<'a, StoredArticle> {
        Box::pin(async move {
            let text = clean_text(text);
            let article = StoredArticle {
                id: Uuid::new_v4().to_string(),
                filename: filename.to_string(),
                char_count: i64::try_from(char_len(&text)).unwrap_or(i64::MAX),
                text,
                created_at: Utc::now(),
            };

            sqlx::query(
                "INSERT INTO user_articles (
                    id, user_id, filename, extracted_text, extracted_char_count, created_at
                 ) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&article.id)
            .bind(user_id)
            .bind(&article.filename)
            .bind(&article.text)
            .bind(article.char_count)
            .bind(to_db_timestamp(article.created_at))
            .execute(&self.pool)
            .await?;

            Ok(article)
        })
    }

    fn list_articles<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, Vec<StoredArticle>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, filename, extracted_text, extracted_char_count, created_at
                 FROM user_articles
                 WHERE user_id = ?
                 ORDER BY created_at DESC, rowid DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(row_to_article).collect()
        })
    }

    fn clear_library<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;
            let removed = sqlx::query("DELETE FROM user_articles WHERE user_id = ?")
                .bind(user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            sqlx::query("DELETE FROM user_style_profiles WHERE user_id = ?")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(removed)
        })
    }
}

// ── Row mapping ─────────────────────────────────────────────────────────────

fn row_to_article(row: &SqliteRow) -> std::result::Result<StoredArticle, StoreError> {
    let created_at: String = row.try_get("created_at")?;
    Ok(StoredArticle {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        text: row
            .try_get::<Option<String>, _>("extracted_text")?
            .unwrap_or_default(),
        char_count: row.try_get("extracted_char_count")?,
        created_at: parse_db_timestamp(&created_at)?,
    })
}

fn row_to_summary(
    row: &SqliteRow,
    extended: bool,
) -> std::result::Result<GenerationSummary, StoreError> {
    let created_at: String = row.try_get("created_at")?;

    let (model_key, model_id, deviation_percent) = if extended {
        let model_key: Option<String> = row.try_get("model_key")?;
        (
            model_key.unwrap_or_else(|| LEGACY_MODEL_KEY.to_string()),
            row.try_get::<Option<String>, _>("model_id")?,
            row.try_get::<Option<i64>, _>("deviation_percent")?,
        )
    } else {
        (
            LEGACY_MODEL_KEY.to_string(),
            Some(LEGACY_MODEL_ID.to_string()),
            None,
        )
    };

    Ok(GenerationSummary {
        id: row.try_get("id")?,
        model_key,
        model_id,
        target_length: row.try_get("target_length")?,
        content_outline: row.try_get("content_outline")?,
        key_points: row.try_get("key_points")?,
        title: row.try_get("title")?,
        article: row.try_get("article")?,
        article_char_count: row.try_get("article_char_count")?,
        deviation_percent,
        created_at: parse_db_timestamp(&created_at)?,
    })
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn to_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Other(format!("invalid timestamp '{raw}': {e}")))
}

// ── Schema ──────────────────────────────────────────────────────────────────

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS generations (
            id                    TEXT PRIMARY KEY,
            user_id               TEXT NOT NULL,
            target_length         INTEGER NOT NULL,
            content_outline       TEXT NOT NULL,
            key_points            TEXT NOT NULL,
            title                 TEXT NOT NULL,
            article               TEXT NOT NULL,
            article_char_count    INTEGER NOT NULL,
            created_at            TEXT NOT NULL,
            model_key             TEXT NOT NULL DEFAULT 'deepseek',
            model_id              TEXT,
            deviation_percent     INTEGER,
            constraint_conditions TEXT,
            author_persona        TEXT,
            concrete_cases        TEXT,
            reference_sources     TEXT,
            include_subheadings   INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create generations table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_generations_user_created
         ON generations(user_id, created_at)",
    )
    .execute(pool)
    .await
    .context("Failed to create generations index")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_style_profiles (
            user_id         TEXT PRIMARY KEY,
            profile_json    TEXT,
            profile_summary TEXT,
            updated_at      TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create user_style_profiles table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_model_access (
            user_id         TEXT PRIMARY KEY,
            invite_verified INTEGER NOT NULL DEFAULT 0,
            verified_at     TEXT,
            updated_at      TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create user_model_access table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_articles (
            id                   TEXT PRIMARY KEY,
            user_id              TEXT NOT NULL,
            filename             TEXT NOT NULL,
            extracted_text       TEXT,
            extracted_char_count INTEGER NOT NULL DEFAULT 0,
            created_at           TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create user_articles table")?;

    Ok(())
}
