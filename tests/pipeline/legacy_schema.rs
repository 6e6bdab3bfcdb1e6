use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use stylegen::models::ModelKey;
use stylegen::pipeline::PersistenceAdapter;
use stylegen::store::{GenerationRecord, GenerationStore, SqliteStore};
use tempfile::TempDir;

/// A `generations` table as it looked before model selection and the optional
/// request fields were stored.
const LEGACY_GENERATIONS: &str = "CREATE TABLE generations (
    id                 TEXT PRIMARY KEY,
    user_id            TEXT NOT NULL,
    target_length      INTEGER NOT NULL,
    content_outline    TEXT NOT NULL,
    key_points         TEXT NOT NULL,
    title              TEXT NOT NULL,
    article            TEXT NOT NULL,
    article_char_count INTEGER NOT NULL,
    created_at         TEXT NOT NULL
)";

async fn legacy_store(dir: &TempDir) -> SqliteStore {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("legacy.db").display());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap();
    sqlx::query(LEGACY_GENERATIONS).execute(&pool).await.unwrap();
    SqliteStore::from_pool(pool).await.unwrap()
}

fn record(title: &str) -> GenerationRecord {
    GenerationRecord {
        user_id: "u1".into(),
        model_key: ModelKey::Grok,
        model_id: "x-ai/grok-3".into(),
        target_length: 1000,
        content_outline: "outline".into(),
        key_points: "points".into(),
        constraint_conditions: Some("no jargon".into()),
        author_persona: None,
        concrete_cases: None,
        reference_sources: None,
        include_subheadings: true,
        title: title.into(),
        article: "x".repeat(960),
        article_char_count: 960,
        deviation_percent: -4,
    }
}

#[tokio::test]
async fn legacy_schema_write_falls_back_and_keeps_model_fields() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(legacy_store(&dir).await);
    let adapter = PersistenceAdapter::new(store.clone());

    let stored = adapter.record(&record("First")).await.unwrap();
    assert!(!adapter.supports_extended_fields());
    assert_eq!(stored.record.model_key, ModelKey::Grok);
    assert_eq!(stored.record.model_id, "x-ai/grok-3");
    assert_eq!(stored.record.deviation_percent, -4);

    adapter.record(&record("Second")).await.unwrap();
    let history = store.list("u1", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].title, "Second");
}

#[tokio::test]
async fn legacy_rows_list_with_default_model_attribution() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(legacy_store(&dir).await);
    PersistenceAdapter::new(store.clone())
        .record(&record("Old"))
        .await
        .unwrap();

    let history = store.list("u1", 10).await.unwrap();
    assert_eq!(history[0].model_key, "deepseek");
    assert_eq!(history[0].model_id.as_deref(), Some("deepseek-chat"));
    assert_eq!(history[0].deviation_percent, None);
    assert_eq!(history[0].article_char_count, 960);
}

#[tokio::test]
async fn current_schema_stores_extended_fields() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteStore::open(&dir.path().join("current.db"))
            .await
            .unwrap(),
    );
    let adapter = PersistenceAdapter::new(store.clone());

    adapter.record(&record("New")).await.unwrap();
    assert!(adapter.supports_extended_fields());

    let history = store.list("u1", 10).await.unwrap();
    assert_eq!(history[0].model_key, "grok");
    assert_eq!(history[0].model_id.as_deref(), Some("x-ai/grok-3"));
    assert_eq!(history[0].deviation_percent, Some(-4));
}
