use serde_json::json;
use stylegen::app::AppState;
use stylegen::config::Config;
use stylegen::llm::ProviderRegistry;
use stylegen::models::ModelKey;
use stylegen::pipeline::GenerationRequest;
use stylegen::store::{SqliteStore, StyleProfile, StyleSource, VerificationStore};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "cmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

async fn state_against(server: &MockServer, dir: &TempDir) -> (AppState, SqliteStore) {
    let mut config = Config::default();
    config.data_dir = dir.path().to_path_buf();
    config.database_path = Some(dir.path().join("stylegen.db"));
    config.providers.deepseek.base_url = server.uri();
    config.providers.deepseek.api_key = Some("sk-deepseek-test".into());
    config.providers.openrouter.base_url = format!("{}/api/v1", server.uri());
    config.providers.openrouter.api_key = Some("sk-or-test".into());

    let store = SqliteStore::open(&config.database_path()).await.unwrap();
    store
        .save_style("u1", &StyleProfile::new("Crisp.", json!({})))
        .await
        .unwrap();
    let registry = ProviderRegistry::from_config(&config.providers);
    let state = AppState::assemble(&config, store.clone(), registry).unwrap();
    (state, store)
}

#[tokio::test]
async fn builtin_provider_is_called_over_http() {
    let server = MockServer::start().await;
    let article = "好".repeat(500);
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-deepseek-test"))
        .and(body_partial_json(json!({"model": "deepseek-chat", "max_tokens": 4096})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            &json!({"title": "HTTP", "article": article}).to_string(),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (state, _store) = state_against(&server, &dir).await;
    let request = GenerationRequest {
        target_length: 500,
        content_outline: "o".into(),
        key_points: "k".into(),
        ..GenerationRequest::default()
    };

    let response = state.service.generate("u1", &request).await.unwrap();
    assert_eq!(response.title, "HTTP");
    assert_eq!(response.article_char_count, 500);
    assert_eq!(response.deviation_percent, 0);
}

#[tokio::test]
async fn routed_provider_falls_back_to_the_next_model_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "x-ai/grok-4"})))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-or-test"))
        .and(body_partial_json(json!({"model": "x-ai/grok-3"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            &json!({"title": "Fallback", "article": "a".repeat(300)}).to_string(),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (state, store) = state_against(&server, &dir).await;
    store.mark_verified("u1").await.unwrap();
    let request = GenerationRequest {
        target_length: 300,
        content_outline: "o".into(),
        key_points: "k".into(),
        model_key: ModelKey::Grok,
        ..GenerationRequest::default()
    };

    let response = state.service.generate("u1", &request).await.unwrap();
    assert_eq!(response.model_id, "x-ai/grok-3");
    assert_eq!(response.title, "Fallback");
}
