use crate::harness::{Harness, article_reply};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use stylegen::gateway;
use stylegen::store::{GenerationStore, StyleSource};

struct GatewayTestServer {
    port: u16,
    harness: Harness,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl GatewayTestServer {
    async fn start(replies: Vec<Result<String, String>>) -> Self {
        Self::start_with(Harness::new(replies).await).await
    }

    async fn start_with_style(replies: Vec<Result<String, String>>, user: &str) -> Self {
        Self::start_with(Harness::new(replies).await.with_style(user).await).await
    }

    async fn start_with(harness: Harness) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral gateway listener should bind");
        let port = listener
            .local_addr()
            .expect("ephemeral gateway listener should expose local address")
            .port();

        let state = harness.state.clone();
        let config = harness.config.clone();
        let handle = tokio::spawn(async move {
            gateway::serve("127.0.0.1", listener, state, &config).await
        });

        wait_until_gateway_ready(port).await;
        Self {
            port,
            harness,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    async fn get(&self, path: &str, user: Option<&str>) -> (StatusCode, Value) {
        let mut request = reqwest::Client::new().get(self.url(path));
        if let Some(user) = user {
            request = request.header("x-user-id", user);
        }
        let response = request.send().await.unwrap();
        (response.status(), response.json().await.unwrap())
    }

    async fn post(&self, path: &str, user: &str, body: &Value) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .post(self.url(path))
            .header("x-user-id", user)
            .json(body)
            .send()
            .await
            .unwrap();
        (response.status(), response.json().await.unwrap())
    }

    async fn delete(&self, path: &str, user: &str) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .delete(self.url(path))
            .header("x-user-id", user)
            .send()
            .await
            .unwrap();
        (response.status(), response.json().await.unwrap())
    }
}

impl Drop for GatewayTestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn wait_until_gateway_ready(port: u16) {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .expect("reqwest client should be built");

    for _ in 0..80 {
        let health = client
            .get(format!("http://127.0.0.1:{port}/health"))
            .send()
            .await;
        if health.is_ok_and(|r| r.status().is_success()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("gateway did not become ready on port {port}");
}

fn generate_body(model_key: &str) -> Value {
    json!({
        "model_key": model_key,
        "target_length": 1000,
        "content_outline": "Morning routines",
        "key_points": "Consistency beats intensity",
    })
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn health_uses_the_envelope() {
    let server = GatewayTestServer::start(vec![]).await;
    let (status, body) = server.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "data": {"status": "ok"}}));
}

#[tokio::test]
async fn missing_user_header_is_unauthorized() {
    let server = GatewayTestServer::start(vec![]).await;
    let (status, body) = server.get("/api/generations", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["ok"], false);
    assert_eq!(error_code(&body), "UNAUTHORIZED");
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let server = GatewayTestServer::start(vec![]).await;
    let response = reqwest::Client::new()
        .post(server.url("/api/generate"))
        .header("x-user-id", "u1")
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn generate_returns_the_full_response_and_records_history() {
    let server =
        GatewayTestServer::start_with_style(vec![article_reply("Mornings", 980)], "u1").await;

    let (status, body) = server
        .post("/api/generate", "u1", &generate_body("deepseek"))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["title"], "Mornings");
    assert_eq!(data["article_char_count"], 980);
    assert_eq!(data["deviation_percent"], -2);
    assert_eq!(data["model_key"], "deepseek");
    assert_eq!(data["model_id"], "deepseek-chat");
    assert_eq!(data["reference_urls_truncated"], false);
    assert!(data["warnings"].as_array().unwrap().is_empty());

    let (status, body) = server.get("/api/generations?limit=5", Some("u1")).await;
    assert_eq!(status, StatusCode::OK);
    let generations = body["data"]["generations"].as_array().unwrap();
    assert_eq!(generations.len(), 1);
    assert_eq!(generations[0]["id"], data["id"]);

    let (_, other) = server.get("/api/generations", Some("u2")).await;
    assert!(other["data"]["generations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn gated_model_needs_invite_verification() {
    let server = GatewayTestServer::start(vec![]).await;
    let (status, body) = server
        .post("/api/generate", "u1", &generate_body("gpt_5_2"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "VERIFICATION_REQUIRED");
    assert_eq!(server.harness.provider.calls(), 0);
}

#[tokio::test]
async fn invite_verification_flow() {
    let server = GatewayTestServer::start(vec![]).await;

    let (status, body) = server
        .post("/api/model-access/verify", "u1", &json!({"invite_code": "  "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (_, body) = server
        .post("/api/model-access/verify", "u1", &json!({"invite_code": "wrong"}))
        .await;
    assert_eq!(error_code(&body), "INVALID_INVITE_CODE");

    let (_, body) = server.get("/api/model-access", Some("u1")).await;
    assert_eq!(body["data"]["invite_verified"], false);

    let (status, body) = server
        .post("/api/model-access/verify", "u1", &json!({"invite_code": "ocean11"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["invite_verified"], true);

    let (_, body) = server.get("/api/model-access", Some("u1")).await;
    assert_eq!(body["data"]["invite_verified"], true);
    let models = body["data"]["models"].as_array().unwrap();
    assert_eq!(models.len(), 5);
    assert_eq!(models[0]["key"], "deepseek");
    assert_eq!(models[0]["invite_required"], false);
}

#[tokio::test]
async fn article_library_round_trip_and_delete_all() {
    let server = GatewayTestServer::start(vec![Ok(
        "{\"tone\":\"plain\"}\n---SUMMARY---\nPlain and direct.".to_string(),
    )])
    .await;

    let (status, body) = server
        .post("/api/style-profile/rebuild", "u1", &json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "NO_ARTICLES");

    let long_text = "word ".repeat(300);
    let (status, body) = server
        .post(
            "/api/articles",
            "u1",
            &json!({"filename": "post.txt", "text": long_text}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["filename"], "post.txt");

    let (_, body) = server.get("/api/articles", Some("u1")).await;
    let articles = body["data"]["articles"].as_array().unwrap();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0]["preview"].as_str().unwrap().chars().count(), 500);

    let (status, body) = server
        .post("/api/style-profile/rebuild", "u1", &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["profile_summary"], "Plain and direct.");

    let (_, body) = server.get("/api/style-profile", Some("u1")).await;
    assert_eq!(body["data"]["profile_json"]["tone"], "plain");

    let (status, _) = server
        .post("/api/articles/delete-all", "u1", &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = server.get("/api/articles", Some("u1")).await;
    assert!(body["data"]["articles"].as_array().unwrap().is_empty());
    assert!(server.harness.store.get_style("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn article_without_text_is_rejected() {
    let server = GatewayTestServer::start(vec![]).await;
    let (status, body) = server
        .post("/api/articles", "u1", &json!({"filename": "a.txt", "text": " \n "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn deleting_generations_checks_id_and_owner() {
    let server = GatewayTestServer::start_with_style(vec![article_reply("T", 1000)], "u1").await;
    let (_, body) = server
        .post("/api/generate", "u1", &generate_body("deepseek"))
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = server.delete("/api/generations/not-a-uuid", "u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = server
        .delete(&format!("/api/generations/{id}"), "u2")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let (status, body) = server.delete(&format!("/api/generations/{id}"), "u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id.as_str());
    assert!(server.harness.store.list("u1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn request_at_every_field_cap_in_cjk_is_accepted() {
    let server =
        GatewayTestServer::start_with_style(vec![article_reply("长文", 1000)], "u1").await;
    let body = json!({
        "model_key": "deepseek",
        "target_length": 1000,
        "content_outline": "字".repeat(10_000),
        "key_points": "观".repeat(5_000),
        "author_persona": "人".repeat(5_000),
        "constraint_conditions": "约".repeat(5_000),
        "concrete_cases": "例".repeat(5_000),
    });
    assert!(body.to_string().len() > 65_536);

    let (status, body) = server.post("/api/generate", "u1", &body).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["title"], "长文");
}

#[tokio::test]
async fn gateway_timeout_is_reported_with_the_envelope() {
    let harness = Harness::with_config(vec![article_reply("T", 1000)], |config| {
        config.gateway.request_timeout_secs = 1;
    })
    .await
    .with_style("u1")
    .await;
    harness.provider.delay_call(0, Duration::from_secs(3));
    let server = GatewayTestServer::start_with(harness).await;

    let (status, body) = server
        .post("/api/generate", "u1", &generate_body("deepseek"))
        .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(error_code(&body), "TIMEOUT");
}
