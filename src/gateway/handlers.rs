use crate::app::AppState;
use crate::error::{GenerationError, StoreError, StyleError};
use crate::pipeline::GenerationRequest;
use crate::store::StyleProfile;
use crate::utils::text::clip_chars;
use axum::{
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::USER_ID_HEADER;

type ApiResponse = (StatusCode, Json<Value>);

const DEFAULT_HISTORY_LIMIT: u32 = 10;
const PREVIEW_CHARS: usize = 500;

fn success(data: Value) -> ApiResponse {
    (StatusCode::OK, Json(json!({ "ok": true, "data": data })))
}

pub(super) fn failure(status: StatusCode, code: &str, message: impl Into<String>) -> ApiResponse {
    let body = json!({
        "ok": false,
        "error": { "code": code, "message": message.into() },
    });
    (status, Json(body))
}

fn db_failure(context: &str, err: &StoreError) -> ApiResponse {
    tracing::error!(error = %err, "{context}");
    failure(
        StatusCode::INTERNAL_SERVER_ERROR,
        "DB_ERROR",
        format!("{context}, please try again later."),
    )
}

fn generation_failure(err: &GenerationError) -> ApiResponse {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    failure(status, err.code(), err.user_message())
}

/// The caller's id from `x-user-id`, or a 401 envelope.
fn caller(headers: &HeaderMap) -> Result<String, ApiResponse> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
        .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Not signed in."))
}

fn invalid_json(rejection: &JsonRejection) -> ApiResponse {
    tracing::debug!(error = %rejection, "Rejected request body");
    failure(
        StatusCode::BAD_REQUEST,
        "VALIDATION_ERROR",
        format!("Invalid request body: {}", rejection.body_text()),
    )
}

fn profile_json(profile: Option<&StyleProfile>) -> Value {
    json!({
        "profile_json": profile.map(|p| p.structured.clone()),
        "profile_summary": profile.map(|p| p.summary.clone()),
        "updated_at": profile.and_then(|p| p.updated_at),
    })
}

/// GET /health
pub(super) async fn handle_health() -> ApiResponse {
    success(json!({ "status": "ok" }))
}

/// POST /api/generate
pub(super) async fn handle_generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<GenerationRequest>, JsonRejection>,
) -> ApiResponse {
    let user_id = match caller(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Json(request) = match body {
        Ok(body) => body,
        Err(e) => return invalid_json(&e),
    };

    match state.service.generate(&user_id, &request).await {
        Ok(response) => success(json!(response)),
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                code = e.code(),
                error = %e,
                "Generation request failed"
            );
            generation_failure(&e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    limit: Option<u32>,
}

/// GET /api/generations?limit=N
pub(super) async fn handle_list_generations(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResponse {
    let user_id = match caller(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    // an unparsable limit falls back to the default rather than failing
    let limit = query
        .ok()
        .and_then(|Query(q)| q.limit)
        .unwrap_or(DEFAULT_HISTORY_LIMIT);

    match state.generations.list(&user_id, limit).await {
        Ok(generations) => success(json!({ "generations": generations })),
        Err(e) => db_failure("Failed to load generation history", &e),
    }
}

/// DELETE /api/generations/{id}
pub(super) async fn handle_delete_generation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResponse {
    let user_id = match caller(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if Uuid::parse_str(&id).is_err() {
        return failure(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Invalid record id.");
    }

    match state.generations.delete(&user_id, &id).await {
        Ok(true) => {
            tracing::info!(user_id = %user_id, id = %id, "Generation deleted");
            success(json!({ "id": id }))
        }
        Ok(false) => failure(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "The record does not exist or belongs to someone else.",
        ),
        Err(e) => db_failure("Failed to delete the record", &e),
    }
}

/// GET /api/model-access
pub(super) async fn handle_model_access(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let user_id = match caller(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.verification.is_verified(&user_id).await {
        Ok(verified) => success(json!({
            "invite_verified": verified,
            "models": state.catalog.options(),
        })),
        Err(e) => db_failure("Failed to load model access", &e),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct VerifyBody {
    #[serde(default)]
    invite_code: Option<String>,
}

/// POST /api/model-access/verify
pub(super) async fn handle_verify_invite(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<VerifyBody>, JsonRejection>,
) -> ApiResponse {
    let user_id = match caller(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return invalid_json(&e),
    };

    let code = body.invite_code.as_deref().map(str::trim).unwrap_or_default();
    if code.is_empty() {
        return failure(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "Enter an invite code.",
        );
    }
    if code != state.invite_code.as_ref() {
        tracing::warn!(user_id = %user_id, "Invite verification with wrong code");
        return failure(
            StatusCode::BAD_REQUEST,
            "INVALID_INVITE_CODE",
            "The invite code is incorrect, please try again.",
        );
    }

    match state.verification.mark_verified(&user_id).await {
        Ok(()) => {
            tracing::info!(user_id = %user_id, "Invite verified");
            success(json!({ "invite_verified": true }))
        }
        Err(e) => db_failure("Invite verification failed", &e),
    }
}

/// GET /api/style-profile
pub(super) async fn handle_style_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let user_id = match caller(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.styles.get_style(&user_id).await {
        Ok(profile) => success(profile_json(profile.as_ref())),
        Err(e) => db_failure("Failed to load the style profile", &e),
    }
}

/// POST /api/style-profile/rebuild
pub(super) async fn handle_rebuild_style(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let user_id = match caller(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.rebuilder.rebuild(&user_id).await {
        Ok(profile) => success(profile_json(Some(&profile))),
        Err(StyleError::NoSourceMaterial) => failure(
            StatusCode::BAD_REQUEST,
            "NO_ARTICLES",
            "Upload at least one article first.",
        ),
        Err(StyleError::Analysis(message)) => {
            tracing::error!(user_id = %user_id, error = %message, "Style rebuild failed");
            failure(
                StatusCode::BAD_GATEWAY,
                "AI_ERROR",
                "Style analysis failed, please try again later.",
            )
        }
        Err(StyleError::Store(e)) => db_failure("Failed to save the style profile", &e),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ArticleBody {
    filename: String,
    text: String,
}

/// POST /api/articles
pub(super) async fn handle_add_article(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ArticleBody>, JsonRejection>,
) -> ApiResponse {
    let user_id = match caller(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return invalid_json(&e),
    };

    let filename = body.filename.trim();
    if filename.is_empty() {
        return failure(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "filename is required.",
        );
    }
    if body.text.trim().is_empty() {
        return failure(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "The article has no text.",
        );
    }

    match state.articles.add_article(&user_id, filename, &body.text).await {
        Ok(article) => {
            tracing::info!(
                user_id = %user_id,
                id = article.id.as_str(),
                chars = article.char_count,
                "Article added"
            );
            success(json!({
                "id": article.id,
                "filename": article.filename,
                "char_count": article.char_count,
                "created_at": article.created_at,
            }))
        }
        Err(e) => db_failure("Failed to save the article", &e),
    }
}

/// GET /api/articles
pub(super) async fn handle_list_articles(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let user_id = match caller(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.articles.list_articles(&user_id).await {
        Ok(articles) => {
            let articles: Vec<Value> = articles
                .iter()
                .map(|a| {
                    json!({
                        "id": a.id,
                        "filename": a.filename,
                        "char_count": a.char_count,
                        "created_at": a.created_at,
                        "preview": clip_chars(&a.text, PREVIEW_CHARS),
                    })
                })
                .collect();
            success(json!({ "articles": articles }))
        }
        Err(e) => db_failure("Failed to load articles", &e),
    }
}

/// POST /api/articles/delete-all
pub(super) async fn handle_delete_all_articles(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let user_id = match caller(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.articles.clear_library(&user_id).await {
        Ok(removed) => {
            tracing::info!(user_id = %user_id, removed, "Article library cleared");
            success(json!({ "removed": removed }))
        }
        Err(e) => db_failure("Failed to delete articles", &e),
    }
}
