//! Axum-based HTTP gateway for the generation API.
//!
//! Every endpoint answers with the `{ok, data}` / `{ok: false, error}` envelope
//! and identifies the caller through the `x-user-id` header.

mod handlers;

use handlers::{
    handle_add_article, handle_delete_all_articles, handle_delete_generation, handle_generate,
    handle_health, handle_list_articles, handle_list_generations, handle_model_access,
    handle_rebuild_style, handle_style_profile, handle_verify_invite,
};

use crate::app::AppState;
use crate::config::Config;
use anyhow::Result;
use axum::{
    Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (256KB). A request at every field's character cap,
/// written entirely in 3-byte CJK characters, stays well under it.
pub const MAX_BODY_SIZE: usize = 262_144;

/// Header carrying the caller's identity.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Build the router over `state`. Exposed so tests can drive it directly.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/generate", post(handle_generate))
        .route("/api/generations", get(handle_list_generations))
        .route("/api/generations/{id}", delete(handle_delete_generation))
        .route("/api/model-access", get(handle_model_access))
        .route("/api/model-access/verify", post(handle_verify_invite))
        .route("/api/style-profile", get(handle_style_profile))
        .route("/api/style-profile/rebuild", post(handle_rebuild_style))
        .route(
            "/api/articles",
            get(handle_list_articles).post(handle_add_article),
        )
        .route("/api/articles/delete-all", post(handle_delete_all_articles))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(middleware::map_response(envelope_layer_rejections))
}

/// The body limit and timeout layers answer with bare statuses; give them the envelope.
async fn envelope_layer_rejections(response: Response) -> Response {
    match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => handlers::failure(
            StatusCode::PAYLOAD_TOO_LARGE,
            "PAYLOAD_TOO_LARGE",
            format!("The request body exceeds {} KB.", MAX_BODY_SIZE / 1024),
        )
        .into_response(),
        StatusCode::REQUEST_TIMEOUT => handlers::failure(
            StatusCode::REQUEST_TIMEOUT,
            "TIMEOUT",
            "The request took too long, please try again later.",
        )
        .into_response(),
        _ => response,
    }
}

/// Run the HTTP gateway.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    run_gateway_with_listener(host, listener, config).await
}

/// Run the HTTP gateway from a pre-bound listener.
pub async fn run_gateway_with_listener(
    host: &str,
    listener: tokio::net::TcpListener,
    config: Config,
) -> Result<()> {
    let state = AppState::from_config(&config).await?;
    serve(host, listener, state, &config).await
}

/// Serve an already-assembled state.
pub async fn serve(
    host: &str,
    listener: tokio::net::TcpListener,
    state: AppState,
    config: &Config,
) -> Result<()> {
    let actual_port = listener.local_addr()?.port();
    tracing::info!(
        addr = %format!("{host}:{actual_port}"),
        database = %config.database_path().display(),
        "Gateway listening"
    );

    let app = router(
        state,
        Duration::from_secs(config.gateway.request_timeout_secs),
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C; gateway will run until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down gateway");
}
