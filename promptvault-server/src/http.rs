//! PromptVault HTTP REST API
//!
//! Each endpoint has a thin axum handler that extracts parameters and
//! delegates to an `*_inner` function taking a `&Store`. The inner functions
//! are directly testable without going through the router.
//!
//! Endpoints (resource routes are nested under `http.api_prefix`):
//! - GET    /health
//! - GET    /conversations, POST /conversations
//! - GET    /conversations/:id, PUT, DELETE
//! - GET    /conversations/:id/ratings, POST
//! - GET    /messages/:id/ratings, POST
//! - GET    /ratings/stats
//! - GET    /ratings/:id, PUT, DELETE

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use promptvault_core::models::rating::validate_rating;
use promptvault_core::models::RatingTarget;
use promptvault_core::{convert, PromptVaultConfig, Store};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::envelope::ApiReply;
use crate::pagination::{Page, PageQuery};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub store: Store,
    pub config: PromptVaultConfig,
}

pub fn build_router(state: Arc<HttpState>) -> Router {
    let api = Router::new()
        .route(
            "/conversations",
            get(list_conversations_handler).post(create_conversation_handler),
        )
        .route(
            "/conversations/:id",
            get(get_conversation_handler)
                .put(update_conversation_handler)
                .delete(delete_conversation_handler),
        )
        .route(
            "/conversations/:id/ratings",
            get(list_conversation_ratings_handler).post(create_conversation_rating_handler),
        )
        .route(
            "/messages/:id/ratings",
            get(list_message_ratings_handler).post(create_message_rating_handler),
        )
        .route("/ratings/stats", get(rating_stats_handler))
        .route(
            "/ratings/:id",
            get(get_rating_handler)
                .put(update_rating_handler)
                .delete(delete_rating_handler),
        );

    let prefix = state.config.http.api_prefix.trim_end_matches('/');
    let router = Router::new().route("/health", get(health_handler));
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(prefix, api)
    };

    router.fallback(not_found_handler).with_state(state)
}

/// Serve until the broadcast shutdown signal fires.
pub async fn start_http_server(
    store: Store,
    config: PromptVaultConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { store, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("PromptVault HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub session_id: String,
    pub title: Option<String>,
    pub working_directory: Option<String>,
    pub transcript_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateConversationRequest {
    #[serde(default)]
    pub title: String,
}

/// Body for both rating create and rating update. A missing `rating` reads
/// as 0 and fails the range check.
#[derive(Debug, Default, Deserialize)]
pub struct RatingRequest {
    #[serde(default)]
    pub rating: i64,
    pub comment: Option<String>,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// 200 with store stats, or 503 when the store cannot be reached.
pub async fn health_inner(store: &Store, service: &str) -> ApiReply {
    if let Err(e) = store.health().await {
        tracing::warn!(error = %e, "Health check failed");
        return ApiReply::error(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Database unhealthy: {e}"),
        );
    }

    match store.stats().await {
        Ok(stats) => ApiReply::ok(&serde_json::json!({
            "status": "healthy",
            "service": service,
            "timestamp": Utc::now(),
            "database": stats,
        })),
        Err(e) => ApiReply::error(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Database unhealthy: {e}"),
        ),
    }
}

pub async fn list_conversations_inner(store: &Store, query: &PageQuery) -> ApiReply {
    let page = Page::from_query(query);

    let records = match store.list_conversations(page.per_page, page.offset()).await {
        Ok(r) => r,
        Err(e) => return ApiReply::from_error(&e, "list conversations"),
    };
    let total = match store.count_conversations().await {
        Ok(t) => t,
        Err(e) => return ApiReply::from_error(&e, "count conversations"),
    };

    ApiReply::ok(&convert::summaries(&records)).meta(page.meta(total))
}

pub async fn get_conversation_inner(store: &Store, raw_id: &str) -> ApiReply {
    let Some(id) = parse_id(raw_id) else {
        return ApiReply::bad_request("Invalid conversation ID");
    };
    match store.get_conversation_with_messages(id).await {
        Ok(record) => ApiReply::ok(&convert::conversation_with_messages(&record)),
        Err(e) => ApiReply::from_error(&e, "get conversation"),
    }
}

pub async fn create_conversation_inner(store: &Store, req: CreateConversationRequest) -> ApiReply {
    if req.session_id.trim().is_empty() {
        return ApiReply::bad_request("session_id is required");
    }
    match store
        .create_conversation(
            &req.session_id,
            req.title.as_deref(),
            req.working_directory.as_deref(),
            req.transcript_path.as_deref(),
        )
        .await
    {
        Ok(record) => ApiReply::created(&convert::conversation(&record)),
        Err(e) => ApiReply::from_error(&e, "create conversation"),
    }
}

pub async fn update_conversation_inner(
    store: &Store,
    raw_id: &str,
    req: UpdateConversationRequest,
) -> ApiReply {
    let Some(id) = parse_id(raw_id) else {
        return ApiReply::bad_request("Invalid conversation ID");
    };
    if req.title.trim().is_empty() {
        return ApiReply::bad_request("title is required");
    }
    if let Err(e) = store.update_conversation_title(id, &req.title).await {
        return ApiReply::from_error(&e, "update conversation");
    }
    match store.get_conversation(id).await {
        Ok(record) => ApiReply::ok(&convert::conversation(&record)),
        Err(e) => ApiReply::from_error(&e, "get updated conversation"),
    }
}

pub async fn delete_conversation_inner(store: &Store, raw_id: &str) -> ApiReply {
    let Some(id) = parse_id(raw_id) else {
        return ApiReply::bad_request("Invalid conversation ID");
    };
    match store.delete_conversation(id).await {
        Ok(report) => {
            tracing::info!(
                conversation_id = id,
                messages = report.messages_deleted,
                ratings = report.ratings_deleted,
                "Deleted conversation"
            );
            ApiReply::no_content()
        }
        Err(e) => ApiReply::from_error(&e, "delete conversation"),
    }
}

pub async fn create_rating_inner(
    store: &Store,
    target: RatingTarget,
    req: RatingRequest,
) -> ApiReply {
    if let Err(e) = validate_rating(req.rating) {
        return ApiReply::from_error(&e, "create rating");
    }
    match store
        .create_rating(target, req.rating, req.comment.as_deref())
        .await
    {
        Ok(record) => ApiReply::created(&convert::rating(&record)),
        Err(e) => ApiReply::from_error(&e, "create rating"),
    }
}

pub async fn list_conversation_ratings_inner(store: &Store, raw_id: &str) -> ApiReply {
    let Some(id) = parse_id(raw_id) else {
        return ApiReply::bad_request("Invalid conversation ID");
    };
    match store.get_conversation_ratings(id).await {
        Ok(records) => ApiReply::ok(&convert::ratings(&records)),
        Err(e) => ApiReply::from_error(&e, "get ratings"),
    }
}

pub async fn list_message_ratings_inner(store: &Store, raw_id: &str) -> ApiReply {
    let Some(id) = parse_id(raw_id) else {
        return ApiReply::bad_request("Invalid message ID");
    };
    match store.get_message_ratings(id).await {
        Ok(records) => ApiReply::ok(&convert::ratings(&records)),
        Err(e) => ApiReply::from_error(&e, "get ratings"),
    }
}

pub async fn get_rating_inner(store: &Store, raw_id: &str) -> ApiReply {
    let Some(id) = parse_id(raw_id) else {
        return ApiReply::bad_request("Invalid rating ID");
    };
    match store.get_rating(id).await {
        Ok(record) => ApiReply::ok(&convert::rating(&record)),
        Err(e) => ApiReply::from_error(&e, "get rating"),
    }
}

pub async fn update_rating_inner(store: &Store, raw_id: &str, req: RatingRequest) -> ApiReply {
    let Some(id) = parse_id(raw_id) else {
        return ApiReply::bad_request("Invalid rating ID");
    };
    if let Err(e) = validate_rating(req.rating) {
        return ApiReply::from_error(&e, "update rating");
    }
    if let Err(e) = store
        .update_rating(id, req.rating, req.comment.as_deref())
        .await
    {
        return ApiReply::from_error(&e, "update rating");
    }
    match store.get_rating(id).await {
        Ok(record) => ApiReply::ok(&convert::rating(&record)),
        Err(e) => ApiReply::from_error(&e, "get updated rating"),
    }
}

pub async fn delete_rating_inner(store: &Store, raw_id: &str) -> ApiReply {
    let Some(id) = parse_id(raw_id) else {
        return ApiReply::bad_request("Invalid rating ID");
    };
    match store.delete_rating(id).await {
        Ok(()) => ApiReply::no_content(),
        Err(e) => ApiReply::from_error(&e, "delete rating"),
    }
}

pub async fn rating_stats_inner(store: &Store) -> ApiReply {
    match store.get_rating_stats().await {
        Ok(stats) => ApiReply::ok(&stats),
        Err(e) => ApiReply::from_error(&e, "get rating stats"),
    }
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> ApiReply {
    health_inner(&state.store, &state.config.service.name).await
}

pub async fn list_conversations_handler(
    State(state): State<Arc<HttpState>>,
    query: Option<Query<PageQuery>>,
) -> ApiReply {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    list_conversations_inner(&state.store, &query).await
}

pub async fn get_conversation_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> ApiReply {
    get_conversation_inner(&state.store, &id).await
}

pub async fn create_conversation_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> ApiReply {
    match body {
        Ok(Json(req)) => create_conversation_inner(&state.store, req).await,
        Err(rejection) => invalid_body(rejection),
    }
}

pub async fn update_conversation_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateConversationRequest>, JsonRejection>,
) -> ApiReply {
    match body {
        Ok(Json(req)) => update_conversation_inner(&state.store, &id, req).await,
        Err(rejection) => invalid_body(rejection),
    }
}

pub async fn delete_conversation_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> ApiReply {
    delete_conversation_inner(&state.store, &id).await
}

pub async fn create_conversation_rating_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    body: Result<Json<RatingRequest>, JsonRejection>,
) -> ApiReply {
    let Some(id) = parse_id(&id) else {
        return ApiReply::bad_request("Invalid conversation ID");
    };
    match body {
        Ok(Json(req)) => {
            create_rating_inner(&state.store, RatingTarget::Conversation(id), req).await
        }
        Err(rejection) => invalid_body(rejection),
    }
}

pub async fn list_conversation_ratings_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> ApiReply {
    list_conversation_ratings_inner(&state.store, &id).await
}

pub async fn create_message_rating_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    body: Result<Json<RatingRequest>, JsonRejection>,
) -> ApiReply {
    let Some(id) = parse_id(&id) else {
        return ApiReply::bad_request("Invalid message ID");
    };
    match body {
        Ok(Json(req)) => create_rating_inner(&state.store, RatingTarget::Message(id), req).await,
        Err(rejection) => invalid_body(rejection),
    }
}

pub async fn list_message_ratings_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> ApiReply {
    list_message_ratings_inner(&state.store, &id).await
}

pub async fn get_rating_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> ApiReply {
    get_rating_inner(&state.store, &id).await
}

pub async fn update_rating_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    body: Result<Json<RatingRequest>, JsonRejection>,
) -> ApiReply {
    match body {
        Ok(Json(req)) => update_rating_inner(&state.store, &id, req).await,
        Err(rejection) => invalid_body(rejection),
    }
}

pub async fn delete_rating_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> ApiReply {
    delete_rating_inner(&state.store, &id).await
}

pub async fn rating_stats_handler(State(state): State<Arc<HttpState>>) -> ApiReply {
    rating_stats_inner(&state.store).await
}

pub async fn not_found_handler() -> ApiReply {
    ApiReply::error(StatusCode::NOT_FOUND, "Route not found")
}

// ============================================================================
// Helpers
// ============================================================================

/// Positive integer ids only.
pub fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

fn invalid_body(rejection: JsonRejection) -> ApiReply {
    tracing::debug!(error = %rejection, "Rejected request body");
    ApiReply::bad_request("Invalid JSON request body")
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
