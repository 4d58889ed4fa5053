// Handlers HTTP. Les écritures passent toutes par le `Broker`.
use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::{
    Chat, ChatMessage, ClientInfo, Comment, HealthStatus, NewChat, NewChatMessage, NewComment,
    NewPost, Post, PostDetail, TemperatureReading, STATUS_APPROVED,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::error;

type ApiResult<T> = Result<T, ApiError>;

// Corps JSON tolérant : un corps absent ou invalide est traité comme un objet vide,
// la validation du `Broker` produit alors le message d'erreur adéquat.
fn body_or_default<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

// GET /api/posts : tous les posts, du plus récent au plus ancien.
pub async fn list_posts_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<Post>>> {
    Ok(Json(state.store().list_posts().await?))
}

// POST /api/posts
pub async fn create_post_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let post = state.broker.publish_post(body_or_default(&body)).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

// GET /api/posts/{id} : post approuvé et ses commentaires.
pub async fn post_detail_handler(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<PostDetail>> {
    let post = state
        .store()
        .get_post(post_id)
        .await?
        .filter(|p| p.status == STATUS_APPROVED)
        .ok_or_else(|| ApiError::not_found("post not found"))?;
    let comments = state.store().list_comments(post_id).await?;
    Ok(Json(PostDetail { post, comments }))
}

// POST /api/posts/{id}/comments
pub async fn create_comment_handler(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .broker
        .publish_comment(post_id, body_or_default(&body))
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

// GET /api/categories : catégories des posts approuvés.
pub async fn categories_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.store().categories().await?))
}

// GET /api/chats
pub async fn list_chats_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<Chat>>> {
    Ok(Json(state.store().list_chats().await?))
}

// POST /api/chats
pub async fn create_chat_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Chat>)> {
    let chat = state.broker.create_chat(body_or_default(&body)).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

// GET /api/chats/{id}/messages
pub async fn list_messages_handler(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    Ok(Json(state.store().list_messages(chat_id).await?))
}

// POST /api/chats/{id}/messages
pub async fn create_message_handler(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
    let message = state
        .broker
        .publish_message(chat_id, body_or_default(&body))
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

// GET /api/temperature : lit uniquement le cache, jamais le capteur.
pub async fn temperature_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<TemperatureReading>) {
    match state.temperature.get().await {
        Some(t) => (
            StatusCode::OK,
            Json(TemperatureReading {
                temperature: Some(t),
            }),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(TemperatureReading { temperature: None }),
        ),
    }
}

// GET /api/clients : connexions temps réel et leurs salles.
pub async fn clients_handler(State(state): State<AppState>) -> Json<Vec<ClientInfo>> {
    Json(state.registry.clients().await)
}

// GET /health
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, StatusCode> {
    match state.store().ping().await {
        Ok(()) => Ok(Json(HealthStatus {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        })),
        Err(e) => {
            error!("Health check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
