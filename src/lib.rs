pub mod app_state;
pub mod broker;
pub mod cache;
pub mod config;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod sampler;
pub mod sensor;
pub mod socketio;
pub mod websocket;

use app_state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use handlers::{
    categories_handler, clients_handler, create_chat_handler, create_comment_handler,
    create_message_handler, create_post_handler, health_check, list_chats_handler,
    list_messages_handler, list_posts_handler, post_detail_handler, temperature_handler,
};
use socketioxide::SocketIo;
use std::path::Path;
use tower_http::{cors::CorsLayer, services::ServeDir};
use websocket::ws_handler;

// Routes HTTP et WebSocket, fichiers statiques en fallback.
pub fn build_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/api/posts", get(list_posts_handler).post(create_post_handler))
        .route("/api/posts/{id}", get(post_detail_handler))
        .route("/api/posts/{id}/comments", post(create_comment_handler))
        .route("/api/categories", get(categories_handler))
        .route("/api/chats", get(list_chats_handler).post(create_chat_handler))
        .route(
            "/api/chats/{id}/messages",
            get(list_messages_handler).post(create_message_handler),
        )
        .route("/api/temperature", get(temperature_handler))
        .route("/api/clients", get(clients_handler))
        .route("/health", get(health_check))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
}

// Application complète : le routeur plus la couche Socket.IO.
pub fn build_app(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let (io_layer, io) = SocketIo::new_layer();
    socketio::setup_socketio_handlers(io, state.clone());

    build_router(state, static_dir).layer(io_layer)
}
