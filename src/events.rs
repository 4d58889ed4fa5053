// Table de dispatch des événements clients, partagée par les deux transports.
use crate::models::{ClientEvent, RoomRequest};
use crate::registry::{chat_room, post_room, Connection, TopicRegistry};
use std::sync::Arc;
use tracing::{info, warn};

impl RoomRequest {
    // `chat_id` prime sur `post_id`. Accepte un nombre ou une chaîne non vide.
    pub fn room(&self) -> Option<String> {
        if let Some(id) = self.chat_id.as_ref().and_then(room_id) {
            return Some(chat_room(id));
        }
        self.post_id.as_ref().and_then(room_id).map(post_room)
    }
}

fn room_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

// Enregistre une connexion qui vient de s'ouvrir, puis vérifie qu'elle l'est toujours.
// Si le transport l'a fermée entre-temps, le handler de déconnexion a pu passer
// avant nous : on la retire pour ne pas laisser de connexion fantôme.
pub async fn register_connection<F>(
    registry: &TopicRegistry,
    conn: &Arc<dyn Connection>,
    is_open: F,
) -> bool
where
    F: Fn() -> bool,
{
    registry.connect(conn.clone()).await;
    if is_open() {
        return true;
    }
    info!("{} closed during registration", conn.id());
    registry.unsubscribe(conn.id()).await;
    false
}

pub async fn dispatch(registry: &TopicRegistry, conn: &Arc<dyn Connection>, event: ClientEvent) {
    match event {
        ClientEvent::Join(req) => on_join(registry, conn, req).await,
        ClientEvent::Leave(req) => on_leave(registry, conn, req).await,
    }
}

async fn on_join(registry: &TopicRegistry, conn: &Arc<dyn Connection>, req: RoomRequest) {
    match req.room() {
        Some(room) => {
            info!("{} joined {}", conn.id(), room);
            registry.subscribe(&room, conn.clone()).await;
        }
        None => warn!("join from {} without a chat_id or post_id", conn.id()),
    }
}

async fn on_leave(registry: &TopicRegistry, conn: &Arc<dyn Connection>, req: RoomRequest) {
    match req.room() {
        Some(room) => {
            info!("{} left {}", conn.id(), room);
            registry.leave(&room, conn.id()).await;
        }
        None => warn!("leave from {} without a chat_id or post_id", conn.id()),
    }
}
