use serde::{Deserialize, Serialize};

// Statut par défaut d'un post : aucun workflow de modération n'existe.
pub const STATUS_APPROVED: &str = "approved";

// --- Enregistrements (vues renvoyées aux clients et diffusées) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub kiosk_id: String,
    pub category: String,
    pub content: String,
    pub timestamp: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user: String,
    pub comment: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chat {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: i64,
    pub user: String,
    pub text: String,
    pub ts: String,
}

// --- Corps des requêtes de publication ---
// Tous les champs sont optionnels ici, la validation est faite par le `Broker`.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPost {
    pub kiosk_id: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewComment {
    pub user: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewChat {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewChatMessage {
    pub user: Option<String>,
    pub text: Option<String>,
}

// --- Vues HTTP ---

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub id: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

// --- Événements temps réel ---

// Trame sortante du transport WebSocket : `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub event: String,
    pub data: serde_json::Value,
}

// Événements envoyés par les clients, quel que soit le transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    Join(RoomRequest),
    Leave(RoomRequest),
}

// Les navigateurs envoient l'id tel qu'il est dans le DOM, souvent une chaîne.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomRequest {
    #[serde(default)]
    pub chat_id: Option<serde_json::Value>,
    #[serde(default)]
    pub post_id: Option<serde_json::Value>,
}
