// Le `Broker` coordonne les publications : validation, écriture durable, puis diffusion.
// Une diffusion n'est jamais émise avant que l'écriture correspondante soit committée.
use crate::database::Store;
use crate::dispatcher::Dispatcher;
use crate::error::PublishError;
use crate::models::{
    Chat, ChatMessage, Comment, NewChat, NewChatMessage, NewComment, NewPost, Post,
    STATUS_APPROVED,
};
use crate::registry::{chat_room, post_room, GLOBAL_TOPIC};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const EVENT_NEW_POST: &str = "new_post";
pub const EVENT_NEW_MESSAGE: &str = "new_message";
pub const EVENT_NEW_COMMENT: &str = "new_comment";

pub struct Broker {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
}

impl Broker {
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // Nouveau post, diffusé à tous les clients connectés.
    pub async fn publish_post(&self, req: NewPost) -> Result<Post, PublishError> {
        let content = required(req.content, "content is required")?;
        let kiosk_id = or_default(req.kiosk_id, "unknown");
        let category = or_default(req.category, "uncategorized");
        let timestamp = now_iso();

        let id = self
            .store
            .insert_post(&kiosk_id, &category, &content, &timestamp, STATUS_APPROVED)
            .await
            .inspect_err(|e| error!("Échec de l'enregistrement du post: {}", e))?;

        let post = Post {
            id,
            kiosk_id,
            category,
            content,
            timestamp,
            status: STATUS_APPROVED.to_string(),
        };

        info!("Post {} published by kiosk {}", post.id, post.kiosk_id);
        self.broadcast(GLOBAL_TOPIC, EVENT_NEW_POST, &post).await;
        Ok(post)
    }

    // Nouveau message, diffusé dans la salle `chat_<id>`.
    pub async fn publish_message(
        &self,
        chat_id: i64,
        req: NewChatMessage,
    ) -> Result<ChatMessage, PublishError> {
        let (user, text) = match (non_empty(req.user), non_empty(req.text)) {
            (Some(user), Some(text)) => (user, text),
            _ => {
                return Err(PublishError::Validation(
                    "Both user and text are required".to_string(),
                ))
            }
        };
        let ts = now_iso();

        let id = self
            .store
            .insert_message(chat_id, &user, &text, &ts)
            .await
            .inspect_err(|e| warn!("Message refusé pour le chat {}: {}", chat_id, e))?;

        let message = ChatMessage {
            id,
            chat_id,
            user,
            text,
            ts,
        };

        let room = chat_room(chat_id);
        info!("Message {} published to {}", message.id, room);
        self.broadcast(&room, EVENT_NEW_MESSAGE, &message).await;
        Ok(message)
    }

    // Nouveau commentaire, diffusé dans la salle `post_<id>`.
    pub async fn publish_comment(
        &self,
        post_id: i64,
        req: NewComment,
    ) -> Result<Comment, PublishError> {
        let comment = required(req.comment, "comment is required")?;
        let user = or_default(req.user, "Anonymous");
        let timestamp = now_iso();

        let id = self
            .store
            .insert_comment(post_id, &user, &comment, &timestamp)
            .await
            .inspect_err(|e| warn!("Commentaire refusé pour le post {}: {}", post_id, e))?;

        let comment = Comment {
            id,
            post_id,
            user,
            comment,
            timestamp,
        };

        let room = post_room(post_id);
        info!("Comment {} published to {}", comment.id, room);
        self.broadcast(&room, EVENT_NEW_COMMENT, &comment).await;
        Ok(comment)
    }

    // Les chats ne sont pas diffusés : les clients rechargent la liste.
    pub async fn create_chat(&self, req: NewChat) -> Result<Chat, PublishError> {
        let name = required(req.name, "Chat name required")?;
        let id = self.store.insert_chat(&name).await?;
        info!("Chat {} created: {}", id, name);
        Ok(Chat { id, name })
    }

    async fn broadcast<T: Serialize>(&self, topic: &str, event: &str, record: &T) {
        match serde_json::to_value(record) {
            Ok(payload) => {
                self.dispatcher.publish(topic, event, &payload).await;
            }
            Err(e) => error!("Impossible de sérialiser l'événement {}: {}", event, e),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, message: &str) -> Result<String, PublishError> {
    non_empty(value).ok_or_else(|| PublishError::Validation(message.to_string()))
}

fn or_default(value: Option<String>, default: &str) -> String {
    non_empty(value).unwrap_or_else(|| default.to_string())
}

// Horodatage UTC ISO 8601, sans fuseau, à la microseconde.
fn now_iso() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
