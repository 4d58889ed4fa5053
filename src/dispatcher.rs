// Diffusion best-effort des événements vers les connexions abonnées.
use crate::registry::{Connection, TopicRegistry, GLOBAL_TOPIC};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<TopicRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<TopicRegistry>) -> Self {
        Self { registry }
    }

    // Envoie `payload` à chaque abonné actuel de `topic`.
    // Retourne le nombre de livraisons réussies, jamais d'erreur.
    pub async fn publish(&self, topic: &str, event: &str, payload: &serde_json::Value) -> usize {
        if topic == GLOBAL_TOPIC {
            return self.publish_global(event, payload).await;
        }
        let subscribers = self.registry.subscribers_of(topic).await;
        deliver(&subscribers, event, payload)
    }

    // Envoie `payload` à tous les clients connectés, quel que soit leur topic.
    pub async fn publish_global(&self, event: &str, payload: &serde_json::Value) -> usize {
        let connections = self.registry.connections().await;
        deliver(&connections, event, payload)
    }
}

// Le verrou du registre est déjà relâché ici : on itère sur une copie.
// Un échec sur une connexion n'interrompt pas la livraison aux autres.
fn deliver(targets: &[Arc<dyn Connection>], event: &str, payload: &serde_json::Value) -> usize {
    let mut delivered = 0;
    for conn in targets {
        match conn.send(event, payload) {
            Ok(()) => delivered += 1,
            Err(e) => debug!("Livraison de {} abandonnée: {}", event, e),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ChannelConnection;
    use serde_json::json;

    #[tokio::test]
    async fn publish_reaches_only_topic_subscribers() {
        let registry = Arc::new(TopicRegistry::new());
        let (a, mut ra) = ChannelConnection::new("a");
        let (b, mut rb) = ChannelConnection::new("b");
        registry.subscribe("chat_1", a).await;
        registry.subscribe("chat_2", b).await;

        let dispatcher = Dispatcher::new(registry);
        let delivered = dispatcher
            .publish("chat_1", "new_message", &json!({"text": "hi"}))
            .await;

        assert_eq!(delivered, 1);
        let event = ra.try_recv().unwrap();
        assert_eq!(event.event, "new_message");
        assert_eq!(event.data["text"], "hi");
        assert!(rb.try_recv().is_err());
    }

    #[tokio::test]
    async fn global_reaches_every_connection() {
        let registry = Arc::new(TopicRegistry::new());
        let (a, mut ra) = ChannelConnection::new("a");
        let (b, mut rb) = ChannelConnection::new("b");
        registry.connect(a).await;
        registry.subscribe("chat_9", b).await;

        let dispatcher = Dispatcher::new(registry);
        assert_eq!(dispatcher.publish_global("new_post", &json!({"id": 1})).await, 2);
        assert_eq!(dispatcher.publish(GLOBAL_TOPIC, "new_post", &json!({"id": 2})).await, 2);

        assert_eq!(ra.try_recv().unwrap().data["id"], 1);
        assert_eq!(ra.try_recv().unwrap().data["id"], 2);
        assert_eq!(rb.try_recv().unwrap().data["id"], 1);
    }

    #[tokio::test]
    async fn dead_subscriber_does_not_block_others() {
        let registry = Arc::new(TopicRegistry::new());
        let (gone, gone_rx) = ChannelConnection::new("gone");
        let (alive, mut alive_rx) = ChannelConnection::new("alive");
        registry.subscribe("chat_1", gone).await;
        registry.subscribe("chat_1", alive).await;
        drop(gone_rx);

        let dispatcher = Dispatcher::new(registry);
        let delivered = dispatcher.publish("chat_1", "new_message", &json!({})).await;

        assert_eq!(delivered, 1);
        assert!(alive_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn order_is_preserved_per_subscriber() {
        let registry = Arc::new(TopicRegistry::new());
        let (a, mut ra) = ChannelConnection::new("a");
        registry.subscribe("chat_1", a).await;

        let dispatcher = Dispatcher::new(registry);
        for i in 0..100 {
            dispatcher.publish("chat_1", "new_message", &json!({"n": i})).await;
        }

        for i in 0..100 {
            assert_eq!(ra.try_recv().unwrap().data["n"], i);
        }
    }

    #[tokio::test]
    async fn empty_topic_delivers_nothing() {
        let dispatcher = Dispatcher::new(Arc::new(TopicRegistry::new()));
        assert_eq!(dispatcher.publish("chat_404", "new_message", &json!({})).await, 0);
    }
}
