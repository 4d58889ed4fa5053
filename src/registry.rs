// Registre des connexions vivantes et de leurs abonnements par topic (salle).
use crate::error::DeliveryError;
use crate::models::{ClientInfo, OutboundEvent};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::{mpsc, RwLock};

// Topic implicite regroupant tous les clients connectés.
pub const GLOBAL_TOPIC: &str = "global";

pub fn chat_room(chat_id: impl std::fmt::Display) -> String {
    format!("chat_{}", chat_id)
}

pub fn post_room(post_id: impl std::fmt::Display) -> String {
    format!("post_{}", post_id)
}

// Un canal capable de recevoir des événements sérialisés.
// Appartient à la couche transport, le registre n'en garde qu'une référence.
pub trait Connection: Send + Sync {
    fn id(&self) -> &str;

    // Ne bloque pas : les événements sont mis en file dans l'ordre d'appel.
    fn send(&self, event: &str, payload: &serde_json::Value) -> Result<(), DeliveryError>;
}

// Connexion adossée à un canal mpsc : la tâche d'envoi du transport (ou un test)
// consomme les événements dans l'ordre où ils ont été publiés.
pub struct ChannelConnection {
    id: String,
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl ChannelConnection {
    pub fn new(id: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { id: id.into(), tx }), rx)
    }
}

impl Connection for ChannelConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, event: &str, payload: &serde_json::Value) -> Result<(), DeliveryError> {
        self.tx
            .send(OutboundEvent {
                event: event.to_string(),
                data: payload.clone(),
            })
            .map_err(|_| DeliveryError(self.id.clone()))
    }
}

#[derive(Default)]
struct Registry {
    // id -> connexion vivante
    connections: HashMap<String, Arc<dyn Connection>>,
    // topic -> ids abonnés
    topics: HashMap<String, HashSet<String>>,
}

impl Registry {
    fn topics_of(&self, id: &str) -> Vec<String> {
        let mut topics: Vec<String> = self
            .topics
            .iter()
            .filter(|(_, members)| members.contains(id))
            .map(|(topic, _)| topic.clone())
            .collect();
        topics.sort();
        topics
    }
}

// Toutes les mutations passent par le verrou en écriture, une diffusion
// ne peut donc jamais observer le registre en cours de modification.
#[derive(Default)]
pub struct TopicRegistry {
    inner: RwLock<Registry>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Enregistre une connexion dans l'audience globale.
    pub async fn connect(&self, conn: Arc<dyn Connection>) {
        let mut reg = self.inner.write().await;
        reg.connections.insert(conn.id().to_string(), conn);
    }

    // Idempotent. Le topic est créé au premier abonnement.
    pub async fn subscribe(&self, topic: &str, conn: Arc<dyn Connection>) {
        let id = conn.id().to_string();
        let mut reg = self.inner.write().await;
        reg.connections.entry(id.clone()).or_insert(conn);
        reg.topics.entry(topic.to_string()).or_default().insert(id);
    }

    // Retire la connexion d'un seul topic.
    pub async fn leave(&self, topic: &str, id: &str) {
        let mut reg = self.inner.write().await;
        if let Some(members) = reg.topics.get_mut(topic) {
            members.remove(id);
            if members.is_empty() {
                reg.topics.remove(topic);
            }
        }
    }

    // Appelé à la déconnexion : retire la connexion de tous les topics.
    // Les topics devenus vides sont supprimés au passage.
    pub async fn unsubscribe(&self, id: &str) {
        let mut reg = self.inner.write().await;
        reg.connections.remove(id);
        reg.topics.retain(|_, members| {
            members.remove(id);
            !members.is_empty()
        });
    }

    // Copie des abonnés, sûre à parcourir pendant que le registre évolue.
    pub async fn subscribers_of(&self, topic: &str) -> Vec<Arc<dyn Connection>> {
        let reg = self.inner.read().await;
        match reg.topics.get(topic) {
            Some(members) => members
                .iter()
                .filter_map(|id| reg.connections.get(id).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    pub async fn connections(&self) -> Vec<Arc<dyn Connection>> {
        let reg = self.inner.read().await;
        reg.connections.values().cloned().collect()
    }

    // Vue des clients connectés pour `/api/clients`.
    pub async fn clients(&self) -> Vec<ClientInfo> {
        let reg = self.inner.read().await;
        let mut clients = Vec::with_capacity(reg.connections.len());

        for id in reg.connections.keys() {
            clients.push(ClientInfo {
                id: id.clone(),
                topics: reg.topics_of(id),
            });
        }

        clients.sort_by(|a, b| a.id.cmp(&b.id));
        clients
    }
}
