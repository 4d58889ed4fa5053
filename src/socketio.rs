// Transport Socket.IO (clients navigateur).
use crate::app_state::AppState;
use crate::error::DeliveryError;
use crate::events;
use crate::models::{ClientEvent, RoomRequest};
use crate::registry::Connection;
use socketioxide::extract::{Data, SocketRef};
use std::sync::Arc;
use tracing::info;

// Une socket Socket.IO vue comme une connexion du registre.
pub struct SocketConnection {
    id: String,
    socket: SocketRef,
}

impl SocketConnection {
    pub fn new(socket: SocketRef) -> Self {
        Self {
            id: socket.id.to_string(),
            socket,
        }
    }
}

impl Connection for SocketConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, event: &str, payload: &serde_json::Value) -> Result<(), DeliveryError> {
        self.socket
            .emit(event.to_string(), payload)
            .map_err(|_| DeliveryError(self.id.clone()))
    }
}

// Configure les gestionnaires du namespace racine.
pub fn setup_socketio_handlers(io: socketioxide::SocketIo, state: AppState) {
    io.ns("/", move |socket: SocketRef| {
        let state = state.clone();
        async move {
            info!("Socket.IO client connected: {}", socket.id);

            let conn: Arc<dyn Connection> = Arc::new(SocketConnection::new(socket.clone()));

            // `join {chat_id}` / `join {post_id}`
            let state_join = state.clone();
            let conn_join = conn.clone();
            socket.on("join", move |Data::<RoomRequest>(data)| {
                let state = state_join.clone();
                let conn = conn_join.clone();
                async move {
                    events::dispatch(&state.registry, &conn, ClientEvent::Join(data)).await;
                }
            });

            let state_leave = state.clone();
            let conn_leave = conn.clone();
            socket.on("leave", move |Data::<RoomRequest>(data)| {
                let state = state_leave.clone();
                let conn = conn_leave.clone();
                async move {
                    events::dispatch(&state.registry, &conn, ClientEvent::Leave(data)).await;
                }
            });

            let state_disconnect = state.clone();
            socket.on_disconnect(move |socket: SocketRef| {
                let state = state_disconnect.clone();
                async move {
                    info!("Socket.IO client disconnected: {}", socket.id);
                    state.registry.unsubscribe(&socket.id.to_string()).await;
                }
            });

            // Toute socket connectée fait partie de l'audience globale.
            // Enregistrée après les handlers : une déconnexion survenue pendant
            // l'attente du verrou est rattrapée par `register_connection`.
            events::register_connection(&state.registry, &conn, || socket.connected()).await;
        }
    });
}
