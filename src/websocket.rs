// Transport WebSocket brut : trames JSON `{"event": ...}` en entrée,
// `{"event": ..., "data": ...}` en sortie.
use crate::app_state::AppState;
use crate::events;
use crate::models::ClientEvent;
use crate::registry::{ChannelConnection, Connection};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let sid = Uuid::new_v4().to_string();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (conn, mut outbound_rx) = ChannelConnection::new(sid.clone());
    let conn: Arc<dyn Connection> = conn;
    state.registry.connect(conn.clone()).await;
    info!("WebSocket client connected: {}", sid);

    // Tâche d'envoi : vide la file de la connexion dans l'ordre de publication.
    let send_task = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Événement non sérialisable: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(_) => break,
        };

        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => events::dispatch(&state.registry, &conn, event).await,
                Err(e) => debug!("Trame ignorée de {}: {}", sid, e),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!("WebSocket client disconnecting: {}", sid);
    state.registry.unsubscribe(&sid).await;
    send_task.abort();
}
