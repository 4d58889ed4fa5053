use futures_util::{SinkExt, StreamExt};
use kiosk_board::{
    app_state::AppState, build_router, cache::SampledValueCache, database::SqliteStore,
    models::{NewChat, NewChatMessage},
    registry::chat_room,
};
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, time};
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn start_server() -> (SocketAddr, AppState) {
    let store = Arc::new(SqliteStore::open(":memory:").await.unwrap());
    let state = AppState::new(store, SampledValueCache::new());
    let app = build_router(state.clone(), "static-does-not-exist");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

// La connexion est traitée par une tâche serveur distincte du test :
// on attend que le registre reflète l'état voulu.
async fn wait_for_subscriber(state: &AppState, topic: &str) {
    time::timeout(Duration::from_secs(5), async {
        while state.registry.subscribers_of(topic).await.is_empty() {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("no subscriber registered in time");
}

async fn wait_for_no_clients(state: &AppState) {
    time::timeout(Duration::from_secs(5), async {
        while !state.registry.clients().await.is_empty() {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection still registered after close");
}

#[tokio::test]
async fn ws_client_joins_room_receives_message_and_is_cleaned_up() {
    let (addr, state) = start_server().await;

    let chat = state
        .broker
        .create_chat(NewChat {
            name: Some("lobby".to_string()),
        })
        .await
        .unwrap();
    let chat_id = chat.id;

    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let (mut write, mut read) = ws.split();

    write
        .send(Message::Text(
            json!({ "event": "join", "chat_id": chat_id }).to_string().into(),
        ))
        .await
        .unwrap();

    let room = chat_room(chat_id);
    wait_for_subscriber(&state, &room).await;

    let stored = state
        .broker
        .publish_message(
            chat_id,
            NewChatMessage {
                user: Some("ann".to_string()),
                text: Some("hello".to_string()),
            },
        )
        .await
        .unwrap();

    let frame = time::timeout(Duration::from_secs(5), read.next())
        .await
        .expect("timed out waiting for new_message")
        .unwrap()
        .unwrap();
    let event: Value = serde_json::from_str(&frame.into_text().unwrap()).unwrap();
    assert_eq!(event["event"], "new_message");
    assert_eq!(event["data"]["text"], "hello");
    assert_eq!(event["data"]["id"], stored.id);

    write.send(Message::Close(None)).await.unwrap();

    wait_for_no_clients(&state).await;
    assert!(state.registry.subscribers_of(&room).await.is_empty());
}

#[tokio::test]
async fn ws_unknown_event_keeps_connection_open() {
    let (addr, state) = start_server().await;

    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let (mut write, _read) = ws.split();

    write
        .send(Message::Text(json!({ "event": "explode" }).to_string().into()))
        .await
        .unwrap();
    write
        .send(Message::Text(json!({ "event": "join", "post_id": 4 }).to_string().into()))
        .await
        .unwrap();

    wait_for_subscriber(&state, "post_4").await;
    assert_eq!(state.registry.clients().await.len(), 1);
}
