use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use waymark_shared::{ClientMessage, ServerMessage};

use crate::logic::{apply_client_message, Outgoing, Route};
use crate::state::{AppState, ConnId, Peer, World};

pub async fn ping_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn root_handler(
    axum::Extension(index_file): axum::Extension<std::path::PathBuf>,
) -> impl IntoResponse {
    match tokio::fs::read_to_string(index_file).await {
        Ok(contents) => Html(contents).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let connection_id: ConnId = Uuid::new_v4();

    {
        let mut world = state.world.write().await;
        world.peers.insert(
            connection_id,
            Peer {
                tx,
                user: None,
                subscriptions: std::collections::HashSet::new(),
            },
        );
        eprintln!(
            "WS connected conn={connection_id} peers={}",
            world.peers.len()
        );
    }

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Ok(payload) =
                bincode::serde::encode_to_vec(&message, bincode::config::standard())
            {
                if socket_sender.send(Message::Binary(payload)).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut close_frame = None;

    while let Some(Ok(message)) = socket_receiver.next().await {
        let client_message = match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(parsed) => parsed,
                Err(error) => {
                    eprintln!("WS text parse error conn={connection_id} error={error}");
                    continue;
                }
            },
            Message::Binary(data) => {
                match bincode::serde::decode_from_slice::<ClientMessage, _>(
                    &data,
                    bincode::config::standard(),
                ) {
                    Ok((parsed, _)) => parsed,
                    Err(error) => {
                        eprintln!("WS binary parse error conn={connection_id} error={error}");
                        continue;
                    }
                }
            }
            Message::Close(frame) => {
                close_frame = frame;
                break;
            }
            _ => continue,
        };

        let outgoings = {
            let mut world = state.world.write().await;
            apply_client_message(&mut world, connection_id, client_message, now_ms())
        };
        deliver(&state.world, connection_id, outgoings).await;
    }

    let should_save = {
        let mut world = state.world.write().await;
        world.peers.remove(&connection_id);
        eprintln!(
            "WS disconnected conn={connection_id} peers={}",
            world.peers.len()
        );
        if let Some(frame) = &close_frame {
            eprintln!(
                "WS close frame conn={connection_id} code={:?} reason={:?}",
                frame.code, frame.reason
            );
        }
        if world.peers.is_empty() && world.dirty {
            world.dirty = false;
            Some(world.to_file_data())
        } else {
            None
        }
    };
    send_task.abort();

    if let Some(data) = should_save {
        eprint!("Saving world after last disconnect... ");
        state.storage.save_world(&data).await;
        eprintln!("done.");
    }
}

async fn deliver(world: &Arc<RwLock<World>>, sender: ConnId, outgoings: Vec<Outgoing>) {
    if outgoings.is_empty() {
        return;
    }
    let mut stale = Vec::new();
    {
        let world = world.read().await;
        for outgoing in outgoings {
            match outgoing.route {
                Route::Sender => {
                    if let Some(peer) = world.peers.get(&sender) {
                        if peer.tx.send(outgoing.message).is_err() {
                            stale.push(sender);
                        }
                    }
                }
                Route::All => {
                    for (id, peer) in world.peers.iter() {
                        if peer.tx.send(outgoing.message.clone()).is_err() {
                            stale.push(*id);
                        }
                    }
                }
                Route::Subscribers(collection) => {
                    for (id, peer) in world.peers.iter() {
                        if !peer.subscriptions.contains(&collection) {
                            continue;
                        }
                        if peer.tx.send(outgoing.message.clone()).is_err() {
                            stale.push(*id);
                        }
                    }
                }
            }
        }
    }

    if !stale.is_empty() {
        let mut world = world.write().await;
        for id in stale {
            world.peers.remove(&id);
        }
    }
}
