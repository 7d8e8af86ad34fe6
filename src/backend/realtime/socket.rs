//! WebSocket endpoint feeding hub messages to clients.
//!
//! `GET /ws?token=<jwt>` upgrades the connection and registers it with the
//! hub, tagged with the token's user when the token passes session
//! validation and anonymous otherwise. The socket is push-only: a writer task
//! drains the connection's outbound queue, and the reader loop only watches
//! for the client going away. Either side ending tears the whole connection
//! down and unregisters it.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use super::hub::HubHandle;
use crate::backend::auth::sessions::SessionService;

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(hub): State<HubHandle>,
    State(sessions): State<SessionService>,
    Query(query): Query<WsQuery>,
) -> Response {
    let user = match query.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => match sessions.validate_token(token).await {
            Ok(user) => Some(user.id),
            Err(err) => {
                tracing::debug!("[Hub] WebSocket token rejected, connecting anonymously: {}", err);
                None
            }
        },
        None => None,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, hub, user))
}

/// Run one connection until either side closes it
pub async fn handle_socket(socket: WebSocket, hub: HubHandle, user: Option<Uuid>) {
    let client = match hub.register(user).await {
        Ok(client) => client,
        Err(err) => {
            tracing::error!("[Hub] Cannot register WebSocket: {}", err);
            return;
        }
    };
    let id = client.id;
    let mut outbound = client.outbound;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if ws_sender.send(Message::Text(text.to_string().into())).await.is_err() {
                return;
            }
        }
        // dropped by the hub: unregistered or pruned
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!("[Hub] Read error on {}: {}", id, err);
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    if let Err(err) = hub.unregister(id).await {
        tracing::debug!("[Hub] Unregister of {} skipped: {}", id, err);
    }
    writer.abort();
}
