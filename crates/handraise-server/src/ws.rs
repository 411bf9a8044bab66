//! HTTP and WebSocket transport.
//!
//! Two surfaces over one hub: `POST /rooms` for collaborating services that
//! create and own rooms, and `GET /ws?identity=...` for clients. Each socket
//! gets a session bound to its identity at upgrade time; frames are JSON
//! [`ClientMessage`] in and JSON [`ServerMessage`] out.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use futures_util::{SinkExt, StreamExt};
use handraise_proto::{Ack, ClientMessage, ErrorKind, Room, ServerMessage};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{env::Environment, error::HubError, hub::Hub, store::QuestionStore};

/// Build the router exposing the hub.
pub fn router<E: Environment, S: QuestionStore>(hub: Arc<Hub<E, S>>) -> Router {
    Router::new()
        .route("/rooms", post(create_room::<E, S>))
        .route("/ws", get(ws_handler::<E, S>))
        .with_state(hub)
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &HubError) -> (StatusCode, Json<serde_json::Value>) {
    (
        status_for(err.kind),
        Json(serde_json::json!({ "kind": err.kind, "reason": err.reason })),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomBody {
    room_id: String,
    topic: String,
    creator_identity: String,
}

async fn create_room<E: Environment, S: QuestionStore>(
    State(hub): State<Arc<Hub<E, S>>>,
    Json(body): Json<CreateRoomBody>,
) -> Result<(StatusCode, Json<Room>), (StatusCode, Json<serde_json::Value>)> {
    match hub.create_room(&body.room_id, &body.topic, &body.creator_identity) {
        Ok(room) => Ok((StatusCode::CREATED, Json(room))),
        Err(err) => Err(error_response(&err)),
    }
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    /// The identity every command on this socket acts as.
    identity: String,
}

async fn ws_handler<E: Environment, S: QuestionStore>(
    State(hub): State<Arc<Hub<E, S>>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if query.identity.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "identity must not be empty").into_response();
    }

    let identity = query.identity.trim().to_string();
    ws.on_upgrade(move |socket| serve_connection(hub, identity, socket))
}

/// Drive one connection: register a session, pump its outbox to the socket,
/// and feed inbound frames through the hub until either side closes.
async fn serve_connection<E: Environment, S: QuestionStore>(
    hub: Arc<Hub<E, S>>,
    identity: String,
    socket: WebSocket,
) {
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let session_id = match hub.connect(identity, outbox_tx.clone()) {
        Ok(session_id) => session_id,
        Err(err) => {
            tracing::warn!(%err, "connection refused");
            return;
        },
    };

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox_rx.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = stream.next().await {
        let Message::Text(text) = frame else {
            continue;
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => {
                let ack = hub.handle(session_id, message.command).await;
                let _ = outbox_tx.send(ServerMessage::Ack { seq: message.seq, ack });
            },
            Err(err) => {
                // Unparseable frames get an uncorrelated error ack; the
                // connection stays up.
                let ack = Ack::error(ErrorKind::InvalidInput, format!("malformed command: {err}"));
                let _ = outbox_tx.send(ServerMessage::Ack { seq: None, ack });
            },
        }
    }

    hub.disconnect(session_id);
    drop(outbox_tx);
    writer.abort();
    tracing::debug!(session_id, "connection closed");
}
