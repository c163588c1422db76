//! WebSocket transport: upgrade, per-connection read/write loops, cleanup.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use hive_auth::{AuthError, TokenSigner};
use hive_core::Identity;

use crate::connection::{ClientHandle, ClientId};
use crate::methods::Caller;
use crate::rpc::{RpcRequest, RpcResponse};
use crate::server::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket upgrade handler.
///
/// An `Authorization` header that is present but does not verify rejects
/// the connection before the upgrade; an absent header leaves the
/// connection anonymous, and methods may still authenticate per call with
/// a body token.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let identity = match bearer_identity(&headers, &state.ctx.signer) {
        Ok(identity) => identity,
        Err(error) => {
            info!(%error, "rejected upgrade carrying an invalid bearer token");
            return (StatusCode::UNAUTHORIZED, "invalid bearer token").into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Identity from `Authorization: Bearer <token>`, when the header exists.
fn bearer_identity(
    headers: &HeaderMap,
    signer: &TokenSigner,
) -> Result<Option<Identity>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidToken("authorization header is not UTF-8".into()))?;
    let token = raw.strip_prefix("Bearer ").ok_or_else(|| {
        AuthError::InvalidToken("authorization header is not a bearer credential".into())
    })?;
    signer.verify(token).map(Some)
}

/// Drive one accepted connection until either side ends it.
async fn handle_socket(socket: WebSocket, state: AppState, identity: Option<Identity>) {
    let client_id = ClientId::new();
    let (tx, mut rx) = mpsc::channel::<Arc<String>>(state.config.max_send_queue);
    let handle = ClientHandle::new(tx);
    state.clients.register(client_id.clone(), handle.clone());
    info!(
        client_id = %client_id,
        authenticated = identity.is_some(),
        "websocket client connected"
    );

    let caller = Caller {
        client_id: client_id.clone(),
        handle: handle.clone(),
        identity,
    };

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: forward queued frames to the socket, ping on an interval.
    let writer_cid = client_id.clone();
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if ws_tx.send(WsMessage::Text(frame.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    trace!(client_id = %writer_cid, "sent ping");
                }
            }
        }
    });

    // Reader: parse request frames and dispatch them in arrival order.
    let reader_state = state.clone();
    let reader = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_rx.next().await {
            match message {
                WsMessage::Text(text) => {
                    process_frame(text.as_str(), &caller, &reader_state).await;
                }
                WsMessage::Binary(bytes) => match std::str::from_utf8(&bytes) {
                    Ok(text) => process_frame(text, &caller, &reader_state).await,
                    Err(_) => respond(
                        &caller.handle,
                        &RpcResponse::parse_error("Binary frame is not UTF-8"),
                    ),
                },
                WsMessage::Close(_) => break,
                // axum answers pings itself; pongs need no bookkeeping
                WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    // Runs exactly once per connection, whichever side ended it.
    let sessions_closed = state.ctx.sessions.close_for_client(&client_id);
    state.clients.unregister(&client_id);
    info!(
        client_id = %client_id,
        sessions_closed,
        dropped_frames = handle.drop_count(),
        "websocket client disconnected"
    );
}

async fn process_frame(raw: &str, caller: &Caller, state: &AppState) {
    let request: RpcRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(error) => {
            debug!(%error, "unparseable request frame");
            respond(
                &caller.handle,
                &RpcResponse::parse_error(format!("Invalid request: {error}")),
            );
            return;
        }
    };

    if let Some(response) = state.registry.dispatch(request, caller, &state.ctx).await {
        respond(&caller.handle, &response);
    }
}

fn respond(handle: &ClientHandle, response: &RpcResponse) {
    if !handle.send_json(response) {
        warn!("response frame dropped");
    }
}
