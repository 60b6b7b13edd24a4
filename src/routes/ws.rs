//! WebSocket handler: bidirectional frame relay for one mirror.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID, joins the mirror named in the path and
//! enters a `select!` loop:
//! - Incoming client frames → parse + apply to the mirror
//! - Broadcast frames from the mirror → forward to client
//!
//! Accepted writes are broadcast to every client of the mirror, the sender
//! included; clients filter their own echoes by session id. Only failures
//! are replied to the sender directly.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. Send the mirror snapshot (mode, scoreboard, live charges)
//! 3. Client frames → `services::mirror::handle_frame` → broadcast
//! 4. Close → part the mirror

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use frames::{Data, FRAME_CODE, FRAME_MESSAGE, Frame, Status, now_ms, syscall};
use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services;
use crate::state::AppState;

/// Per-connection outbound queue depth.
const CLIENT_CHANNEL_CAPACITY: usize = 256;

/// Longest accepted mirror name.
const MAX_MIRROR_NAME_LEN: usize = 64;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, Path(mirror): Path<String>, ws: WebSocketUpgrade) -> Response {
    if !is_valid_mirror_name(&mirror) {
        return (StatusCode::BAD_REQUEST, "invalid mirror name").into_response();
    }
    ws.on_upgrade(move |socket| run_ws(socket, state, mirror))
}

/// Mirror names are 1..=64 ASCII alphanumerics, `-` or `_`.
pub(crate) fn is_valid_mirror_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_MIRROR_NAME_LEN
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, mirror: String) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for receiving broadcast frames from the mirror.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(CLIENT_CHANNEL_CAPACITY);

    let welcome = Frame::request(syscall::SESSION_CONNECTED, Data::new()).with_data("client_id", client_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    let snapshot = match services::mirror::join(&state, &mirror, client_id, client_tx).await {
        Ok(frames) => frames,
        Err(e) => {
            warn!(%client_id, %mirror, error = %e, "ws: join failed");
            services::mirror::part(&state, &mirror, client_id).await;
            return;
        }
    };
    if send_frames(&mut socket, &snapshot).await.is_err() {
        services::mirror::part(&state, &mirror, client_id).await;
        return;
    }

    info!(%client_id, %mirror, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, &mirror, client_id, &text).await;
                        if send_frames(&mut socket, &replies).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    services::mirror::part(&state, &mirror, client_id).await;
    info!(%client_id, %mirror, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and apply one inbound text frame and return frames for the sender.
///
/// Broadcasts go out through the mirror's client channels, so the sender's
/// own copy arrives on its channel like everyone else's.
pub(crate) async fn process_inbound_text(state: &AppState, mirror: &str, client_id: Uuid, text: &str) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request(syscall::GATEWAY_ERROR, Data::new())
                .with_data(FRAME_MESSAGE, format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the relay's client id as `from`.
    req.from = Some(client_id.to_string());

    if req.status != Status::Request {
        debug!(%client_id, syscall = %req.syscall, status = ?req.status, "ws: ignoring non-request frame");
        return Vec::new();
    }

    let prefix = req.prefix();
    if !matches!(prefix, "ripple" | "charge" | "mirror") {
        return vec![req.error(format!("unknown prefix: {prefix}"))];
    }

    debug!(%client_id, %mirror, id = %req.id, syscall = %req.syscall, "ws: recv frame");
    match services::mirror::handle_frame(state, mirror, &req, now_ms()).await {
        Ok(_) => Vec::new(),
        Err(e) => vec![req.error_from(&e)],
    }
}

/// Send `frames` in order, stopping at the first failed write.
async fn send_frames<S>(sink: &mut S, frames: &[Frame]) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    for frame in frames {
        send_frame(sink, frame).await?;
    }
    Ok(())
}

async fn send_frame<S>(sink: &mut S, frame: &Frame) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Ok(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.data.get(FRAME_CODE).and_then(|v| v.as_str()).unwrap_or("-");
        let message = frame.data.get(FRAME_MESSAGE).and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        debug!(id = %frame.id, syscall = %frame.syscall, "ws: send frame");
    }
    sink.send(Message::Text(json.into())).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
