use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::net::internal::sanitize_name;
use crate::interface_adapters::protocol::{
    ClientMessage, ServerMessage, SessionSnapshotDto,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::rand_id;
use crate::use_cases::{RegistryError, SessionEvent, SessionHandle, SessionRegistry};

use axum::{
    Error, Json,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    EventsClosed,
    JoinTimeout,
    ClosedBeforeJoin,
    InvalidJoin,
    JoinRejected(RegistryError),
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct SessionQuery {
    // The session id the client wants to subscribe to.
    #[serde(default)]
    session_id: Option<String>,
}

type WsSender = SplitSink<WebSocket, Message>;
type WsReceiver = SplitStream<WebSocket>;

/// Serializes each session event once and broadcasts the shared bytes to
/// every connection. Full snapshots are also parked in the watch channel so
/// lagging clients can resync.
pub async fn session_event_serializer(
    mut events_rx: broadcast::Receiver<SessionEvent>,
    event_bytes_tx: broadcast::Sender<Utf8Bytes>,
    latest_tx: watch::Sender<Utf8Bytes>,
) {
    loop {
        match events_rx.recv().await {
            Ok(event) => {
                let full_state = matches!(
                    &event,
                    SessionEvent::StateUpdate(_) | SessionEvent::Ended(_)
                );
                let msg = ServerMessage::from(event);
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize session event");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                if full_state {
                    // Keep the latest full snapshot for lag recovery.
                    let _ = latest_tx.send(bytes.clone());
                }
                let _ = event_bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "event serializer lagged; skipping to latest");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("session events channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub fn spawn_session_serializer(handle: &SessionHandle) {
    // Spawn a task that serializes events for this session.
    tokio::spawn(session_event_serializer(
        handle.events_tx.subscribe(),
        handle.event_bytes_tx.clone(),
        handle.latest_tx.clone(),
    ));
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> impl IntoResponse {
    let Some(session_id) = query.session_id.filter(|id| !id.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "session_id query parameter is required".to_string(),
            }),
        )
            .into_response();
    };

    let handle = match state.registry.get_session(&session_id).await {
        Some(handle) => handle,
        None => {
            // Keep not-found responses consistent with the JSON error schema.
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "session not found".to_string(),
                }),
            )
                .into_response();
        }
    };

    let registry = state.registry.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, handle, registry))
}

async fn handle_socket(socket: WebSocket, handle: SessionHandle, registry: Arc<SessionRegistry>) {
    // Separate connection id for correlating logs before/after a player_id exists.
    let conn_id = rand_id();
    let span = info_span!("conn", conn_id, player_id = tracing::field::Empty);
    let _enter = span.enter();

    let (mut sender, mut receiver) = socket.split();

    let mut ctx = match bootstrap_connection(&mut sender, &mut receiver, &handle, registry).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join handshake");
            return;
        }
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "join failed".into(),
                })))
                .await;
            let _ = sender.close().await;
            return;
        }
    };

    span.record("player_id", ctx.player_id.as_str());
    info!(
        player_id = %ctx.player_id,
        session_id = %ctx.session_id,
        "client connected"
    );

    // Main Client Loop
    if let Err(e) = run_client_loop(&mut sender, &mut receiver, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }

    disconnect_cleanup(&ctx);
}

async fn send_message(sender: &mut WsSender, msg: &ServerMessage) -> Result<usize, NetError> {
    // Serialize message safely; log JSON errors instead of panicking
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    sender
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

struct ConnCtx {
    pub player_id: String,
    // Session this connection is attached to.
    pub session_id: Arc<str>,
    // Registry access for routing move/commit requests.
    pub registry: Arc<SessionRegistry>,
    pub event_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub latest_rx: watch::Receiver<Utf8Bytes>,
    // Count lag recovery snapshots sent to this client.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,

    pub last_rejected_input_log: Instant,
    pub last_event_lag_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

#[derive(Debug)]
struct JoinHandshake {
    player_id: String,
    player_name: String,
    bytes_in: u64,
    msgs_in: u64,
}

/// Reads messages until the client identifies itself with a Join. Anything
/// else before that point is tolerated but never acted on.
async fn read_join_handshake(
    receiver: &mut WsReceiver,
    invalid_json: &mut u32,
) -> Result<JoinHandshake, NetError> {
    let mut msgs_in = 0u64;
    let mut bytes_in = 0u64;

    loop {
        let incoming = receiver.next().await;
        match incoming {
            Some(Ok(Message::Text(text))) => {
                msgs_in += 1;
                bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => {
                        let player_id = payload.player_id.trim().to_string();
                        if player_id.is_empty() {
                            return Err(NetError::InvalidJoin);
                        }
                        return Ok(JoinHandshake {
                            player_id,
                            player_name: sanitize_name(&payload.player_name),
                            bytes_in,
                            msgs_in,
                        });
                    }
                    Ok(_) => {
                        warn!("received input before join; dropping");
                    }
                    Err(e) => {
                        *invalid_json += 1;
                        debug!(error = %e, "unparseable message before join");
                        if *invalid_json > MAX_INVALID_JSON {
                            return Err(NetError::InvalidJoin);
                        }
                    }
                }
            }
            Some(Ok(Message::Binary(_))) => return Err(NetError::InvalidJoin),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => return Err(NetError::ClosedBeforeJoin),
            Some(Err(e)) => return Err(NetError::Ws(e)),
        }
    }
}

async fn bootstrap_connection(
    sender: &mut WsSender,
    receiver: &mut WsReceiver,
    handle: &SessionHandle,
    registry: Arc<SessionRegistry>,
) -> Result<ConnCtx, NetError> {
    // Subscribe to events *before* doing anything else (awaits) to not miss packets.
    let event_bytes_rx = handle.event_bytes_tx.subscribe();
    let latest_rx = handle.latest_tx.subscribe();

    // The first meaningful client message must identify the player.
    let mut invalid_json = 0u32;
    let join = match timeout(
        JOIN_HANDSHAKE_TIMEOUT,
        read_join_handshake(receiver, &mut invalid_json),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(sender, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };

    // Join the player into the session, or re-attach to an existing record;
    // disconnects never remove players, so reconnecting finds the old state.
    let (_player, snapshot) = match registry
        .join_session(&handle.session_id, &join.player_id, &join.player_name)
        .await
    {
        Ok(joined) => joined,
        Err(err) => {
            let reason = match err {
                RegistryError::SessionNotJoinable => "session not joinable",
                RegistryError::SessionNotFound => "session unavailable",
                _ => "join rejected",
            };
            let _ = send_close_with_reason(sender, close_code::POLICY, reason).await;
            return Err(NetError::JoinRejected(err));
        }
    };

    // Send Identity Packet
    // Tell the client "This is who you are".
    let identity_msg = ServerMessage::Identity {
        player_id: join.player_id.clone(),
    };
    let mut bytes_out = send_message(sender, &identity_msg).await? as u64;

    // Send Initial State
    // The join snapshot already includes this player, so the client can
    // render the full world immediately.
    let state_msg = ServerMessage::StateUpdate(SessionSnapshotDto::from(&snapshot));
    bytes_out += send_message(sender, &state_msg).await? as u64;

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        player_id: join.player_id,
        session_id: handle.session_id.clone(),
        registry,
        event_bytes_rx,
        latest_rx,
        lag_recovery_count: 0,

        msgs_in: join.msgs_in,
        msgs_out: 2,
        bytes_in: join.bytes_in,
        bytes_out,

        invalid_json,

        last_rejected_input_log: now,
        last_event_lag_log: now,

        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn send_close_with_reason(
    sender: &mut WsSender,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    sender
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    sender.close().await.map_err(NetError::Ws)
}

async fn run_client_loop(
    sender: &mut WsSender,
    receiver: &mut WsReceiver,
    ctx: &mut ConnCtx,
) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = receiver.next() => {
                match handle_incoming_ws(incoming, ctx).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing Session Event
            event_msg = ctx.event_bytes_rx.recv() => {
                match event_msg {
                    Ok(bytes) => match forward_event_bytes(bytes, sender, &mut ctx.msgs_out, &mut ctx.bytes_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(&mut ctx.last_event_lag_log) {
                            warn!(missed = n, "session events lagged; sending snapshot");
                        }

                        // Resync strategy: send the latest full snapshot.
                        let latest = ctx.latest_rx.borrow().clone();
                        if latest.is_empty() {
                            false
                        } else {
                            ctx.lag_recovery_count += 1;
                            match forward_event_bytes(latest, sender, &mut ctx.msgs_out, &mut ctx.bytes_out).await {
                                LoopControl::Continue => false,
                                LoopControl::Disconnect => true,
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // The session was torn down while this client was attached.
                        warn!(session_id = %ctx.session_id, "session events closed; disconnecting");
                        fatal = Some(NetError::EventsClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = sender.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = sender.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Some(err) = fatal { Err(err) } else { Ok(()) }
}

async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(_)) => {
                        // Identity is fixed at handshake time for a connection.
                        if should_log(&mut ctx.last_rejected_input_log) {
                            warn!(player_id = %ctx.player_id, "duplicate join ignored");
                        }
                        Ok(LoopControl::Continue)
                    }
                    Ok(ClientMessage::Move(payload)) => {
                        route_move(ctx, payload.x, payload.y).await
                    }
                    Ok(ClientMessage::Commit) => route_commit(ctx).await,
                    Err(parse_err) => {
                        ctx.invalid_json += 1;
                        if should_log(&mut ctx.last_rejected_input_log) {
                            warn!(
                                player_id = %ctx.player_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if ctx.invalid_json > MAX_INVALID_JSON {
                            ctx.close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(player_id = %ctx.player_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(player_id = %ctx.player_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

/// Routes a move into the registry. Applied moves are pushed to everyone by
/// the event fan-out; ignored ones produce nothing by design.
async fn route_move(ctx: &mut ConnCtx, x: f32, y: f32) -> Result<LoopControl, NetError> {
    match ctx.registry.move_player(&ctx.player_id, x, y).await {
        Ok(_) => Ok(LoopControl::Continue),
        Err(RegistryError::InvalidCoordinates) => {
            if should_log(&mut ctx.last_rejected_input_log) {
                warn!(player_id = %ctx.player_id, "invalid move coordinates (NaN/inf); dropping");
            }
            Ok(LoopControl::Continue)
        }
        Err(RegistryError::PlayerNotFound) => {
            // The session was removed while this connection was live.
            warn!(player_id = %ctx.player_id, "player mapping gone; disconnecting");
            ctx.close_frame = Some(CloseFrame {
                code: close_code::POLICY,
                reason: "session unavailable".into(),
            });
            Ok(LoopControl::Disconnect)
        }
        Err(err) => {
            if should_log(&mut ctx.last_rejected_input_log) {
                warn!(player_id = %ctx.player_id, error = ?err, "move rejected");
            }
            Ok(LoopControl::Continue)
        }
    }
}

async fn route_commit(ctx: &mut ConnCtx) -> Result<LoopControl, NetError> {
    match ctx.registry.commit(&ctx.player_id).await {
        Ok(_) => Ok(LoopControl::Continue),
        Err(RegistryError::PlayerNotFound) => {
            warn!(player_id = %ctx.player_id, "player mapping gone; disconnecting");
            ctx.close_frame = Some(CloseFrame {
                code: close_code::POLICY,
                reason: "session unavailable".into(),
            });
            Ok(LoopControl::Disconnect)
        }
        Err(err) => {
            if should_log(&mut ctx.last_rejected_input_log) {
                warn!(player_id = %ctx.player_id, error = ?err, "commit rejected");
            }
            Ok(LoopControl::Continue)
        }
    }
}

async fn forward_event_bytes(
    event_msg: Utf8Bytes,
    sender: &mut WsSender,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = event_msg.len();
    match sender
        .send(Message::Text(event_msg))
        .await
        .map_err(NetError::Ws)
    {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send session event");
            LoopControl::Disconnect
        }
    }
}

fn disconnect_cleanup(ctx: &ConnCtx) {
    // The player record intentionally stays in the session: player state is
    // not tied to connection lifetime, and a reconnect re-attaches to it.
    debug!(
        player_id = %ctx.player_id,
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_json = ctx.invalid_json,
        lag_recovery_count = ctx.lag_recovery_count,
        "connection stats"
    );
    info!(player_id = %ctx.player_id, "client disconnected");
}
