//! Per-connection handler: registration, event dispatch, and delivery.
//!
//! Each accepted connection gets its own task running this handler. The
//! flow is:
//!   1. Register the connection (with its outbound channel) → send
//!      `connected`
//!   2. Loop: `select!` over inbound client events and outbound broadcasts
//!   3. On close/error: route the connection through the disconnect path
//!
//! Locks live entirely inside the core's synchronous calls; this task only
//! awaits on socket I/O and the outbound channel.

use std::sync::Arc;

use parlor_protocol::{ClientEvent, Codec, ServerEvent};
use parlor_registry::RegistryError;
use parlor_room::{GameRules, OutcomeStore};
use parlor_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::ParlorError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<R, S>(
    conn: WebSocketConnection,
    state: Arc<ServerState<R, S>>,
) -> Result<(), ParlorError>
where
    R: GameRules,
    S: OutcomeStore,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    state.registry.register(conn_id, tx)?;

    send_event(
        &conn,
        &state,
        &ServerEvent::Connected { connection_id: conn_id.into_inner() },
    )
    .await?;

    let result = connection_loop(&conn, &state, conn_id, rx).await;

    // Transport errors and clean closes both end here: unregister the
    // connection and run its participant's leave path.
    state.lifecycle.handle_disconnect(conn_id);
    result
}

/// The main select loop: inbound events from the socket, outbound events
/// from the registry channel.
async fn connection_loop<R, S>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<R, S>>,
    conn_id: ConnectionId,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<ServerEvent>,
) -> Result<(), ParlorError>
where
    R: GameRules,
    S: OutcomeStore,
{
    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(event) => send_event(conn, state, &event).await?,
                    // Registry dropped our sender (unregistered elsewhere).
                    None => return Ok(()),
                }
            }
            inbound = conn.recv() => {
                match inbound {
                    Ok(Some(data)) => {
                        match state.codec.decode::<ClientEvent>(&data) {
                            Ok(event) => {
                                dispatch(conn, state, conn_id, event).await?;
                            }
                            Err(e) => {
                                tracing::debug!(%conn_id, error = %e, "undecodable event");
                                send_error(conn, state, e.kind(), &e.to_string()).await?;
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(%conn_id, "connection closed cleanly");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Routes one client event into the core.
///
/// Structural errors are answered with an `error` event on this connection
/// only; they never tear the connection down.
async fn dispatch<R, S>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<R, S>>,
    conn_id: ConnectionId,
    event: ClientEvent,
) -> Result<(), ParlorError>
where
    R: GameRules,
    S: OutcomeStore,
{
    match event {
        ClientEvent::CreateRoom { room_id, capacity, payload } => {
            match state.lifecycle.create_room(room_id, capacity, payload) {
                Ok(room) => {
                    send_event(conn, state, &ServerEvent::RoomCreated { room }).await?;
                }
                Err(e) => send_error(conn, state, e.kind(), &e.to_string()).await?,
            }
        }

        ClientEvent::JoinRoom { room_id, display_name } => {
            match state.lifecycle.join(conn_id, &room_id, &display_name) {
                Ok(participant_id) => {
                    send_event(
                        conn,
                        state,
                        &ServerEvent::RoomJoined { room_id, participant_id },
                    )
                    .await?;
                }
                Err(e) => send_error(conn, state, e.kind(), &e.to_string()).await?,
            }
        }

        ClientEvent::LeaveRoom => {
            // No-op when not attached, like the core's leave contract.
            state.lifecycle.leave_connection(conn_id);
        }

        ClientEvent::StartGame { room_id } => {
            // Success needs no direct reply; the state broadcast covers it.
            if let Err(e) = state.lifecycle.start(&room_id) {
                send_error(conn, state, e.kind(), &e.to_string()).await?;
            }
        }

        ClientEvent::GameAction { action } => {
            match state.registry.attachment(conn_id)? {
                Some(attachment) => {
                    if let Err(e) = state.lifecycle.game_action(
                        &attachment.room_id,
                        attachment.participant_id,
                        action,
                    ) {
                        send_error(conn, state, e.kind(), &e.to_string()).await?;
                    }
                }
                None => {
                    let e = RegistryError::NotAttached(conn_id);
                    send_error(conn, state, e.kind(), &e.to_string()).await?;
                }
            }
        }

        ClientEvent::History { participant_id } => {
            let target = match participant_id {
                Some(id) => Some(id),
                None => state
                    .registry
                    .attachment(conn_id)?
                    .map(|attachment| attachment.participant_id),
            };
            match target {
                Some(id) => match state.lifecycle.history(id).await {
                    Ok(outcomes) => {
                        send_event(conn, state, &ServerEvent::History { outcomes }).await?;
                    }
                    Err(e) => {
                        send_error(conn, state, e.kind(), &e.to_string()).await?;
                    }
                },
                None => {
                    let e = RegistryError::NotAttached(conn_id);
                    send_error(conn, state, e.kind(), &e.to_string()).await?;
                }
            }
        }
    }

    Ok(())
}

async fn send_event<R, S>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<R, S>>,
    event: &ServerEvent,
) -> Result<(), ParlorError>
where
    R: GameRules,
    S: OutcomeStore,
{
    let bytes = state.codec.encode(event)?;
    conn.send(&bytes).await.map_err(ParlorError::Transport)
}

async fn send_error<R, S>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<R, S>>,
    kind: &str,
    message: &str,
) -> Result<(), ParlorError>
where
    R: GameRules,
    S: OutcomeStore,
{
    send_event(
        conn,
        state,
        &ServerEvent::Error { kind: kind.to_string(), message: message.to_string() },
    )
    .await
}
