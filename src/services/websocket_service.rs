use std::time::Duration;

use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket},
};
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior, interval_at, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    dto::ws::{ActionKind, PlayerAction},
    services::session_service::Admission,
    state::{
        SharedState,
        hub::HubCommand,
        participant::{Participant, ParticipantId},
        registry::SessionHandle,
    },
};

/// Reasons a connection pump stops abnormally.
///
/// Every variant ends in deregistration; none is retried.
#[derive(Debug, Error)]
enum PumpError {
    /// Nothing was received within the idle window.
    #[error("idle read timeout")]
    IdleTimeout,
    /// A single write took longer than allowed.
    #[error("write timed out")]
    WriteTimeout,
    /// The client sent something that is not a recognized action.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// The transport failed.
    #[error("websocket error: {0}")]
    Transport(#[from] axum::Error),
    /// The session hub stopped accepting commands.
    #[error("session has ended")]
    SessionEnded,
    /// The writer task panicked or was cancelled.
    #[error("writer task failed")]
    WriterFailed,
}

#[derive(Debug, Clone, Copy)]
struct PumpTimings {
    idle_read: Duration,
    keepalive: Duration,
    write: Duration,
}

impl From<&AppConfig> for PumpTimings {
    fn from(config: &AppConfig) -> Self {
        Self {
            idle_read: config.idle_read_timeout(),
            keepalive: config.keepalive_interval(),
            write: config.write_timeout(),
        }
    }
}

/// Handle the full lifecycle of a participant connection: register, pump both ways, deregister.
pub async fn handle_socket(state: SharedState, admission: Admission, mut socket: WebSocket) {
    let timings = PumpTimings::from(state.config());
    let (outbound_tx, outbound_rx) = mpsc::channel(state.config().outbound_queue_capacity());
    let (control_tx, control_rx) = mpsc::unbounded_channel::<Message>();

    let Admission {
        session,
        name,
        is_leader,
    } = admission;
    let participant = Participant::new(name, is_leader, outbound_tx);
    let id = participant.id;

    if session
        .send(HubCommand::Register { participant })
        .await
        .is_err()
    {
        warn!(session = %session.code(), %id, "session ended before registration");
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    info!(session = %session.code(), %id, "connection opened");

    let (sink, stream) = socket.split();
    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let mut writer = tokio::spawn(write_pump(sink, outbound_rx, control_rx, timings));

    let mut writer_done = false;
    let outcome = tokio::select! {
        result = read_pump(stream, &session, id, control_tx, timings.idle_read) => result,
        joined = &mut writer => {
            writer_done = true;
            joined.unwrap_or(Err(PumpError::WriterFailed))
        }
    };

    match outcome {
        Ok(()) => info!(session = %session.code(), %id, "connection closed"),
        Err(err) => warn!(session = %session.code(), %id, error = %err, "connection terminated"),
    }

    let _ = session.send(HubCommand::Deregister { id }).await;

    if !writer_done && timeout(timings.write, &mut writer).await.is_err() {
        debug!(session = %session.code(), %id, "writer did not drain in time; aborting");
        writer.abort();
    }
}

/// Forward inbound actions to the hub until the client leaves or misbehaves.
async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    session: &SessionHandle,
    id: ParticipantId,
    control: mpsc::UnboundedSender<Message>,
    idle: Duration,
) -> Result<(), PumpError> {
    loop {
        let frame = match timeout(idle, stream.next()).await {
            Err(_) => return Err(PumpError::IdleTimeout),
            Ok(None) => return Ok(()),
            Ok(Some(frame)) => frame?,
        };

        match frame {
            Message::Text(text) => {
                let action = PlayerAction::from_json_str(text.as_str())
                    .map_err(|err| PumpError::Protocol(err.to_string()))?;
                let command = match action.action {
                    ActionKind::Vote => HubCommand::Vote {
                        id,
                        choice: action.value,
                    },
                    ActionKind::Start => HubCommand::Start { id },
                };
                session
                    .send(command)
                    .await
                    .map_err(|_| PumpError::SessionEnded)?;
            }
            Message::Ping(payload) => {
                let _ = control.send(Message::Pong(payload));
            }
            Message::Pong(_) => {}
            Message::Close(_) => return Ok(()),
            Message::Binary(_) => {
                return Err(PumpError::Protocol("binary frames are not supported".into()));
            }
        }
    }
}

/// Drain the participant's queue onto the socket, probing liveness when idle.
///
/// Queue closure means the hub let go of the participant: send a close frame and stop.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Message>,
    mut control: mpsc::UnboundedReceiver<Message>,
    timings: PumpTimings,
) -> Result<(), PumpError> {
    let mut keepalive = interval_at(Instant::now() + timings.keepalive, timings.keepalive);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let message = tokio::select! {
            message = outbound.recv() => match message {
                Some(message) => {
                    keepalive.reset();
                    message
                }
                None => {
                    let _ = write(&mut sink, Message::Close(None), timings.write).await;
                    return Ok(());
                }
            },
            Some(message) = control.recv() => message,
            _ = keepalive.tick() => Message::Ping(Bytes::new()),
        };
        write(&mut sink, message, timings.write).await?;
    }
}

async fn write(
    sink: &mut SplitSink<WebSocket, Message>,
    message: Message,
    limit: Duration,
) -> Result<(), PumpError> {
    timeout(limit, sink.send(message))
        .await
        .map_err(|_| PumpError::WriteTimeout)?
        .map_err(PumpError::from)
}
