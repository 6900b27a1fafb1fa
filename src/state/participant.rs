use axum::extract::ws::Message;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Identifier of a connected participant, stable for the lifetime of its connection.
pub type ParticipantId = Uuid;

/// Outcome of a non-blocking delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message was queued.
    Queued,
    /// The queue is full; the participant is not keeping up.
    Unresponsive,
    /// The connection pump is gone.
    Disconnected,
}

/// One player within a session, owned by the session hub.
#[derive(Debug)]
pub struct Participant {
    /// Connection-scoped identifier.
    pub id: ParticipantId,
    /// Display name, unique within the session.
    pub name: String,
    /// Accumulated points.
    pub score: u32,
    /// Whether this participant may start the game.
    pub is_leader: bool,
    outbound: mpsc::Sender<Message>,
}

impl Participant {
    /// Build a participant that will be fed through `outbound`.
    ///
    /// An empty name is replaced by the hub when the participant registers.
    pub fn new(name: impl Into<String>, is_leader: bool, outbound: mpsc::Sender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            score: 0,
            is_leader,
            outbound,
        }
    }

    /// Try to queue a message without waiting for capacity.
    pub fn deliver(&self, message: Message) -> Delivery {
        match self.outbound.try_send(message) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Unresponsive,
            Err(TrySendError::Closed(_)) => Delivery::Disconnected,
        }
    }
}
