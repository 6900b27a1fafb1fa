use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::state::{
    participant::{Participant, ParticipantId},
    scene::{Scene, SceneProgress},
    session::{Registration, Session},
};

/// Requests processed one at a time by the session hub.
#[derive(Debug)]
pub enum HubCommand {
    /// Add a participant and broadcast the new membership.
    Register {
        /// Participant to admit.
        participant: Participant,
    },
    /// Remove a participant (no-op once the game is over or if already gone).
    Deregister {
        /// Participant to remove.
        id: ParticipantId,
    },
    /// Vote on the current question.
    Vote {
        /// Voter.
        id: ParticipantId,
        /// Raw value sent by the client.
        choice: i64,
    },
    /// Leader asks to start the game.
    Start {
        /// Requesting participant.
        id: ParticipantId,
    },
    /// Push a snapshot of the current state to everyone.
    Broadcast,
    /// Personalize, shuffle and truncate the questions for a new round.
    PrepareRound {
        /// Receives the number of questions in the round.
        reply: oneshot::Sender<usize>,
    },
    /// Score the question at `index` once the driver has published the reveal, then broadcast.
    ///
    /// No other command is processed while waiting on `ready`.
    Reveal {
        /// Question to score.
        index: usize,
        /// Completed by the driver after the Revealing transition; dropped if it failed.
        ready: oneshot::Receiver<()>,
    },
    /// Names of the connected participants.
    Roster {
        /// Receives the names.
        reply: oneshot::Sender<Vec<String>>,
    },
    /// Stop processing; the session is finished.
    Terminate,
}

/// Notifications the hub sends to the scene driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverSignal {
    /// The leader asked to start.
    Start,
    /// Every connected participant voted on question `index`.
    VotesComplete {
        /// Question whose tally is complete.
        index: usize,
    },
    /// The last participant left.
    Emptied,
}

/// Single authority over session membership, tallies and broadcasts.
pub struct Hub {
    session: Session,
    progress: watch::Receiver<SceneProgress>,
    commands: mpsc::Receiver<HubCommand>,
    driver: mpsc::UnboundedSender<DriverSignal>,
}

impl Hub {
    /// Wire a hub to its command queue, the driver's progress and the driver's signal queue.
    pub fn new(
        session: Session,
        progress: watch::Receiver<SceneProgress>,
        commands: mpsc::Receiver<HubCommand>,
        driver: mpsc::UnboundedSender<DriverSignal>,
    ) -> Self {
        Self {
            session,
            progress,
            commands,
            driver,
        }
    }

    /// Process commands until termination or until every sender is gone.
    ///
    /// Dropping the session on exit closes every outbound queue.
    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Terminate => break,
                HubCommand::Reveal { index, ready } => {
                    if ready.await.is_ok() {
                        self.award_scores(index);
                    }
                }
                command => self.handle(command),
            }
        }
        info!(session = %self.session.code(), "session hub stopped");
    }

    fn progress(&self) -> SceneProgress {
        *self.progress.borrow()
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { participant } => match self.session.register(participant) {
                Registration::Joined(_) => self.broadcast(),
                Registration::NameTaken(name) => {
                    debug!(session = %self.session.code(), participant = %name, "name already taken; registration ignored");
                }
            },
            HubCommand::Deregister { id } => {
                if self.progress().scene == Scene::Over {
                    return;
                }
                if self.session.deregister(&id) {
                    self.after_membership_change();
                    self.broadcast();
                }
            }
            HubCommand::Vote { id, choice } => {
                let progress = self.progress();
                if progress.scene != Scene::Asking {
                    debug!(session = %self.session.code(), "vote outside of asking ignored");
                    return;
                }
                if self.session.record_vote(progress.current_index, &id, choice) {
                    self.broadcast();
                    self.check_votes(progress);
                }
            }
            HubCommand::Start { id } => {
                if !self.session.is_leader(&id) {
                    debug!(session = %self.session.code(), "start from non-leader ignored");
                    return;
                }
                if !self.progress().scene.accepts_start() {
                    debug!(session = %self.session.code(), "start outside of lobby ignored");
                    return;
                }
                let _ = self.driver.send(DriverSignal::Start);
            }
            HubCommand::Broadcast => self.broadcast(),
            HubCommand::PrepareRound { reply } => {
                let count = self.session.prepare_round();
                let _ = reply.send(count);
            }
            HubCommand::Roster { reply } => {
                let _ = reply.send(self.session.names());
            }
            HubCommand::Reveal { .. } | HubCommand::Terminate => {}
        }
    }

    fn award_scores(&mut self, index: usize) {
        let progress = self.progress();
        if progress.scene != Scene::Revealing || progress.current_index != index {
            warn!(session = %self.session.code(), index, scene = ?progress.scene, "scoring requested outside of reveal; ignoring");
            return;
        }
        if self.session.award_scores(index) {
            info!(session = %self.session.code(), index, "scores awarded");
            self.broadcast();
        }
    }

    fn broadcast(&mut self) {
        let progress = self.progress();
        let dropped = self.session.broadcast(&progress);
        if !dropped.is_empty() && progress.scene != Scene::Over {
            self.after_membership_change();
        }
    }

    /// Re-evaluate driver conditions after someone left.
    fn after_membership_change(&mut self) {
        if self.session.participant_count() == 0 {
            let _ = self.driver.send(DriverSignal::Emptied);
            return;
        }
        let progress = self.progress();
        if progress.scene == Scene::Asking {
            self.check_votes(progress);
        }
    }

    fn check_votes(&self, progress: SceneProgress) {
        if self.session.votes_complete(progress.current_index) {
            let _ = self.driver.send(DriverSignal::VotesComplete {
                index: progress.current_index,
            });
        }
    }
}
