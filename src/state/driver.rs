use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot, watch},
    time::sleep,
};
use tracing::{info, warn};

use crate::state::{
    hub::{DriverSignal, HubCommand},
    scene::{SceneEvent, SceneProgress},
};

/// How a driver run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOutcome {
    /// Every question was played and the session reached Over.
    Finished,
    /// The participant set emptied (or the hub vanished) before the end.
    Abandoned,
}

/// Task advancing a session through its scenes.
///
/// Sole writer of [`SceneProgress`]; talks to the hub only through commands.
pub struct SceneDriver {
    code: String,
    progress: watch::Sender<SceneProgress>,
    hub: mpsc::Sender<HubCommand>,
    signals: mpsc::UnboundedReceiver<DriverSignal>,
    dwell: Duration,
}

impl SceneDriver {
    /// Build a driver for session `code` holding each reveal for `dwell`.
    pub fn new(
        code: impl Into<String>,
        progress: watch::Sender<SceneProgress>,
        hub: mpsc::Sender<HubCommand>,
        signals: mpsc::UnboundedReceiver<DriverSignal>,
        dwell: Duration,
    ) -> Self {
        Self {
            code: code.into(),
            progress,
            hub,
            signals,
            dwell,
        }
    }

    /// Drive the session to its end, then tell the hub to terminate.
    pub async fn run(mut self) -> DriverOutcome {
        let outcome = self.play().await;
        match outcome {
            DriverOutcome::Finished => info!(session = %self.code, "game over"),
            DriverOutcome::Abandoned => {
                self.progress.send_modify(|progress| *progress = progress.abandoned());
                info!(session = %self.code, "no participants left; closing session");
            }
        }
        let _ = self.hub.send(HubCommand::Terminate).await;
        outcome
    }

    async fn play(&mut self) -> DriverOutcome {
        let Some(question_count) = self.await_start().await else {
            return DriverOutcome::Abandoned;
        };
        if !self.advance(SceneEvent::Start).await {
            return DriverOutcome::Abandoned;
        }

        loop {
            let index = self.progress.borrow().current_index;
            if !self.await_votes(index).await {
                return DriverOutcome::Abandoned;
            }
            if !self.reveal(index).await {
                return DriverOutcome::Abandoned;
            }
            if !self.dwell().await {
                return DriverOutcome::Abandoned;
            }

            let event = if index + 1 < question_count {
                SceneEvent::NextQuestion
            } else {
                SceneEvent::Finish
            };
            if !self.advance(event).await {
                return DriverOutcome::Abandoned;
            }
            if event == SceneEvent::Finish {
                return DriverOutcome::Finished;
            }
        }
    }

    /// Wait for a start request that yields a playable round; returns the round length.
    async fn await_start(&mut self) -> Option<usize> {
        loop {
            match self.signals.recv().await? {
                DriverSignal::Start => {
                    let (reply, count) = oneshot::channel();
                    self.hub
                        .send(HubCommand::PrepareRound { reply })
                        .await
                        .ok()?;
                    match count.await.ok()? {
                        0 => warn!(session = %self.code, "no questions available; start ignored"),
                        count => return Some(count),
                    }
                }
                DriverSignal::Emptied => return None,
                DriverSignal::VotesComplete { .. } => {}
            }
        }
    }

    /// Wait until the tally of question `index` is complete. False when the session emptied.
    async fn await_votes(&mut self, index: usize) -> bool {
        loop {
            match self.signals.recv().await {
                Some(DriverSignal::VotesComplete { index: complete }) if complete == index => {
                    return true;
                }
                Some(DriverSignal::Emptied) | None => return false,
                Some(_) => {}
            }
        }
    }

    /// Enter Revealing and have the hub score question `index` before anything else is sent.
    ///
    /// The hub holds its queue until the transition is published, so no snapshot shows the
    /// reveal without its scores.
    async fn reveal(&mut self, index: usize) -> bool {
        let (published, ready) = oneshot::channel();
        if self.hub.send(HubCommand::Reveal { index, ready }).await.is_err() {
            return false;
        }
        if self.transition(SceneEvent::VotesComplete).is_none() {
            return false;
        }
        published.send(()).is_ok()
    }

    /// Hold the reveal on screen. False when the session emptied meanwhile.
    async fn dwell(&mut self) -> bool {
        let dwell = sleep(self.dwell);
        tokio::pin!(dwell);
        loop {
            tokio::select! {
                _ = &mut dwell => return true,
                signal = self.signals.recv() => match signal {
                    Some(DriverSignal::Emptied) | None => return false,
                    Some(_) => {}
                },
            }
        }
    }

    /// Apply a transition and broadcast it. False when the hub is gone.
    async fn advance(&mut self, event: SceneEvent) -> bool {
        self.transition(event).is_some() && self.hub.send(HubCommand::Broadcast).await.is_ok()
    }

    fn transition(&self, event: SceneEvent) -> Option<SceneProgress> {
        let current = *self.progress.borrow();
        match current.next(event) {
            Ok(next) => {
                self.progress.send_replace(next);
                info!(
                    session = %self.code,
                    from = ?current.scene,
                    to = ?next.scene,
                    index = next.current_index,
                    "scene changed"
                );
                Some(next)
            }
            Err(err) => {
                warn!(session = %self.code, error = %err, "scene transition rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::ws::Message;
    use serde_json::Value;

    use super::*;
    use crate::state::{
        hub::Hub,
        participant::{Participant, ParticipantId},
        question::{CHOICE_A, CHOICE_B, Question},
        scene::Scene,
        session::Session,
    };

    const DWELL: Duration = Duration::from_secs(15);

    struct Harness {
        hub: mpsc::Sender<HubCommand>,
        progress: watch::Receiver<SceneProgress>,
        driver: tokio::task::JoinHandle<DriverOutcome>,
        hub_task: tokio::task::JoinHandle<()>,
    }

    impl Harness {
        fn spawn(pool: Vec<Question>, target: usize) -> Self {
            let (progress_tx, progress_rx) = watch::channel(SceneProgress::default());
            let (hub_tx, hub_rx) = mpsc::channel(64);
            let (signal_tx, signal_rx) = mpsc::unbounded_channel();

            let hub = Hub::new(
                Session::new("TEST", pool, target),
                progress_rx.clone(),
                hub_rx,
                signal_tx,
            );
            let driver = SceneDriver::new("TEST", progress_tx, hub_tx.clone(), signal_rx, DWELL);

            Self {
                hub: hub_tx,
                progress: progress_rx,
                hub_task: tokio::spawn(hub.run()),
                driver: tokio::spawn(driver.run()),
            }
        }

        async fn join(&self, name: &str, leader: bool) -> (ParticipantId, mpsc::Receiver<Message>) {
            let (tx, rx) = mpsc::channel(64);
            let participant = Participant::new(name, leader, tx);
            let id = participant.id;
            self.send(HubCommand::Register { participant }).await;
            (id, rx)
        }

        async fn send(&self, command: HubCommand) {
            self.hub.send(command).await.unwrap();
        }

        /// Ask the hub to score `index` as if the reveal had just been published.
        async fn rescore(&self, index: usize) {
            let (published, ready) = oneshot::channel();
            self.send(HubCommand::Reveal { index, ready }).await;
            published.send(()).unwrap();
        }

        async fn vote(&self, id: ParticipantId, choice: u32) {
            self.send(HubCommand::Vote {
                id,
                choice: choice as i64,
            })
            .await;
        }

        /// Round-trips through the hub so every earlier command has been handled.
        async fn roster(&self) -> Vec<String> {
            let (reply, names) = oneshot::channel();
            self.send(HubCommand::Roster { reply }).await;
            names.await.unwrap()
        }

        async fn wait_for(&mut self, scene: Scene) {
            self.progress
                .wait_for(|p| p.scene == scene)
                .await
                .unwrap();
        }
    }

    fn binary_question(reward: u32) -> Question {
        Question::new(
            "People",
            "multiple",
            "{1} or {2}?",
            vec!["{1}".into(), "{2}".into()],
            "{1}",
            reward,
        )
    }

    fn latest_snapshot(rx: &mut mpsc::Receiver<Message>) -> Value {
        let mut latest = Value::Null;
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                latest = serde_json::from_str(text.as_str()).unwrap();
            }
        }
        latest
    }

    fn score(snapshot: &Value, name: &str) -> u64 {
        snapshot["players"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == name)
            .and_then(|p| p["score"].as_u64())
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn single_question_game_runs_to_over() {
        let mut harness = Harness::spawn(vec![binary_question(4)], 1);
        let (alice, mut alice_rx) = harness.join("alice", true).await;
        harness.send(HubCommand::Start { id: alice }).await;
        harness.wait_for(Scene::Asking).await;

        let (bob, mut bob_rx) = harness.join("bob", false).await;
        harness.vote(alice, CHOICE_A).await;
        harness.roster().await;
        assert_eq!(harness.progress.borrow().scene, Scene::Asking);
        harness.vote(bob, CHOICE_B).await;

        harness.wait_for(Scene::Over).await;
        assert!(!harness.progress.borrow().alive);
        assert_eq!(harness.driver.await.unwrap(), DriverOutcome::Finished);
        harness.hub_task.await.unwrap();

        let alice_last = latest_snapshot(&mut alice_rx);
        let bob_last = latest_snapshot(&mut bob_rx);
        assert_eq!(alice_last["scene"], 3);
        assert_eq!(bob_last["scene"], 3);
        assert_eq!(alice_last["id"], "TEST");
        assert_eq!(score(&alice_last, "alice"), 2);
        assert_eq!(score(&alice_last, "bob"), 2);
        assert!(alice_last["questions"][0]["correct_choice"].is_string());
    }

    #[tokio::test(start_paused = true)]
    async fn minority_is_rewarded_and_the_next_question_follows_the_dwell() {
        let mut harness = Harness::spawn(vec![binary_question(4), binary_question(4)], 2);
        let (alice, mut alice_rx) = harness.join("alice", true).await;
        let (bob, _b) = harness.join("bob", false).await;
        let (carol, _c) = harness.join("carol", false).await;
        harness.send(HubCommand::Start { id: alice }).await;
        harness.wait_for(Scene::Asking).await;

        harness.vote(alice, CHOICE_A).await;
        harness.vote(bob, CHOICE_A).await;
        harness.vote(carol, CHOICE_B).await;
        harness.wait_for(Scene::Revealing).await;
        harness.roster().await;

        let revealed = latest_snapshot(&mut alice_rx);
        assert_eq!(revealed["scene"], 2);
        assert_eq!(score(&revealed, "alice"), 0);
        assert_eq!(score(&revealed, "bob"), 0);
        assert_eq!(score(&revealed, "carol"), 4);
        assert_eq!(revealed["questions"][0]["scored_players"][0], "carol");

        harness
            .progress
            .wait_for(|p| p.scene == Scene::Asking && p.current_index == 1)
            .await
            .unwrap();
        harness.driver.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn scoring_request_outside_of_reveal_is_ignored() {
        let mut harness = Harness::spawn(vec![binary_question(4), binary_question(4)], 2);
        let (alice, mut alice_rx) = harness.join("alice", true).await;
        let (bob, _b) = harness.join("bob", false).await;
        harness.send(HubCommand::Start { id: alice }).await;
        harness.wait_for(Scene::Asking).await;

        harness.vote(alice, CHOICE_A).await;
        harness.vote(bob, CHOICE_B).await;
        harness.wait_for(Scene::Revealing).await;
        harness.roster().await;
        assert_eq!(score(&latest_snapshot(&mut alice_rx), "alice"), 2);

        // Repeat while revealing: already scored.
        harness.rescore(0).await;
        harness.roster().await;
        assert!(latest_snapshot(&mut alice_rx).is_null());

        harness
            .progress
            .wait_for(|p| p.scene == Scene::Asking && p.current_index == 1)
            .await
            .unwrap();
        latest_snapshot(&mut alice_rx);

        // Stale index while asking the next question.
        harness.rescore(0).await;
        harness.roster().await;
        assert!(latest_snapshot(&mut alice_rx).is_null());
        harness.driver.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_leader_can_start() {
        let harness = Harness::spawn(vec![binary_question(2)], 1);
        let (_alice, _a) = harness.join("alice", true).await;
        let (bob, _b) = harness.join("bob", false).await;

        harness.send(HubCommand::Start { id: bob }).await;
        harness.roster().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(harness.progress.borrow().scene, Scene::NotStarted);
        harness.driver.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_keeps_the_lobby_open() {
        let harness = Harness::spawn(Vec::new(), 5);
        let (alice, _a) = harness.join("alice", true).await;
        harness.send(HubCommand::Start { id: alice }).await;
        harness.roster().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let progress = *harness.progress.borrow();
        assert_eq!(progress.scene, Scene::NotStarted);
        assert!(progress.alive);
        harness.driver.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn last_participant_leaving_abandons_the_session() {
        let mut harness = Harness::spawn(vec![binary_question(2)], 1);
        let (alice, _a) = harness.join("alice", true).await;
        harness.send(HubCommand::Start { id: alice }).await;
        harness.wait_for(Scene::Asking).await;

        harness.send(HubCommand::Deregister { id: alice }).await;
        assert_eq!(harness.driver.await.unwrap(), DriverOutcome::Abandoned);
        harness.hub_task.await.unwrap();

        let progress = *harness.progress.borrow();
        assert!(!progress.alive);
        assert_eq!(progress.scene, Scene::Asking);
    }

    #[tokio::test(start_paused = true)]
    async fn emptying_during_reveal_abandons_without_waiting_for_the_dwell() {
        let mut harness = Harness::spawn(vec![binary_question(2), binary_question(2)], 2);
        let (alice, _a) = harness.join("alice", true).await;
        harness.send(HubCommand::Start { id: alice }).await;
        harness.wait_for(Scene::Asking).await;
        harness.vote(alice, CHOICE_A).await;
        harness.wait_for(Scene::Revealing).await;

        let started = tokio::time::Instant::now();
        harness.send(HubCommand::Deregister { id: alice }).await;
        assert_eq!(harness.driver.await.unwrap(), DriverOutcome::Abandoned);
        assert!(started.elapsed() < DWELL);
        assert_eq!(harness.progress.borrow().scene, Scene::Revealing);
    }

    #[tokio::test(start_paused = true)]
    async fn departure_of_the_last_non_voter_completes_the_tally() {
        let mut harness = Harness::spawn(vec![binary_question(2)], 1);
        let (alice, _a) = harness.join("alice", true).await;
        let (bob, _b) = harness.join("bob", false).await;
        harness.send(HubCommand::Start { id: alice }).await;
        harness.wait_for(Scene::Asking).await;

        harness.vote(alice, CHOICE_A).await;
        harness.send(HubCommand::Deregister { id: bob }).await;

        harness.wait_for(Scene::Revealing).await;
        assert_eq!(harness.roster().await, vec!["alice".to_string()]);
        harness.driver.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn votes_outside_of_asking_are_ignored() {
        let harness = Harness::spawn(vec![binary_question(2)], 1);
        let (alice, mut alice_rx) = harness.join("alice", true).await;
        harness.roster().await;
        assert_eq!(latest_snapshot(&mut alice_rx)["scene"], 0);

        harness.vote(alice, CHOICE_A).await;
        harness.roster().await;
        assert!(latest_snapshot(&mut alice_rx).is_null());
        harness.driver.abort();
    }
}
