use axum::extract::ws::Message;
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{PlayerView, QuestionView, SessionSnapshot},
    state::{
        participant::{Delivery, Participant, ParticipantId},
        question::{Question, pick_name_pair},
        scene::SceneProgress,
    },
};

/// Result of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Participant joined under the returned name.
    Joined(String),
    /// Another participant already uses the requested name.
    NameTaken(String),
}

/// Membership and question state of one game session.
///
/// Owned by the session hub; scene and question index live in the driver's [`SceneProgress`]
/// and are passed in wherever they matter.
#[derive(Debug)]
pub struct Session {
    code: String,
    participants: IndexMap<ParticipantId, Participant>,
    pool: Vec<Question>,
    questions: Vec<Question>,
    target_question_count: usize,
}

impl Session {
    /// Build a session around a question pool; the requested length is clamped to the pool.
    pub fn new(code: impl Into<String>, pool: Vec<Question>, target_question_count: usize) -> Self {
        let target_question_count = target_question_count.min(pool.len());
        Self {
            code: code.into(),
            participants: IndexMap::new(),
            pool,
            questions: Vec::new(),
            target_question_count,
        }
    }

    /// Short code identifying the session.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Number of connected participants.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Display names of every connected participant.
    pub fn names(&self) -> Vec<String> {
        self.participants.values().map(|p| p.name.clone()).collect()
    }

    /// Requested game length after clamping.
    pub fn target_question_count(&self) -> usize {
        self.target_question_count
    }

    /// Questions of the current round.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Score of the participant named `name`, if connected.
    pub fn score_of(&self, name: &str) -> Option<u32> {
        self.participants
            .values()
            .find(|p| p.name == name)
            .map(|p| p.score)
    }

    /// Add a participant, assigning a default name when none was requested.
    ///
    /// A session has at most one leader: a second leader claim is demoted.
    pub fn register(&mut self, mut participant: Participant) -> Registration {
        if participant.name.is_empty() {
            participant.name = self.default_name();
        } else if self.name_taken(&participant.name) {
            return Registration::NameTaken(participant.name);
        }

        if participant.is_leader && self.participants.values().any(|p| p.is_leader) {
            warn!(session = %self.code, participant = %participant.name, "session already has a leader");
            participant.is_leader = false;
        }

        let name = participant.name.clone();
        info!(session = %self.code, participant = %name, id = %participant.id, leader = participant.is_leader, "participant joined");
        self.participants.insert(participant.id, participant);
        Registration::Joined(name)
    }

    /// Remove a participant, dropping its outbound queue. Returns false if it was not present.
    pub fn deregister(&mut self, id: &ParticipantId) -> bool {
        match self.participants.shift_remove(id) {
            Some(participant) => {
                info!(session = %self.code, participant = %participant.name, "participant left");
                true
            }
            None => false,
        }
    }

    /// Whether `name` is used by a connected participant (case-sensitive).
    pub fn name_taken(&self, name: &str) -> bool {
        self.participants.values().any(|p| p.name == name)
    }

    /// Whether the participant exists and holds the leader flag.
    pub fn is_leader(&self, id: &ParticipantId) -> bool {
        self.participants.get(id).is_some_and(|p| p.is_leader)
    }

    fn default_name(&self) -> String {
        let mut n = self.participants.len() + 1;
        loop {
            let candidate = format!("Player {n}");
            if !self.name_taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Rebuild the round's question list: personalize, shuffle, truncate.
    ///
    /// Returns the number of questions in the round.
    pub fn prepare_round(&mut self) -> usize {
        let names = self.names();
        let mut rng = rand::rng();

        let mut questions: Vec<Question> = self
            .pool
            .iter()
            .map(|question| match pick_name_pair(&names, &mut rng) {
                Some((first, second)) => question.personalized(&first, &second),
                None => question.personalized("{1}", "{2}"),
            })
            .collect();
        questions.shuffle(&mut rng);
        questions.truncate(self.target_question_count);

        debug!(session = %self.code, count = questions.len(), "round prepared");
        self.questions = questions;
        self.questions.len()
    }

    /// Record a vote on question `index`. Returns false when the vote was ignored.
    pub fn record_vote(&mut self, index: usize, id: &ParticipantId, choice: i64) -> bool {
        let Some(participant) = self.participants.get(id) else {
            return false;
        };
        let Ok(choice) = u32::try_from(choice) else {
            return false;
        };
        let Some(question) = self.questions.get_mut(index) else {
            return false;
        };
        question.record_vote(*id, &participant.name, choice)
    }

    /// Whether every connected participant voted on question `index`.
    pub fn votes_complete(&self, index: usize) -> bool {
        let Some(question) = self.questions.get(index) else {
            return false;
        };
        !self.participants.is_empty() && self.participants.keys().all(|id| question.has_vote(id))
    }

    /// Score question `index` once and credit the winners. Returns false if already scored.
    pub fn award_scores(&mut self, index: usize) -> bool {
        let Some(question) = self.questions.get_mut(index) else {
            return false;
        };
        if question.is_scored() {
            warn!(session = %self.code, index, "question already scored; ignoring");
            return false;
        }

        let participants = &mut self.participants;
        let awards = question.award_scores(|id| participants.contains_key(id));
        for (id, points) in awards {
            if let Some(participant) = participants.get_mut(&id) {
                participant.score += points;
                debug!(session = %self.code, participant = %participant.name, points, "points awarded");
            }
        }
        true
    }

    /// Project the session for clients.
    pub fn snapshot(&self, progress: &SceneProgress) -> SessionSnapshot {
        SessionSnapshot {
            id: self.code.clone(),
            players: self
                .participants
                .values()
                .map(|p| PlayerView {
                    name: p.name.clone(),
                    score: p.score,
                    is_leader: p.is_leader,
                })
                .collect(),
            questions: self
                .questions
                .iter()
                .enumerate()
                .map(|(index, q)| QuestionView {
                    kind: q.kind.clone(),
                    category: q.category.clone(),
                    description: q.description.clone(),
                    choices: q.choices.clone(),
                    reward: q.reward,
                    correct_choice: progress
                        .reveals(index)
                        .then(|| q.correct_choice.clone()),
                    answers: q.voters().map(str::to_string).collect(),
                    scored_players: q.scored_players().to_vec(),
                })
                .collect(),
            current_question: progress.current_index,
            scene: progress.scene.ordinal(),
        }
    }

    /// Push a snapshot to every participant without waiting on any queue.
    ///
    /// Participants whose queue is full or closed are removed; the removed ids are returned.
    pub fn broadcast(&mut self, progress: &SceneProgress) -> Vec<ParticipantId> {
        let payload = match serde_json::to_string(&self.snapshot(progress)) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(session = %self.code, error = %err, "failed to serialize snapshot");
                return Vec::new();
            }
        };
        let message = Message::Text(payload.into());

        let dropped: Vec<ParticipantId> = self
            .participants
            .values()
            .filter_map(|p| match p.deliver(message.clone()) {
                Delivery::Queued => None,
                Delivery::Unresponsive => {
                    warn!(session = %self.code, participant = %p.name, "outbound queue full; dropping participant");
                    Some(p.id)
                }
                Delivery::Disconnected => Some(p.id),
            })
            .collect();

        for id in &dropped {
            self.participants.shift_remove(id);
        }
        dropped
    }
}
