use indexmap::IndexMap;
use rand::{Rng, seq::IndexedRandom};

use crate::state::participant::ParticipantId;

/// Vote value counted in the first scoring group.
pub const CHOICE_A: u32 = 1;
/// Vote value counted in the second scoring group.
pub const CHOICE_B: u32 = 2;

const FIRST_NAME_PLACEHOLDER: &str = "{1}";
const SECOND_NAME_PLACEHOLDER: &str = "{2}";

/// A single recorded vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    /// Chosen value; only [`CHOICE_A`] and [`CHOICE_B`] take part in scoring.
    pub choice: u32,
    /// Display name of the voter when the vote was cast.
    pub voter: String,
}

/// Question content plus the per-session tally of votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Provider category label.
    pub category: String,
    /// Provider question type (`multiple`, `boolean`, ...).
    pub kind: String,
    /// Question text, possibly containing `{1}`/`{2}` name placeholders.
    pub description: String,
    /// Ordered choices shown to participants.
    pub choices: Vec<String>,
    /// Text of the correct choice as given by the provider.
    pub correct_choice: String,
    /// Points distributed by the scoring rule.
    pub reward: u32,
    tally: IndexMap<ParticipantId, Vote>,
    scored: Vec<String>,
    scoring_runs: usize,
}

impl Question {
    /// Build a question with an empty tally.
    pub fn new(
        category: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
        choices: Vec<String>,
        correct_choice: impl Into<String>,
        reward: u32,
    ) -> Self {
        Self {
            category: category.into(),
            kind: kind.into(),
            description: description.into(),
            choices,
            correct_choice: correct_choice.into(),
            reward,
            tally: IndexMap::new(),
            scored: Vec::new(),
            scoring_runs: 0,
        }
    }

    /// Copy of the content with name placeholders substituted and the tally reset.
    pub fn personalized(&self, first: &str, second: &str) -> Question {
        let substitute = |text: &str| {
            text.replace(FIRST_NAME_PLACEHOLDER, first)
                .replace(SECOND_NAME_PLACEHOLDER, second)
        };

        Question::new(
            self.category.clone(),
            self.kind.clone(),
            substitute(&self.description),
            self.choices.iter().map(|choice| substitute(choice)).collect(),
            substitute(&self.correct_choice),
            self.reward,
        )
    }

    /// Record a vote. Returns false when the participant already voted.
    ///
    /// Any value is accepted so every voter counts toward completion; scoring ignores the
    /// values outside the two groups.
    pub fn record_vote(&mut self, participant: ParticipantId, voter: &str, choice: u32) -> bool {
        if self.tally.contains_key(&participant) {
            return false;
        }
        self.tally.insert(
            participant,
            Vote {
                choice,
                voter: voter.to_string(),
            },
        );
        true
    }

    /// Whether the participant already has a tally entry.
    pub fn has_vote(&self, participant: &ParticipantId) -> bool {
        self.tally.contains_key(participant)
    }

    /// Names of everyone who voted, in voting order.
    pub fn voters(&self) -> impl Iterator<Item = &str> {
        self.tally.values().map(|vote| vote.voter.as_str())
    }

    /// Names of participants that gained points when this question was scored.
    pub fn scored_players(&self) -> &[String] {
        &self.scored
    }

    /// Whether scoring already ran for this question.
    pub fn is_scored(&self) -> bool {
        self.scoring_runs > 0
    }

    /// Compute the minority-reward awards for voters accepted by `present`.
    ///
    /// Not idempotent: every call returns the full award list again and appends to the audit
    /// list, so callers must gate it behind the Asking to Revealing transition.
    pub fn award_scores(
        &mut self,
        present: impl Fn(&ParticipantId) -> bool,
    ) -> Vec<(ParticipantId, u32)> {
        let awards = minority_awards(
            self.tally
                .iter()
                .filter(|(id, _)| present(id))
                .map(|(id, vote)| (*id, vote.choice)),
            self.reward,
        );

        self.scoring_runs += 1;
        for (id, _) in &awards {
            if let Some(vote) = self.tally.get(id) {
                self.scored.push(vote.voter.clone());
            }
        }

        awards
    }
}

/// Minority-wins rule over the two scoring groups.
///
/// Values other than [`CHOICE_A`] and [`CHOICE_B`] are left out. The smaller group gains the full reward; on a tie every voter gains half of it (rounded
/// down). Zero awards are left out of the result.
pub fn minority_awards(
    votes: impl IntoIterator<Item = (ParticipantId, u32)>,
    reward: u32,
) -> Vec<(ParticipantId, u32)> {
    let (group_a, group_b): (Vec<_>, Vec<_>) = votes
        .into_iter()
        .filter(|(_, choice)| matches!(*choice, CHOICE_A | CHOICE_B))
        .partition(|(_, choice)| *choice == CHOICE_A);

    let (winners, points) = match group_a.len().cmp(&group_b.len()) {
        std::cmp::Ordering::Less => (group_a, reward),
        std::cmp::Ordering::Greater => (group_b, reward),
        std::cmp::Ordering::Equal => {
            let mut everyone = group_a;
            everyone.extend(group_b);
            (everyone, reward / 2)
        }
    };

    if points == 0 {
        return Vec::new();
    }

    winners.into_iter().map(|(id, _)| (id, points)).collect()
}

/// Pick two distinct names for placeholder substitution.
///
/// A lone participant fills both placeholders; an empty roster yields `None`.
pub fn pick_name_pair<R: Rng + ?Sized>(names: &[String], rng: &mut R) -> Option<(String, String)> {
    match names.len() {
        0 => None,
        1 => Some((names[0].clone(), names[0].clone())),
        _ => {
            let mut picked = names.choose_multiple(rng, 2);
            let first = picked.next()?.clone();
            let second = picked.next()?.clone();
            Some((first, second))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn question(reward: u32) -> Question {
        Question::new(
            "People",
            "multiple",
            "Who is more likely to sleep in, {1} or {2}?",
            vec!["{1}".into(), "{2}".into()],
            "{1}",
            reward,
        )
    }

    fn award_of(awards: &[(ParticipantId, u32)], id: ParticipantId) -> u32 {
        awards
            .iter()
            .find(|(winner, _)| *winner == id)
            .map(|(_, points)| *points)
            .unwrap_or(0)
    }

    #[test]
    fn minority_group_takes_the_reward() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let awards = minority_awards([(a, CHOICE_A), (b, CHOICE_A), (c, CHOICE_B)], 2);

        assert_eq!(award_of(&awards, a), 0);
        assert_eq!(award_of(&awards, b), 0);
        assert_eq!(award_of(&awards, c), 2);
    }

    #[test]
    fn tie_splits_the_reward_between_all_voters() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let awards = minority_awards([(a, CHOICE_A), (b, CHOICE_B)], 4);

        assert_eq!(award_of(&awards, a), 2);
        assert_eq!(award_of(&awards, b), 2);
    }

    #[test]
    fn tie_with_odd_reward_rounds_down() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let awards = minority_awards([(a, CHOICE_A), (b, CHOICE_B)], 3);
        assert_eq!(award_of(&awards, a), 1);

        let awards = minority_awards([(a, CHOICE_A), (b, CHOICE_B)], 1);
        assert!(awards.is_empty());
    }

    #[test]
    fn empty_tally_awards_nothing() {
        assert!(minority_awards(Vec::new(), 4).is_empty());
    }

    #[test]
    fn unanimous_vote_leaves_the_empty_minority_as_winner() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let awards = minority_awards([(a, CHOICE_B), (b, CHOICE_B)], 2);
        assert!(awards.is_empty());
    }

    #[test]
    fn votes_are_write_once() {
        let mut q = question(2);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(q.record_vote(a, "alice", CHOICE_B));
        assert!(!q.record_vote(a, "alice", CHOICE_A));
        assert!(q.record_vote(b, "bob", 0));
        assert!(!q.record_vote(b, "bob", CHOICE_A));
        assert!(q.has_vote(&a) && q.has_vote(&b));
        assert_eq!(q.voters().collect::<Vec<_>>(), vec!["alice", "bob"]);
    }

    #[test]
    fn values_outside_the_groups_are_tallied_but_never_scored() {
        let mut q = question(4);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert!(q.record_vote(a, "alice", 3));
        assert!(q.record_vote(b, "bob", CHOICE_A));
        assert!(q.record_vote(c, "carol", CHOICE_B));

        // alice sits out: bob and carol tie.
        let awards = q.award_scores(|_| true);
        assert_eq!(award_of(&awards, a), 0);
        assert_eq!(award_of(&awards, b), 2);
        assert_eq!(award_of(&awards, c), 2);
    }

    #[test]
    fn scoring_twice_doubles_the_awards() {
        let mut q = question(4);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        q.record_vote(a, "alice", CHOICE_A);
        q.record_vote(b, "bob", CHOICE_B);

        let first = q.award_scores(|_| true);
        let second = q.award_scores(|_| true);
        let total: u32 = first.iter().chain(second.iter()).map(|(_, p)| p).sum();

        assert_eq!(total, 8);
        assert_eq!(q.scored_players().len(), 4);
        assert!(q.is_scored());
    }

    #[test]
    fn departed_voters_are_excluded_from_scoring() {
        let mut q = question(2);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        q.record_vote(a, "alice", CHOICE_A);
        q.record_vote(b, "bob", CHOICE_A);
        q.record_vote(c, "carol", CHOICE_B);

        // bob left: groups are now one against one.
        let awards = q.award_scores(|id| *id != b);
        assert_eq!(award_of(&awards, a), 1);
        assert_eq!(award_of(&awards, b), 0);
        assert_eq!(award_of(&awards, c), 1);
        assert_eq!(q.scored_players(), &["alice".to_string(), "carol".to_string()]);
    }

    #[test]
    fn personalized_substitutes_names_and_resets_tally() {
        let mut q = question(2);
        q.record_vote(Uuid::new_v4(), "alice", CHOICE_A);

        let personal = q.personalized("Ada", "Grace");
        assert_eq!(
            personal.description,
            "Who is more likely to sleep in, Ada or Grace?"
        );
        assert_eq!(personal.choices, vec!["Ada".to_string(), "Grace".to_string()]);
        assert_eq!(personal.correct_choice, "Ada");
        assert_eq!(personal.voters().count(), 0);
        assert!(!personal.is_scored());
    }

    #[test]
    fn name_pair_is_distinct_when_possible() {
        let mut rng = rand::rng();
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        for _ in 0..50 {
            let (first, second) = pick_name_pair(&names, &mut rng).unwrap();
            assert_ne!(first, second);
        }

        let lone = vec!["solo".to_string()];
        assert_eq!(
            pick_name_pair(&lone, &mut rng),
            Some(("solo".to_string(), "solo".to_string()))
        );
        assert_eq!(pick_name_pair(&[], &mut rng), None);
    }
}
