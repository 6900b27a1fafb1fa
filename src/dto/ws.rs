use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Actions a participant can perform over its WebSocket.
pub enum ActionKind {
    /// Vote on the current question (`value` is the chosen option, 1 or 2).
    Vote,
    /// Start the game (leader only).
    Start,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Inbound frame sent by a participant, one action per message.
pub struct PlayerAction {
    pub action: ActionKind,
    #[serde(default)]
    pub value: i64,
}

impl PlayerAction {
    /// Parse a text frame into an action; unknown actions are rejected.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Public projection of a participant.
pub struct PlayerView {
    pub name: String,
    pub score: u32,
    pub is_leader: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Viewer-safe projection of a question.
pub struct QuestionView {
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub description: String,
    pub choices: Vec<String>,
    pub reward: u32,
    /// Only present once the question has been revealed.
    pub correct_choice: Option<String>,
    /// Names of participants who already voted.
    pub answers: Vec<String>,
    /// Names of participants who gained points on this question.
    pub scored_players: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Full session state pushed to every participant after each change.
pub struct SessionSnapshot {
    pub id: String,
    pub players: Vec<PlayerView>,
    pub questions: Vec<QuestionView>,
    pub current_question: usize,
    /// Scene ordinal: 0 not started, 1 asking, 2 revealing, 3 over.
    pub scene: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vote_and_start() {
        let vote = PlayerAction::from_json_str(r#"{"action":"Vote","value":2}"#).unwrap();
        assert_eq!(vote.action, ActionKind::Vote);
        assert_eq!(vote.value, 2);

        let start = PlayerAction::from_json_str(r#"{"action":"Start"}"#).unwrap();
        assert_eq!(start.action, ActionKind::Start);
        assert_eq!(start.value, 0);
    }

    #[test]
    fn rejects_unknown_actions_and_garbage() {
        assert!(PlayerAction::from_json_str(r#"{"action":"Kick","value":1}"#).is_err());
        assert!(PlayerAction::from_json_str("not json").is_err());
        assert!(PlayerAction::from_json_str(r#"{"value":1}"#).is_err());
    }

    #[test]
    fn player_view_uses_client_field_names() {
        let view = PlayerView {
            name: "alice".into(),
            score: 3,
            is_leader: true,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["isLeader"], true);
        assert_eq!(json["score"], 3);
    }
}
