//! Query strings and bodies of the session endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Longest display name accepted, in characters.
pub const MAX_NAME_LENGTH: u64 = 32;

/// Query of `GET /new`.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct CreateSessionQuery {
    /// Display name of the creator; a default is assigned when empty.
    #[serde(default)]
    #[validate(length(max = MAX_NAME_LENGTH))]
    pub name: String,
    /// Number of questions to play.
    #[validate(range(min = 1))]
    pub questions: Option<usize>,
}

/// Query of `GET /join`.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct JoinSessionQuery {
    /// Join code of the session.
    #[validate(length(min = 1))]
    pub room: String,
    /// Display name; a default is assigned when empty.
    #[serde(default)]
    #[validate(length(max = MAX_NAME_LENGTH))]
    pub name: String,
}

/// Diagnostic view of a live session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    pub code: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    pub participants: usize,
    /// Scene ordinal: 0 not started, 1 asking, 2 revealing, 3 over.
    pub scene: u8,
    pub current_question: usize,
    pub alive: bool,
}
