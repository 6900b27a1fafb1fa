use tracing::{info, warn};

use crate::{
    dto::{
        format_system_time,
        session::{CreateSessionQuery, JoinSessionQuery, SessionSummary},
    },
    error::ServiceError,
    state::{SharedState, registry::SessionHandle},
};

/// A connection cleared to enter a session, pending the WebSocket upgrade.
#[derive(Debug, Clone)]
pub struct Admission {
    /// Session to register with.
    pub session: SessionHandle,
    /// Trimmed display name; empty means "assign a default".
    pub name: String,
    /// Whether the connection created the session.
    pub is_leader: bool,
}

/// Create a session filled from the configured provider and admit its creator as leader.
pub async fn create_session(
    state: &SharedState,
    query: CreateSessionQuery,
) -> Result<Admission, ServiceError> {
    let config = state.config();
    let target = query
        .questions
        .unwrap_or_else(|| config.default_question_count());
    if target == 0 || target > config.max_question_count() {
        return Err(ServiceError::InvalidInput(format!(
            "questions must be between 1 and {}",
            config.max_question_count()
        )));
    }

    let pool = state
        .questions()
        .fetch(config.question_pool_size().max(target))
        .await;
    if pool.is_empty() {
        warn!("question provider returned no questions; the session cannot start");
    }

    let session = state.registry().create(pool, target);
    Ok(Admission {
        session,
        name: query.name.trim().to_string(),
        is_leader: true,
    })
}

/// Admit a connection into an existing session.
///
/// Reclaims dead sessions first; unknown or finished sessions and taken names are refused.
pub async fn join_session(
    state: &SharedState,
    query: JoinSessionQuery,
) -> Result<Admission, ServiceError> {
    let reclaimed = state.registry().sweep();
    if reclaimed > 0 {
        info!(reclaimed, "reclaimed inactive sessions on join");
    }

    let code = normalize_code(&query.room);
    let session = state
        .registry()
        .get(&code)
        .filter(SessionHandle::is_alive)
        .ok_or_else(|| ServiceError::NotFound(format!("session {code}")))?;

    let name = query.name.trim().to_string();
    if !name.is_empty() && session.roster().await?.contains(&name) {
        return Err(ServiceError::NameTaken(name));
    }

    Ok(Admission {
        session,
        name,
        is_leader: false,
    })
}

/// Diagnostic summary of a live session.
pub async fn session_summary(
    state: &SharedState,
    code: &str,
) -> Result<SessionSummary, ServiceError> {
    let code = normalize_code(code);
    let session = state
        .registry()
        .get(&code)
        .ok_or_else(|| ServiceError::NotFound(format!("session {code}")))?;

    let progress = session.progress();
    let participants = if session.is_alive() {
        session.roster().await.map(|names| names.len()).unwrap_or(0)
    } else {
        0
    };

    Ok(SessionSummary {
        code,
        created_at: format_system_time(session.created_at()),
        participants,
        scene: progress.scene.ordinal(),
        current_question: progress.current_index,
        alive: session.is_alive(),
    })
}

/// Codes are generated upper-case; accept any case and surrounding whitespace.
fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
