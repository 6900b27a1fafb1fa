use axum::{
    Json, Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    response::Response,
    routing::get,
};
use tracing::warn;
use validator::Validate;

use crate::{
    dto::session::{CreateSessionQuery, JoinSessionQuery, SessionSummary},
    error::AppError,
    services::{session_service, websocket_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/new",
    tag = "sessions",
    params(CreateSessionQuery),
    responses(
        (status = 101, description = "Session created; switching protocols to WebSocket"),
        (status = 400, description = "Invalid name or question count"),
    )
)]
/// Create a session and upgrade the caller into it as leader.
pub async fn create_session(
    State(state): State<SharedState>,
    Query(query): Query<CreateSessionQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    query.validate()?;
    let admission = session_service::create_session(&state, query).await?;

    let registry = state.registry().clone();
    let code = admission.session.code().to_string();
    let max = state.config().max_message_size();
    Ok(ws
        .max_message_size(max)
        .max_frame_size(max)
        .on_failed_upgrade(move |err| {
            warn!(session = %code, error = %err, "websocket upgrade failed; discarding session");
            registry.remove(&code);
        })
        .on_upgrade(move |socket| websocket_service::handle_socket(state, admission, socket)))
}

#[utoipa::path(
    get,
    path = "/join",
    tag = "sessions",
    params(JoinSessionQuery),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 404, description = "Unknown or finished session"),
        (status = 409, description = "Name already taken in this session"),
    )
)]
/// Upgrade the caller into an existing session.
pub async fn join_session(
    State(state): State<SharedState>,
    Query(query): Query<JoinSessionQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    query.validate()?;
    let admission = session_service::join_session(&state, query).await?;
    let max = state.config().max_message_size();
    Ok(ws
        .max_message_size(max)
        .max_frame_size(max)
        .on_upgrade(move |socket| websocket_service::handle_socket(state, admission, socket)))
}

#[utoipa::path(
    get,
    path = "/sessions/{code}",
    tag = "sessions",
    params(("code" = String, Path, description = "Join code")),
    responses(
        (status = 200, description = "Session summary", body = SessionSummary),
        (status = 404, description = "Unknown session"),
    )
)]
/// Diagnostic view of a registered session.
pub async fn session_summary(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::session_summary(&state, &code).await?;
    Ok(Json(summary))
}

/// Configure the session endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/new", get(create_session))
        .route("/join", get(join_session))
        .route("/sessions/{code}", get(session_summary))
}
