use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Majority Wins Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::create_session,
        crate::routes::session::join_session,
        crate::routes::session::session_summary,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::SessionSummary,
            crate::dto::ws::PlayerAction,
            crate::dto::ws::ActionKind,
            crate::dto::ws::SessionSnapshot,
            crate::dto::ws::PlayerView,
            crate::dto::ws::QuestionView,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Game sessions and their WebSocket connections"),
    )
)]
pub struct ApiDoc;
