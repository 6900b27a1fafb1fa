/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Question providers feeding new sessions.
pub mod question_source;
/// Periodic sweep of finished sessions.
pub mod reclaim;
/// Session creation, admission and lookup.
pub mod session_service;
/// WebSocket connection pump.
pub mod websocket_service;
