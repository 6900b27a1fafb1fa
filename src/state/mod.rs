pub mod driver;
pub mod hub;
pub mod participant;
pub mod question;
pub mod registry;
pub mod scene;
pub mod session;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    services::question_source::{self, QuestionSource},
};

use self::registry::SessionRegistry;

/// Shared handle on [`AppState`] passed to routes and services.
pub type SharedState = Arc<AppState>;

/// Central application state: configuration, live sessions and the question provider.
pub struct AppState {
    config: AppConfig,
    registry: SessionRegistry,
    questions: Arc<dyn QuestionSource>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`], using the configured question provider.
    pub fn new(config: AppConfig) -> SharedState {
        let questions = question_source::from_config(&config);
        Self::with_source(config, questions)
    }

    /// Construct the state around an explicit question source.
    pub fn with_source(config: AppConfig, questions: Arc<dyn QuestionSource>) -> SharedState {
        let registry = SessionRegistry::new(config.code_length(), config.reveal_dwell());
        Arc::new(Self {
            config,
            registry,
            questions,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of live sessions.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Provider used to fill new sessions.
    pub fn questions(&self) -> &Arc<dyn QuestionSource> {
        &self.questions
    }
}
