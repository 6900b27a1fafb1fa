use thiserror::Error;

/// Phases a session moves through.
///
/// The ordinal of each variant is what clients receive in the `scene` field of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scene {
    /// Lobby: participants gather until the leader starts the game.
    #[default]
    NotStarted,
    /// The current question is open for votes.
    Asking,
    /// Votes are closed, scores have been applied and the result is on display.
    Revealing,
    /// Every question has been played.
    Over,
}

impl Scene {
    /// Wire ordinal of the scene (`0..=3`).
    pub fn ordinal(self) -> u8 {
        match self {
            Scene::NotStarted => 0,
            Scene::Asking => 1,
            Scene::Revealing => 2,
            Scene::Over => 3,
        }
    }

    /// Whether a leader's start request can be honoured from this scene.
    pub fn accepts_start(self) -> bool {
        matches!(self, Scene::NotStarted)
    }
}

/// Events that move the scene machine forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    /// The leader started the game.
    Start,
    /// Every connected participant voted on the current question.
    VotesComplete,
    /// The reveal dwell elapsed and another question remains.
    NextQuestion,
    /// The reveal dwell elapsed on the last question.
    Finish,
}

/// Error returned when an event cannot be applied from the current scene.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Scene the machine was in when the event was received.
    pub from: Scene,
    /// Rejected event.
    pub event: SceneEvent,
}

/// Progression state owned by the scene driver and published to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneProgress {
    /// Current scene.
    pub scene: Scene,
    /// Index of the question being asked or revealed.
    pub current_index: usize,
    /// False once the session has no further work and can be reclaimed.
    pub alive: bool,
}

impl Default for SceneProgress {
    fn default() -> Self {
        Self {
            scene: Scene::NotStarted,
            current_index: 0,
            alive: true,
        }
    }
}

impl SceneProgress {
    /// Compute the progression that results from applying `event`.
    ///
    /// Once `alive` is false nothing moves any more, whatever the scene.
    pub fn next(self, event: SceneEvent) -> Result<SceneProgress, InvalidTransition> {
        let invalid = InvalidTransition {
            from: self.scene,
            event,
        };
        if !self.alive {
            return Err(invalid);
        }

        let next = match (self.scene, event) {
            (Scene::NotStarted, SceneEvent::Start) => SceneProgress {
                scene: Scene::Asking,
                current_index: 0,
                alive: true,
            },
            (Scene::Asking, SceneEvent::VotesComplete) => SceneProgress {
                scene: Scene::Revealing,
                ..self
            },
            (Scene::Revealing, SceneEvent::NextQuestion) => SceneProgress {
                scene: Scene::Asking,
                current_index: self.current_index + 1,
                alive: true,
            },
            (Scene::Revealing, SceneEvent::Finish) => SceneProgress {
                scene: Scene::Over,
                current_index: self.current_index,
                alive: false,
            },
            _ => return Err(invalid),
        };

        Ok(next)
    }

    /// Whether the correct answer of question `index` may be shown to clients.
    pub fn reveals(&self, index: usize) -> bool {
        match self.scene {
            Scene::NotStarted => false,
            Scene::Asking => index < self.current_index,
            Scene::Revealing | Scene::Over => index <= self.current_index,
        }
    }

    /// Copy of the progression with `alive` cleared, scene left untouched.
    pub fn abandoned(self) -> SceneProgress {
        SceneProgress {
            alive: false,
            ..self
        }
    }
}
