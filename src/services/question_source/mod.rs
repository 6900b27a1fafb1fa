//! Question pools: the provider abstraction and the shared record normalization.

mod error;
mod file;
#[cfg(feature = "remote-sources")]
mod open_tdb;
#[cfg(feature = "remote-sources")]
mod trivia_api;

use std::sync::Arc;

use futures::future::BoxFuture;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::{
    config::{AppConfig, ProviderKind},
    state::question::Question,
};

pub use self::error::{ProviderError, ProviderResult};
pub use self::file::FileSource;
#[cfg(feature = "remote-sources")]
pub use self::open_tdb::OpenTdbSource;
#[cfg(feature = "remote-sources")]
pub use self::trivia_api::TriviaApiSource;

/// Supplier of question pools for new sessions.
///
/// Implementations never fail: problems are logged and whatever could be parsed is returned.
pub trait QuestionSource: Send + Sync {
    /// Pull up to `amount` questions.
    fn fetch(&self, amount: usize) -> BoxFuture<'static, Vec<Question>>;
}

/// Fixed in-memory pool, handed out in its original order.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    questions: Arc<Vec<Question>>,
}

impl StaticSource {
    /// Serve `questions` to every session.
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions: Arc::new(questions),
        }
    }
}

impl QuestionSource for StaticSource {
    fn fetch(&self, amount: usize) -> BoxFuture<'static, Vec<Question>> {
        let questions = self.questions.iter().take(amount).cloned().collect();
        Box::pin(async move { questions })
    }
}

/// Build the source selected by the configuration.
///
/// A remote source that cannot be constructed degrades to an empty pool so the server still starts.
pub fn from_config(config: &AppConfig) -> Arc<dyn QuestionSource> {
    match config.provider() {
        ProviderKind::File => match config.questions_file() {
            Some(path) => Arc::new(FileSource::new(path.clone())),
            None => {
                error!(error = %ProviderError::MissingFile, "file provider selected without a path");
                Arc::new(StaticSource::default())
            }
        },
        #[cfg(feature = "remote-sources")]
        ProviderKind::OpenTdb => {
            match OpenTdbSource::new(config.provider_url(), config.provider_timeout()) {
                Ok(source) => Arc::new(source),
                Err(err) => {
                    error!(error = %err, "failed to build OpenTDB source");
                    Arc::new(StaticSource::default())
                }
            }
        }
        #[cfg(feature = "remote-sources")]
        ProviderKind::TheTriviaApi => {
            match TriviaApiSource::new(config.provider_url(), config.provider_timeout()) {
                Ok(source) => Arc::new(source),
                Err(err) => {
                    error!(error = %err, "failed to build Trivia API source");
                    Arc::new(StaticSource::default())
                }
            }
        }
        #[cfg(not(feature = "remote-sources"))]
        remote => {
            warn!(provider = ?remote, "remote providers are disabled in this build");
            Arc::new(StaticSource::default())
        }
    }
}

/// Provider record, in either the snake_case or the camelCase dialect.
#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    category: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    difficulty: String,
    question: String,
    #[serde(alias = "correctAnswer")]
    correct_answer: String,
    #[serde(alias = "incorrectAnswers", default)]
    incorrect_answers: Vec<String>,
}

impl RawQuestion {
    fn into_question(self) -> Question {
        let mut choices: Vec<String> = self
            .incorrect_answers
            .iter()
            .map(|answer| unescape(answer))
            .collect();
        let correct = unescape(&self.correct_answer);
        choices.push(correct.clone());
        choices.shuffle(&mut rand::rng());

        let reward = reward_for(&self.difficulty, &self.kind);
        Question::new(
            self.category,
            self.kind,
            unescape(&self.question),
            choices,
            correct,
            reward,
        )
    }
}

fn unescape(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Points for a question: easy 1, medium 2, hard 3; true/false questions are worth one less.
pub fn reward_for(difficulty: &str, kind: &str) -> u32 {
    let base = match difficulty {
        "medium" => 2,
        "hard" => 3,
        _ => 1,
    };
    if kind == "boolean" {
        (base - 1).max(1)
    } else {
        base
    }
}

/// Normalize raw records one at a time so a malformed entry does not sink the pool.
fn normalize_records(records: Vec<Value>, origin: &str) -> Vec<Question> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<RawQuestion>(record) {
            Ok(raw) => Some(raw.into_question()),
            Err(err) => {
                warn!(origin, error = %err, "skipping malformed question record");
                None
            }
        })
        .collect()
}
