use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use rand::seq::SliceRandom;
use serde_json::Value;
use tracing::{debug, error};

use super::{ProviderError, ProviderResult, QuestionSource, normalize_records};
use crate::state::question::Question;

/// Pool stored on disk as a JSON array of provider records.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Read records from `path` on every fetch.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_records(path: &Path) -> ProviderResult<Vec<Value>> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ProviderError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&contents).map_err(|source| ProviderError::Payload { source })
    }
}

impl QuestionSource for FileSource {
    fn fetch(&self, amount: usize) -> BoxFuture<'static, Vec<Question>> {
        let path = self.path.clone();
        Box::pin(async move {
            let records = match Self::read_records(&path).await {
                Ok(records) => records,
                Err(err) => {
                    error!(path = %path.display(), error = %err, "failed to load questions file");
                    return Vec::new();
                }
            };

            let mut questions = normalize_records(records, "file");
            questions.shuffle(&mut rand::rng());
            questions.truncate(amount);
            debug!(path = %path.display(), count = questions.len(), "loaded questions from file");
            questions
        })
    }
}
