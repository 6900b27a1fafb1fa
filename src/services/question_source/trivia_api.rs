use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use super::{ProviderError, ProviderResult, QuestionSource, normalize_records};
use crate::state::question::Question;

const DEFAULT_URL: &str = "https://the-trivia-api.com/api/questions";

/// The Trivia API client; answers with a bare array of camelCase records.
#[derive(Clone)]
pub struct TriviaApiSource {
    client: Client,
    base_url: Arc<str>,
}

impl TriviaApiSource {
    /// Build a client against `base_url` (the public endpoint when `None`).
    pub fn new(base_url: Option<&str>, timeout: Duration) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ProviderError::ClientBuilder { source })?;
        Ok(Self {
            client,
            base_url: Arc::from(base_url.unwrap_or(DEFAULT_URL)),
        })
    }

    async fn pull(client: Client, url: String, amount: usize) -> ProviderResult<Vec<Value>> {
        let response = client
            .get(&url)
            .query(&[("limit", amount)])
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { url, status });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|source| ProviderError::DecodeResponse {
                url: url.clone(),
                source,
            })?;
        serde_json::from_value(body).map_err(|source| ProviderError::Payload { source })
    }
}

impl QuestionSource for TriviaApiSource {
    fn fetch(&self, amount: usize) -> BoxFuture<'static, Vec<Question>> {
        let client = self.client.clone();
        let url = self.base_url.to_string();
        Box::pin(async move {
            match Self::pull(client, url.clone(), amount).await {
                Ok(records) => {
                    let questions = normalize_records(records, "the-trivia-api");
                    debug!(url = %url, count = questions.len(), "fetched questions from The Trivia API");
                    questions
                }
                Err(err) => {
                    error!(url = %url, error = %err, "could not fetch questions from The Trivia API");
                    Vec::new()
                }
            }
        })
    }
}
