use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use super::{ProviderError, ProviderResult, QuestionSource, normalize_records};
use crate::state::question::Question;

const DEFAULT_URL: &str = "https://opentdb.com/api.php";
const GENERAL_KNOWLEDGE: u32 = 9;

/// Open Trivia Database client.
#[derive(Clone)]
pub struct OpenTdbSource {
    client: Client,
    base_url: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct OpenTdbResponse {
    response_code: i64,
    #[serde(default)]
    results: Vec<Value>,
}

impl OpenTdbSource {
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
            .query(&[
                ("amount", amount.to_string()),
                ("category", GENERAL_KNOWLEDGE.to_string()),
                ("type", "multiple".to_string()),
            ])
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
        let payload: OpenTdbResponse =
            serde_json::from_value(body).map_err(|source| ProviderError::Payload { source })?;

        if payload.response_code != 0 && payload.results.is_empty() {
            return Err(ProviderError::ResponseCode {
                code: payload.response_code,
            });
        }
        Ok(payload.results)
    }
}

impl QuestionSource for OpenTdbSource {
    fn fetch(&self, amount: usize) -> BoxFuture<'static, Vec<Question>> {
        let client = self.client.clone();
        let url = self.base_url.to_string();
        Box::pin(async move {
            match Self::pull(client, url.clone(), amount).await {
                Ok(records) => {
                    let questions = normalize_records(records, "opentdb");
                    debug!(url = %url, count = questions.len(), "fetched questions from OpenTDB");
                    questions
                }
                Err(err) => {
                    error!(url = %url, error = %err, "could not fetch questions from OpenTDB");
                    Vec::new()
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, extract::Query, routing::get};
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}/api.php")
    }

    #[tokio::test]
    async fn parses_results_and_forwards_the_amount() {
        let router = Router::new().route(
            "/api.php",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let amount: usize = params["amount"].parse().unwrap();
                assert_eq!(params["category"], "9");
                let results: Vec<_> = (0..amount)
                    .map(|i| {
                        json!({
                            "category": "General Knowledge",
                            "type": "multiple",
                            "difficulty": "easy",
                            "question": format!("Question &#039;{i}&#039;"),
                            "correct_answer": "A",
                            "incorrect_answers": ["B", "C", "D"]
                        })
                    })
                    .collect();
                Json(json!({ "response_code": 0, "results": results }))
            }),
        );
        let url = serve(router).await;

        let source = OpenTdbSource::new(Some(&url), Duration::from_secs(5)).unwrap();
        let questions = source.fetch(2).await;
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].description, "Question '0'");
        assert_eq!(questions[0].reward, 1);
    }

    #[tokio::test]
    async fn provider_failures_yield_an_empty_pool() {
        let router = Router::new().route(
            "/api.php",
            get(|| async { Json(json!({ "response_code": 1, "results": [] })) }),
        );
        let url = serve(router).await;
        let source = OpenTdbSource::new(Some(&url), Duration::from_secs(5)).unwrap();
        assert!(source.fetch(5).await.is_empty());

        let unreachable =
            OpenTdbSource::new(Some("http://127.0.0.1:1/api.php"), Duration::from_secs(1)).unwrap();
        assert!(unreachable.fetch(5).await.is_empty());
    }
}
