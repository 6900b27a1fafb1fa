//! Application-level configuration loading: question provider, session sizing and connection timings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MAJORITY_WINS_CONFIG_PATH";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Which trivia provider feeds new sessions.
pub enum ProviderKind {
    /// Open Trivia Database.
    #[default]
    OpenTdb,
    /// The Trivia API.
    TheTriviaApi,
    /// JSON pool read from [`AppConfig::questions_file`].
    File,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    default_question_count: usize,
    max_question_count: usize,
    question_pool_size: usize,
    provider: ProviderKind,
    provider_url: Option<String>,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "provider_timeout_ms")]
    provider_timeout: Duration,
    questions_file: Option<PathBuf>,
    outbound_queue_capacity: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "reveal_dwell_ms")]
    reveal_dwell: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "idle_read_timeout_ms")]
    idle_read_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "keepalive_interval_ms")]
    keepalive_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "write_timeout_ms")]
    write_timeout: Duration,
    max_message_size: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "reclaim_interval_ms")]
    reclaim_interval: Duration,
    code_length: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        provider = ?config.provider,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(contents)?;
        Ok(config.sanitized())
    }

    /// Clamp values that would make the server unusable.
    fn sanitized(mut self) -> Self {
        self.max_question_count = self.max_question_count.max(1);
        self.default_question_count = self
            .default_question_count
            .clamp(1, self.max_question_count);
        self.outbound_queue_capacity = self.outbound_queue_capacity.max(1);
        self.code_length = self.code_length.max(1);
        self
    }

    /// Game length used when the creator does not ask for one.
    pub fn default_question_count(&self) -> usize {
        self.default_question_count
    }

    /// Largest game length accepted on create.
    pub fn max_question_count(&self) -> usize {
        self.max_question_count
    }

    /// Number of records pulled from the provider for each new session.
    pub fn question_pool_size(&self) -> usize {
        self.question_pool_size
    }

    /// Configured provider.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Endpoint override for the remote providers.
    pub fn provider_url(&self) -> Option<&str> {
        self.provider_url.as_deref()
    }

    /// HTTP timeout applied to provider requests.
    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout
    }

    /// Path of the JSON pool used by the file provider.
    pub fn questions_file(&self) -> Option<&PathBuf> {
        self.questions_file.as_ref()
    }

    /// Bound of each participant's outbound queue.
    pub fn outbound_queue_capacity(&self) -> usize {
        self.outbound_queue_capacity
    }

    /// Time spent in the reveal scene before moving on.
    pub fn reveal_dwell(&self) -> Duration {
        self.reveal_dwell
    }

    /// Longest silence tolerated from a client.
    pub fn idle_read_timeout(&self) -> Duration {
        self.idle_read_timeout
    }

    /// Period of outbound keepalive pings.
    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }

    /// Upper bound for a single socket write.
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Largest inbound frame accepted, in bytes.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Period of the inactive-session sweep.
    pub fn reclaim_interval(&self) -> Duration {
        self.reclaim_interval
    }

    /// Length of generated session codes.
    pub fn code_length(&self) -> usize {
        self.code_length
    }

    /// Override the reveal dwell.
    pub fn with_reveal_dwell(mut self, dwell: Duration) -> Self {
        self.reveal_dwell = dwell;
        self
    }

    /// Override the connection timings.
    pub fn with_timings(mut self, idle_read: Duration, keepalive: Duration, write: Duration) -> Self {
        self.idle_read_timeout = idle_read;
        self.keepalive_interval = keepalive;
        self.write_timeout = write;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_question_count: 15,
            max_question_count: 50,
            question_pool_size: 15,
            provider: ProviderKind::default(),
            provider_url: None,
            provider_timeout: Duration::from_secs(10),
            questions_file: None,
            outbound_queue_capacity: 256,
            reveal_dwell: Duration::from_secs(15),
            idle_read_timeout: Duration::from_secs(60),
            keepalive_interval: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            max_message_size: 512,
            reclaim_interval: Duration::from_secs(30),
            code_length: 4,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
