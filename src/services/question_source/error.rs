//! Failures raised while pulling a question pool.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias returning [`ProviderError`] failures.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failures that can occur while talking to a question provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[cfg(feature = "remote-sources")]
    #[error("failed to build provider client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent.
    #[cfg(feature = "remote-sources")]
    #[error("failed to query provider `{url}`")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The provider answered with an unexpected status code.
    #[cfg(feature = "remote-sources")]
    #[error("unexpected provider status {status} for `{url}`")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    /// The response body could not be read as JSON.
    #[cfg(feature = "remote-sources")]
    #[error("failed to decode provider response from `{url}`")]
    DecodeResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The provider reported a failure inside an otherwise valid payload.
    #[error("provider returned response code {code}")]
    ResponseCode { code: i64 },
    /// The payload does not have the expected outer shape.
    #[error("unexpected provider payload")]
    Payload {
        #[source]
        source: serde_json::Error,
    },
    /// No pool file was configured for the file provider.
    #[error("no questions file configured")]
    MissingFile,
    /// The pool file could not be read.
    #[error("failed to read questions file `{}`", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
