use std::{process::ExitStatus, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("provider address not provided and PROVIDER_ADDRESS not set")]
    MissingAddress,
    #[error("invalid explorer url: {0}")]
    ExplorerUrl(#[from] url::ParseError),
    #[error("agent run failed: {0}")]
    Agent(#[from] AgentError),
    #[error("no result was returned from the agent")]
    NoResult,
    #[error("error parsing agent result: {source}. Raw result: {raw}")]
    Parse {
        #[source]
        source: SnapshotError,
        raw: String,
    },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid metrics json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} must be a percentage in [0, 100], got {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to spawn agent command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("agent i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode agent request: {0}")]
    Request(#[from] serde_json::Error),
    #[error("agent run timed out after {0:?}")]
    Timeout(Duration),
    #[error("agent exited with {status}: {stderr}")]
    Exited { status: ExitStatus, stderr: String },
    #[error("agent output contained no result envelope: {0}")]
    Envelope(String),
    #[error("agent reported failure: {0}")]
    Reported(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("http client error: {0}")]
    Client(#[source] reqwest::Error),
    #[error("telegram request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("telegram returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}
