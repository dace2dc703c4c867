use thiserror::Error;

use crate::model::LoadMode;
use crate::pipeline::Stage;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("service key is not set (POLICY_SERVICE_KEY)")]
    MissingServiceKey,

    #[error("invalid table name {0:?}: expected a plain SQL identifier")]
    InvalidTable(String),

    #[error("failed to load env file: {0}")]
    EnvFile(#[from] dotenvy::Error),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Failure of a single (category, page) request. Never escalates past the fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}")]
    Status { status: u16 },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("inqCnt {value} is not a non-negative integer (url {url:?})")]
    InquiryCount { url: String, value: String },
}

#[derive(Error, Debug)]
#[error("{mode} write to table {table:?} failed: {source}")]
pub struct PersistError {
    pub mode: LoadMode,
    pub table: String,
    #[source]
    pub source: rusqlite::Error,
}

/// Fatal run failure, tagged with the stage that produced it.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Conversion(_) => Stage::Normalizing,
            PipelineError::Persist(_) => Stage::Persisting,
        }
    }
}
