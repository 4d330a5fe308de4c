use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipedashError {
    #[error("GitLab API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Not logged in: run `pipedash login` or set GITLAB_TOKEN")]
    NotAuthenticated,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid session file: {0}")]
    Import(String),

    #[error("Pin index {index} is out of range for {len} pinned projects")]
    InvalidPinIndex { index: usize, len: usize },

    #[error("Project {0} is not on the dashboard")]
    ProjectNotFound(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipedashError>;
