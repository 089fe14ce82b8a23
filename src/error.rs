use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweeperError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("GitLab API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Invalid pagination header {header}: {value}")]
    InvalidPageHeader { header: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, SweeperError>;
