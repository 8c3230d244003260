use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Load(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Content source misconfigured: {0}")]
    Config(String),
    #[error("Failed to read question bank file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to fetch question bank from {url}: {source}")]
    HttpFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to parse question bank: {0}")]
    Parse(String),
    #[error("Question bank contains no usable questions")]
    EmptyBank,
    #[error("Question '{question}' has an invalid video id '{video_id}'")]
    InvalidVideoId { question: String, video_id: String },
    #[error("Generated options are missing the correct answer '{answer}'")]
    CorrectOptionMissing { answer: String },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Content error: {0}")]
    Content(#[from] ContentError),
    #[error("Web server/handler error: {0}")]
    Web(#[from] crate::web::WebError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
