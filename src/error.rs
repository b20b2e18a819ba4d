use std::path::PathBuf;
use thiserror::Error;

/// A rejected filter or task field. The message is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Task store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to access task store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed task store data: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Failed to {action}: {source}")]
    Http {
        action: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to {action}: {message}")]
    Rejected {
        action: &'static str,
        status: u16,
        message: String,
    },

    #[error("Failed to {action}: server response had no task data")]
    Malformed { action: &'static str },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}
