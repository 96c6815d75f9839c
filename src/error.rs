//! Top-level error types for relaybot.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),
}

/// Completion provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no messages to send to the completion provider")]
    NoInput,

    #[error("provider request failed: {0}")]
    ProviderRequest(String),

    #[error("empty response from provider: {0}")]
    EmptyResponse(String),

    #[error("all {attempts} completion attempts failed, last error: {last_error}")]
    Exhausted { attempts: usize, last_error: String },
}

/// Messaging platform errors.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("{platform} request failed: {message}")]
    Request { platform: String, message: String },

    #[error("invalid target {0}")]
    InvalidTarget(String),
}
