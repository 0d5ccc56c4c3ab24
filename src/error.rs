use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Calendar source unavailable: {0}")]
    #[diagnostic(code(harvester::source_unavailable))]
    SourceUnavailable(String),

    #[error("Parse error: {0}")]
    #[diagnostic(code(harvester::parse))]
    Parse(String),

    #[error("Enrichment error: {0}")]
    #[diagnostic(code(harvester::enrichment))]
    Enrichment(String),

    #[error("Datastore error: {0}")]
    #[diagnostic(code(harvester::persistence))]
    Persistence(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(harvester::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(harvester::config))]
    Config(String),

    #[error(transparent)]
    #[diagnostic(code(harvester::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(harvester::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(harvester::other))]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create calendar source errors
pub fn source_error(message: &str) -> Error {
    Error::SourceUnavailable(message.to_string())
}

pub fn parse_error(message: &str) -> Error {
    Error::Parse(message.to_string())
}

/// Helper to create detail enrichment errors
pub fn enrichment_error(message: &str) -> Error {
    Error::Enrichment(message.to_string())
}

/// Helper to create datastore errors
pub fn persistence_error(message: &str) -> Error {
    Error::Persistence(message.to_string())
}
