//! Error types for flagsolve-core

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using flagsolve Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for flagsolve
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(flagsolve::config))]
    Config(String),

    #[error("Sandbox unavailable: {0}")]
    #[diagnostic(code(flagsolve::sandbox_unavailable))]
    SandboxUnavailable(String),

    #[error("Sandbox error: {0}")]
    #[diagnostic(code(flagsolve::sandbox))]
    Sandbox(#[from] bollard::errors::Error),

    #[error("Provider error: {0}")]
    #[diagnostic(code(flagsolve::provider))]
    Provider(String),

    #[error("HTTP error: {0}")]
    #[diagnostic(code(flagsolve::http))]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(flagsolve::database))]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(flagsolve::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(flagsolve::serde))]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    #[diagnostic(code(flagsolve::toml))]
    Toml(#[from] toml::de::Error),

    #[error("Agent error: {0}")]
    #[diagnostic(code(flagsolve::agent))]
    Agent(String),

    #[error("Session not found: {0}")]
    #[diagnostic(code(flagsolve::session))]
    SessionNotFound(String),
}
