use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyError {
    #[error("Malformed object key '{key}': {reason}")]
    Malformed { key: String, reason: String },
}

impl KeyError {
    pub fn malformed(key: &str, reason: impl Into<String>) -> Self {
        KeyError::Malformed {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Time window is empty: end {end} is not after start {start}")]
    EmptyWindow { start: String, end: String },

    #[error("No products configured")]
    NoProducts,

    #[error("{0} already exists, pass --force to replace it")]
    AlreadyExists(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Unable to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}
