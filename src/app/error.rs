use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum ChirpError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timeline fetch failed: {0}")]
    Fetch(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Invalid link span {start}..{end} for text of length {len}: {reason}")]
    InvalidSpan {
        start: usize,
        end: usize,
        len: usize,
        reason: &'static str,
    },

    #[error("Email send failed: {0}")]
    Send(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Another run holds the checkpoint lock at {0}")]
    Locked(PathBuf),
}

pub type Result<T> = std::result::Result<T, ChirpError>;
