use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CapscanError>;

#[derive(Error, Debug)]
pub enum CapscanError {
    #[error("Unsupported pattern shape `{kind}` in {file}")]
    UnsupportedPattern { kind: String, file: String },

    #[error("Missing package manifest: {0}")]
    MissingManifest(PathBuf),

    #[error("Lockfile error: {0}")]
    Lockfile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CapscanError {
    pub fn exit_code(&self) -> i32 {
        2
    }
}
