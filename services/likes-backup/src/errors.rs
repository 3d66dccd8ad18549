//!
//! src/errors.rs  Andrew Belles  Oct 17th, 2026
//!
//! Defines enums and methods of error conversion
//! for errors the backup service uses
//!
//!

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("config error: {0}")]
    Config(String),
    #[error("snapshot not found: {}", .0.display())]
    SnapshotNotFound(PathBuf),
    #[error("snapshot malformed: {0}")]
    SnapshotMalformed(String),
    #[error("remote fetch failed: {0}")]
    RemoteFetchFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl From<reqwest::Error> for BackupError {
    fn from(e: reqwest::Error) -> Self { BackupError::RemoteFetchFailed(e.to_string()) }
}

impl From<serde_json::Error> for BackupError {
    fn from(e: serde_json::Error) -> Self { BackupError::RemoteFetchFailed(e.to_string()) }
}
