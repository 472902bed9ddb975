use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A cache file line or a hash listing line which can't be read
    #[error("Format error: {0}")]
    Format(String),
    /// A listed path which is not under the requested base directory
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Invalid file path: {0:?}")]
    InvalidPath(String),
    #[error("Command failed: {command} ({status})")]
    CommandFailed { command: String, status: String },
    #[error("Io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn command_failed(command: impl Into<String>, status: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            status: status.into(),
        }
    }
}
