use thiserror::Error;

/// The error taxonomy shared by every service: callers match on variant
/// rather than parse strings.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("service is not running")]
    NotRunning,

    #[error("hardware I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out")]
    Timeout,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
