//! Error types for environment loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading environment sources.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A file registered with [`EnvLoader::use_file`](crate::EnvLoader::use_file)
    /// does not exist.
    #[error("env file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file exists but is not valid dotenv syntax.
    #[error("invalid env file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Convenience alias for results with [`EnvError`].
pub type Result<T> = std::result::Result<T, EnvError>;
