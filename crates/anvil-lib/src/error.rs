use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by the install and launch pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed coordinate, unparsable manifest or missing manifest entry.
    #[error("format error: {0}")]
    Format(String),

    /// A required file could not be read or written, or a process could not be spawned.
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required library could not be fetched.
    #[error("failed to fetch required library {name}")]
    Transfer {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A launch precondition was violated.
    #[error("invalid launch options: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn format(message: impl Into<String>) -> Self {
        Error::Format(message.into())
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Format(format!("invalid JSON: {}", err))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Format(format!("invalid archive: {}", err))
    }
}

/// Attach a path to a raw `std::io::Error`.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
