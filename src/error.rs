use std::io;
use std::path::Path;

use thiserror::Error;

/// Failures a session or the startup path can run into.
#[derive(Error, Debug)]
pub enum Error {
    /// Peer closed the connection, or the socket failed while reading or writing.
    #[error("connection error: {0}")]
    Connection(#[source] io::Error),

    /// The capture could not be stored. Only the current session is affected.
    #[error("persistence error ({context}): {source}")]
    Persistence {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Bad startup state; fatal for the process.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn persistence(context: impl Into<String>, source: io::Error) -> Self {
        Error::Persistence {
            context: context.into(),
            source,
        }
    }

    pub fn persistence_at(action: &str, path: &Path, source: io::Error) -> Self {
        Error::Persistence {
            context: format!("{} {:?}", action, path),
            source,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
