use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the TLS session builder and the custom query serializer
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or contradictory connection configuration, detected before any
    /// connection attempt
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A credential file could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed PEM or key material
    #[error("cannot parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// The client certificate and private key were rejected as a pair
    #[error("invalid client certificate/key pair: {0}")]
    KeyPair(#[source] rustls::Error),

    /// Fewer parameters than the query handler needs
    #[error("invalid number of parameters")]
    InvalidParams,

    /// Query execution or row scanning failed
    #[error("cannot fetch data: {0}")]
    Fetch(#[source] sqlx::Error),

    /// The query ran but the backend reported that it produced no rows
    #[error("empty result: {0}")]
    EmptyResult(#[source] sqlx::Error),

    /// A row could not be encoded as JSON
    #[error("cannot marshal row: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the query executed and the backend signaled that nothing was
    /// returned, as opposed to a failure to execute
    #[must_use]
    pub const fn is_empty_result(&self) -> bool {
        matches!(self, Self::EmptyResult(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
