//! Typed failures for the engine components.
//!
//! Only [`DownloadError`] crosses the
//! [`SessionEngine`](crate::session::SessionEngine) boundary; the others are
//! logged there and degrade to `None`, `false` or `0`.

use std::path::PathBuf;
use thiserror::Error;

use crate::Identity;

/// Soft failure of an upstream catalog request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request timed out")]
    Timeout,

    #[error("could not connect to upstream: {0}")]
    Connection(String),

    #[error("upstream answered HTTP {0} after GET and POST")]
    Status(u16),

    #[error("upstream answered with an empty body")]
    EmptyBody,

    #[error("upstream request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Timeouts and connection drops are worth retrying later; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connection(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("could not create temporary playlist in {dir}: {source}")]
    Create {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write playlist: {0}")]
    Write(#[from] std::io::Error),

    #[error("could not move playlist into {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("identity {0} is not allowed to download")]
    NotAllowed(Identity),

    #[error("channels cannot be downloaded")]
    UnsupportedKind,

    #[error("download request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("download answered HTTP {0}")]
    Status(u16),

    #[error("download exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("download i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
