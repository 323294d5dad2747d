//! Unified error type.

use std::fmt;

/// The error type returned by tether's fallible operations.
///
/// Application-level outcomes (404, an aborted request, a redirect) are
/// expressed as [`Response`](crate::Response) values or abort signals, not as
/// `Error`s. This type surfaces infrastructure failures: binding a port,
/// misusing the outbound wrapper, or a failed outbound call.
#[derive(Debug)]
pub enum Error {
    /// Binding to a port or accepting a connection failed.
    Io(std::io::Error),
    /// The outbound wrapper was given no request.
    InvalidRequest,
    /// The outbound wrapper was given no client.
    InvalidClient,
    /// The delegated HTTP call failed. The transport's own error is the
    /// [`source`](std::error::Error::source).
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::InvalidRequest => f.write_str("invalid request"),
            Self::InvalidClient => f.write_str("invalid client"),
            Self::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Transport(e) => Some(&**e),
            Self::InvalidRequest | Self::InvalidClient => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
