use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error used for transport causes and caller-registered error kinds.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad or ambiguous client metadata, or a provider that returned nothing usable.
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// The round trip itself failed (connect, timeout, broken body stream).
    #[error("Transport Error: {0}")]
    Transport(#[source] BoxError),

    /// Unsuccessful response with no error kind registered for its status.
    #[error("HTTP error ({status}): {message}")]
    RemoteStatus { status: u16, message: String },

    /// Unsuccessful response whose status was mapped to a caller-chosen error kind.
    #[error("{source}")]
    Mapped {
        status: u16,
        #[source]
        source: BoxError,
    },

    #[error("Decode Error: {0}")]
    Decode(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("call was cancelled")]
    Cancelled,

    #[error("timed out waiting for the call result")]
    Timeout,
}

impl Error {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Transport(err.into())
    }

    /// Status code of the response that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RemoteStatus { status, .. } | Error::Mapped { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Borrows the mapped error kind when it is an `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Error::Mapped { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("user missing: {0}")]
    struct UserMissing(String);

    #[test]
    fn test_remote_status_display() {
        let error = Error::RemoteStatus {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(format!("{}", error), "HTTP error (404): Not Found");
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn test_mapped_error_downcasts_to_its_kind() {
        let error = Error::Mapped {
            status: 404,
            source: Box::new(UserMissing("bingoo".to_string())),
        };
        assert_eq!(format!("{}", error), "user missing: bingoo");
        let kind = error.downcast_ref::<UserMissing>().expect("mapped kind");
        assert_eq!(kind.0, "bingoo");
        assert!(Error::Cancelled.downcast_ref::<UserMissing>().is_none());
    }

    #[test]
    fn test_transport_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error = Error::transport(io);
        assert!(matches!(error, Error::Transport(_)));
        assert!(StdError::source(&error).is_some());
        assert_eq!(error.status(), None);
    }
}
