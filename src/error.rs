//! Error types used in the [`structured_tensor`](crate) crate.

use crate::alloc::String;

/// Structured tensor error type.
///
/// Every variant carries a diagnostic message naming the offending field, axis or key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub enum Error {
    /// An argument is of the wrong kind for the operation, for example a field value that can not be
    /// converted to a tensor.
    InvalidType(String),
    /// User provided an invalid argument, for example a shape with unknown rank, a disallowed field name or
    /// axes in the wrong order.
    InvalidArgument(String),
    /// Statically known shape information is inconsistent, detected at construction time.
    Incompatible(String),
    /// A deferred runtime check failed while evaluating a value.
    CheckFailed(String),
    /// Requested field or key could not be found.
    NotFound(String),
    /// The value is in an invalid state for the operation.
    InvalidState(String),
}
impl Error {
    /// Returns the diagnostic message of the error.
    pub fn message(&self) -> &str {
        match self {
            Error::InvalidType(msg)
            | Error::InvalidArgument(msg)
            | Error::Incompatible(msg)
            | Error::CheckFailed(msg)
            | Error::NotFound(msg)
            | Error::InvalidState(msg) => msg,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Error::InvalidType(_) => "InvalidType",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::Incompatible(_) => "Incompatible",
            Error::CheckFailed(_) => "CheckFailed",
            Error::NotFound(_) => "NotFound",
            Error::InvalidState(_) => "InvalidState",
        }
    }
}
impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}: {}", self.kind(), self.message())
    }
}
#[cfg(any(error_in_core, feature = "std"))]
impl std::error::Error for Error {}

/// Result type of all fallible operations in the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use crate::alloc::{String, ToString};

    use super::Error;

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }

    #[test]
    fn display() {
        let err = Error::NotFound(String::from("'b'"));
        assert_eq!(err.to_string(), "NotFound: 'b'");
        assert_eq!(err.message(), "'b'");

        let err = Error::CheckFailed(String::from("incompatible row_splits"));
        assert_eq!(err.to_string(), "CheckFailed: incompatible row_splits");
    }
}
