use std::error::Error as StdError;
use std::fmt;

/// Broad category of a verification failure
///
/// Every failure is terminal and handled the same way by callers (the file gets rejected), so the
/// category exists only to make diagnostics and tests easier to read.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ErrorKind {
    /// An offset, size, or count reaches outside of the file or of its section
    Bounds,

    /// Misaligned item or section, or non-zero padding
    Alignment,

    /// Malformed LEB128, string data, tag byte, or access flags
    Encoding,

    /// Unsorted or duplicated rows, entries, or member indices, and overlapping items
    Ordering,

    /// Index out of table range, offset not designating the expected item kind, shorty or
    /// descriptor mismatch, or mismatched owning class
    Reference,

    /// Header fields inconsistent with the buffer or with the map
    Header,
}

/// Failure found while checking one part of the file
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Error {
        Error {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Build an [`Error`] from a kind and a format string, then return it
macro_rules! fail {
    ($kind:ident, $($arg:tt)+) => {
        return Err($crate::dex::Error::new(
            $crate::dex::ErrorKind::$kind,
            format!($($arg)+),
        ))
    };
}

pub(crate) use fail;

/// Reason a buffer was rejected by [`crate::dex::verify`]
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VerifyError {
    location: String,
    error: Error,
}

impl VerifyError {
    pub(crate) fn new(location: &str, error: Error) -> VerifyError {
        VerifyError {
            location: location.to_owned(),
            error,
        }
    }

    /// Category of the failure
    pub fn kind(&self) -> ErrorKind {
        self.error.kind
    }

    /// Human readable explanation of the first violation found
    pub fn reason(&self) -> &str {
        &self.error.message
    }

    /// Label the caller passed in when verifying
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failure to verify dex file '{}': {}",
            self.location, self.error.message
        )
    }
}

impl StdError for VerifyError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}
