use nom::error::{ErrorKind, FromExternalError, ParseError};
use thiserror::Error;

/// Enum for representing encoding and decoding errors
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum Error<'a> {
    /// Out of bounds decoding
    #[error("Out of bounds")]
    OutOfBounds,

    /// A type marker that isn't part of the format
    #[error("Unsupported type {0:#04x}")]
    UnsupportedType(u8),

    /// A reference to an entry that was never read
    #[error("Invalid reference {0}")]
    InvalidReference(usize),

    /// A reference to an object that is still being read, these can't be represented
    #[error("Cyclic reference {0}")]
    CyclicReference(usize),

    /// An externalized class with no registered decoder
    #[error("No decoder for external class '{0}'")]
    UnknownExternalClass(String),

    /// An externalized value that can't be written
    #[error("Can't encode external class '{0}'")]
    UnsupportedExternalClass(String),

    /// Nested objects deeper than the configured limit
    #[error("Nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// A value too large for its length prefix
    #[error("Value too large")]
    ValueTooLarge,

    /// A packet with too many headers or messages, or a too long name
    #[error("Packet too large")]
    PacketTooLarge,

    /// A nom internal error
    #[error("Nom internal error")]
    Nom(&'a [u8], ErrorKind),
}

impl Error<'_> {
    /// Render this error with the offset at which it occurred in `input`
    pub fn describe(&self, input: &[u8]) -> String {
        match self {
            Error::Nom(rest, kind) => format!(
                "{:?} at offset {} of {}",
                kind,
                input.len().saturating_sub(rest.len()),
                input.len()
            ),
            other => other.to_string(),
        }
    }
}

impl<'a> ParseError<&'a [u8]> for Error<'a> {
    fn from_error_kind(input: &'a [u8], kind: ErrorKind) -> Self {
        Error::Nom(input, kind)
    }

    fn append(_: &[u8], _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a, E> FromExternalError<&'a [u8], E> for Error<'a> {
    fn from_external_error(input: &'a [u8], kind: ErrorKind, _e: E) -> Self {
        Error::Nom(input, kind)
    }
}

/// Describe a nom failure produced while parsing `input`
pub fn describe_nom_error(err: &nom::Err<Error<'_>>, input: &[u8]) -> String {
    match err {
        nom::Err::Incomplete(_) => "Unexpected end of input".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => e.describe(input),
    }
}
