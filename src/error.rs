use std::fmt;

use crate::message::{AlertDescription, AlertMessage};

/// Errors surfaced by the handshake core.
#[derive(Debug)]
pub enum Error {
    /// A fatal handshake fault. Carries the alert the caller must
    /// serialize and deliver to the peer before tearing down.
    Handshake(AlertMessage, String),
    /// A record or message was truncated mid-field. Such records are
    /// normally dropped silently before this surfaces.
    ParseIncomplete,
    /// A record or message failed to parse.
    ParseError(nom::error::ErrorKind),
    /// A cryptographic operation failed for an internal reason (bad key
    /// material, provider failure). Not distinguished to the peer.
    CryptoError(String),
    /// Invalid configuration (e.g. an unparseable private key).
    ConfigError(String),
}

impl Error {
    /// A fatal handshake error carrying `description` as the alert.
    pub(crate) fn fatal(description: AlertDescription, reason: impl Into<String>) -> Self {
        Error::Handshake(AlertMessage::fatal(description), reason.into())
    }

    /// The alert to put on the wire, for fatal handshake errors.
    pub fn alert(&self) -> Option<AlertMessage> {
        match self {
            Error::Handshake(alert, _) => Some(*alert),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Handshake(alert, reason) => {
                write!(f, "Handshake failed ({:?}): {}", alert.description, reason)
            }
            Error::ParseIncomplete => write!(f, "Incomplete message"),
            Error::ParseError(kind) => write!(f, "Parse error: {:?}", kind),
            Error::CryptoError(reason) => write!(f, "Crypto error: {}", reason),
            Error::ConfigError(reason) => write!(f, "Config error: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_) => Error::ParseIncomplete,
            nom::Err::Error(x) => Error::ParseError(x.code),
            nom::Err::Failure(x) => Error::ParseError(x.code),
        }
    }
}
