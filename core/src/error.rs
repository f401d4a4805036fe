//! Error types for reqopt.
//!
//! # Design
//! Errors are split by the phase that produced them. Anything that goes wrong
//! while the request is being described (unparseable URL or proxy, a body that
//! cannot be serialized, an upload file that cannot be read) is a
//! `ConfigError` and is reported before any network I/O. `TransportError`
//! covers the round-trip itself, `DecodeError` structured decoding of the
//! response body, and `Io` plain body reads.

use std::fmt;
use std::io;

use thiserror::Error;

/// Top-level error returned by every call and extraction.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An option or the request target was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP round-trip failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body did not decode into the requested shape.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Reading the response body failed, or it was already consumed.
    #[error("failed to read response body: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// True when the configured deadline elapsed before the call completed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(err) if err.kind() == TransportErrorKind::Timeout)
    }
}

/// Serialized payload formats, used to label encode and decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Xml,
    Form,
}

impl fmt::Display for BodyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyFormat::Json => write!(f, "JSON"),
            BodyFormat::Xml => write!(f, "XML"),
            BodyFormat::Form => write!(f, "form"),
        }
    }
}

/// Failures raised while building the request, before it is sent.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid proxy URL '{url}': {reason}")]
    InvalidProxy { url: String, reason: String },

    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),

    #[error("invalid value for header '{name}'")]
    InvalidHeaderValue { name: String },

    /// The body value could not be serialized.
    #[error("failed to serialize {format} body: {reason}")]
    Serialization { format: BodyFormat, reason: String },

    /// A multipart upload file could not be opened or copied.
    #[error("failed to read file for multipart field '{field}': {source}")]
    File {
        field: String,
        #[source]
        source: io::Error,
    },

    /// The draft could not be turned into a transport request.
    #[error("failed to build request: {0}")]
    Request(#[from] ureq::http::Error),
}

/// Coarse classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Tls,
    Redirect,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Tls => "TLS",
            TransportErrorKind::Redirect => "redirect",
            TransportErrorKind::Other => "transport",
        };
        f.write_str(label)
    }
}

/// A failure during the round-trip, with the transport's error as source.
#[derive(Debug, Error)]
#[error("{kind} error: {source}")]
pub struct TransportError {
    kind: TransportErrorKind,
    #[source]
    source: ureq::Error,
}

impl TransportError {
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }
}

impl From<ureq::Error> for TransportError {
    fn from(source: ureq::Error) -> Self {
        let kind = match &source {
            ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
            ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => TransportErrorKind::Connect,
            ureq::Error::Tls(_) => TransportErrorKind::Tls,
            ureq::Error::TooManyRedirects | ureq::Error::RedirectFailed => TransportErrorKind::Redirect,
            ureq::Error::Io(err) => io_kind(err),
            _ => TransportErrorKind::Other,
        };
        Self { kind, source }
    }
}

fn io_kind(err: &io::Error) -> TransportErrorKind {
    match err.kind() {
        io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable => TransportErrorKind::Connect,
        _ => TransportErrorKind::Other,
    }
}

/// Whether a decode failure came from the payload syntax or its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The payload is not well-formed (syntax error, truncated input).
    Malformed,
    /// The payload is well-formed but does not fit the destination type.
    Mismatch,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::Malformed => write!(f, "malformed payload"),
            DecodeErrorKind::Mismatch => write!(f, "schema mismatch"),
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to decode {format} body ({kind}): {source}")]
pub struct DecodeError {
    format: BodyFormat,
    kind: DecodeErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl DecodeError {
    pub(crate) fn new(
        format: BodyFormat,
        kind: DecodeErrorKind,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            format,
            kind,
            source: source.into(),
        }
    }

    pub fn format(&self) -> BodyFormat {
        self.format
    }

    pub fn kind(&self) -> DecodeErrorKind {
        self.kind
    }
}
