//! Error types for LinkARQ sessions.

use std::io;

use crate::frame::Address;

/// Result type alias for LinkARQ operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for framing, injection, and session handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller-supplied parameter is out of range or inconsistent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A probability parameter fell outside `[0.0, 1.0]`.
    #[error("probability {0} is not within [0.0, 1.0]")]
    InvalidProbability(f64),

    /// The protocol name could not be recognised.
    #[error("unknown protocol {0:?} (expected StopAndWait|1, GoBackN|2, SelectiveRepeat|3)")]
    UnknownProtocol(String),

    /// The error-detection technique could not be recognised.
    #[error("unknown technique {0:?} (expected CRC|1, Checksum|2)")]
    UnknownScheme(String),

    /// A frame buffer was too short or internally inconsistent.
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// A frame header advertised a payload beyond the configured limit.
    #[error("payload of {bytes} bytes exceeds the frame limit")]
    PayloadTooLarge {
        /// Advertised payload size in bytes.
        bytes: usize,
    },

    /// A data frame arrived for a different station.
    #[error("destination address mismatch: frame for {actual}, this station is {expected}")]
    AddressMismatch {
        /// The local station address.
        expected: Address,
        /// The destination carried by the frame.
        actual: Address,
    },

    /// The peer closed the link or the link was shut down locally.
    #[error("link closed")]
    LinkClosed,

    /// An underlying transport I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns true if this error means the peer is gone rather than
    /// that something went wrong mid-session.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::LinkClosed => true,
            Error::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
