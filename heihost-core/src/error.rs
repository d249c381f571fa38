//! Domain-specific error types for the image hosting protocol.
//!
//! All fallible operations return `Result<T, HeiError>`.
//! Wire input never panics. Every error is typed, and the connection
//! server decides per variant whether to answer or to hang up.

use std::time::Duration;
use thiserror::Error;

use crate::encoding::IntFormat;
use crate::message::MessageType;

/// The canonical error type for the image hosting protocol.
#[derive(Debug, Error)]
pub enum HeiError {
    // ── Encoding Errors ──────────────────────────────────────────
    /// A value does not fit the declared integer width/signedness.
    #[error("value {value} out of range for {format} ({min}..={max})")]
    Range {
        format: IntFormat,
        value: i128,
        min: i128,
        max: i128,
    },

    /// Fewer bytes were supplied than the expected layout requires.
    #[error("short input: expected {expected} bytes, got {actual}")]
    Format { expected: usize, actual: usize },

    // ── Protocol Errors ──────────────────────────────────────────
    /// The peer sent a type byte that maps to no known message.
    #[error("unknown message type: {0:#04x}")]
    UnknownMessageType(u8),

    /// A known message arrived in the wrong direction (e.g. a response
    /// type code sent by a client).
    #[error("unexpected message: {0}")]
    UnexpectedMessage(MessageType),

    /// A frame violated the protocol in some other way.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// No bytes arrived (or could be flushed) within the deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Image Errors ─────────────────────────────────────────────
    /// There is no captured screenshot to serve yet.
    #[error("no image available")]
    ImageUnavailable,

    /// The hosted image pipeline rejected or failed on the input.
    #[error("image processing failed: {0}")]
    ImageProcessing(String),

    /// A received block failed to decompress.
    #[error("compression error: {0}")]
    Compression(String),
}

impl HeiError {
    /// Errors the server answers with a `ServerError` message while
    /// keeping the connection open.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ImageUnavailable | Self::ImageProcessing(_))
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<lz4_flex::block::DecompressError> for HeiError {
    fn from(e: lz4_flex::block::DecompressError) -> Self {
        HeiError::Compression(e.to_string())
    }
}
