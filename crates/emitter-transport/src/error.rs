//! Errors raised while moving packets over a byte stream.

use std::io;

/// Why a packet frame could not be read or written.
///
/// Apart from [`CodecError::JsonSerialize`], every variant ends the read side
/// of a connection: once a header is unreadable the stream has no frame
/// boundary to resume from. A body that fails to decode is not an error here;
/// the codec drops that frame and moves on.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The underlying stream failed.
    #[error("transport I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Frame headers must be UTF-8 text.
    #[error("frame header is not UTF-8")]
    InvalidUtf8,

    /// The `Content-Length` value is not a non-negative integer.
    #[error("frame has a malformed Content-Length")]
    MalformedContentLength,

    /// The header block ended without a `Content-Length` line.
    #[error("frame has no Content-Length")]
    MissingContentLength,

    /// The announced body is above the connection's size limit.
    #[error("packet body of {size} bytes is over the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },

    /// An outgoing packet could not be turned into JSON.
    #[error("failed to encode packet as JSON: {0}")]
    JsonSerialize(#[source] serde_json::Error),
}
