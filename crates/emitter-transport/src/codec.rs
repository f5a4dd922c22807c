//! Packet codec built on tokio-util.
//!
//! Packets travel as JSON bodies behind a `Content-Length` header:
//!
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <JSON body>
//! ```

use bytes::{BufMut, BytesMut};
use emitter::Packet;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;

/// Default maximum packet body size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

const SEPARATOR: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH: &str = "content-length";

/// Encodes and decodes [`Packet`]s.
///
/// # Example
///
/// ```ignore
/// use tokio_util::codec::FramedRead;
/// use emitter_transport::PacketCodec;
///
/// let framed = FramedRead::new(reader, PacketCodec::new());
/// ```
#[derive(Debug, Clone)]
pub struct PacketCodec {
    max_message_size: usize,
}

impl PacketCodec {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a codec that rejects bodies larger than `max_message_size` bytes
    /// with [`CodecError::MessageTooLarge`].
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(header_end) = src.windows(SEPARATOR.len()).position(|w| w == SEPARATOR)
            else {
                return Ok(None);
            };

            let body_len = parse_content_length(&src[..header_end])?;
            if body_len > self.max_message_size {
                return Err(CodecError::MessageTooLarge {
                    size: body_len,
                    max: self.max_message_size,
                });
            }

            let body_start = header_end + SEPARATOR.len();
            let frame_len = body_start + body_len;
            if src.len() < frame_len {
                src.reserve(frame_len - src.len());
                return Ok(None);
            }

            // the frame is consumed whether or not its body decodes
            let frame = src.split_to(frame_len);
            match serde_json::from_slice::<Packet>(&frame[body_start..]) {
                Ok(packet) => {
                    tracing::trace!(?packet, "decoded packet");
                    return Ok(Some(packet));
                }
                Err(e) => {
                    tracing::warn!(error = %e, len = body_len, "skipping undecodable packet body");
                }
            }
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&item).map_err(CodecError::JsonSerialize)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        dst.reserve(header.len() + body.len());
        dst.put_slice(header.as_bytes());
        dst.put_slice(&body);
        Ok(())
    }
}

/// Find the Content-Length value in the header section. Header names are
/// matched case-insensitively and other headers are ignored.
fn parse_content_length(header: &[u8]) -> Result<usize, CodecError> {
    let header = std::str::from_utf8(header).map_err(|_| CodecError::InvalidUtf8)?;

    header
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(CONTENT_LENGTH))
        .ok_or(CodecError::MissingContentLength)
        .and_then(|(_, value)| {
            value
                .trim()
                .parse()
                .map_err(|_| CodecError::MalformedContentLength)
        })
}
