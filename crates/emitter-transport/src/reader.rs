//! Packet reader.

use std::pin::Pin;
use std::task::{Context, Poll};

use emitter::Packet;
use futures::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::PacketCodec;
use crate::error::CodecError;

pin_project! {
    /// A stream of packets decoded from an [`AsyncRead`] source.
    pub struct PacketReader<R> {
        #[pin]
        inner: FramedRead<R, PacketCodec>,
    }
}

impl<R> PacketReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self::with_codec(reader, PacketCodec::new())
    }

    /// Create a reader with a custom codec, e.g. to change the size limit.
    pub fn with_codec(reader: R, codec: PacketCodec) -> Self {
        Self {
            inner: FramedRead::new(reader, codec),
        }
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R> Stream for PacketReader<R>
where
    R: AsyncRead + Unpin,
{
    type Item = Result<Packet, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}
