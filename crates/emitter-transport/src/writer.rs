//! Packet writer.

use std::pin::Pin;
use std::task::{Context, Poll};

use emitter::Packet;
use futures::Sink;
use pin_project_lite::pin_project;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;

use crate::codec::PacketCodec;
use crate::error::CodecError;

pin_project! {
    /// A sink encoding packets onto an [`AsyncWrite`] destination.
    pub struct PacketWriter<W> {
        #[pin]
        inner: FramedWrite<W, PacketCodec>,
    }
}

impl<W> PacketWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self::with_codec(writer, PacketCodec::new())
    }

    pub fn with_codec(writer: W, codec: PacketCodec) -> Self {
        Self {
            inner: FramedWrite::new(writer, codec),
        }
    }

    /// Encode, write and flush one packet.
    pub async fn send(&mut self, packet: Packet) -> Result<(), CodecError> {
        use futures::SinkExt;
        SinkExt::send(&mut self.inner, packet).await
    }

    /// Consume the writer and return the underlying destination.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl<W> Sink<Packet> for PacketWriter<W>
where
    W: AsyncWrite + Unpin,
{
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Packet) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::frame_packets;
    use std::io::Cursor;

    #[tokio::test]
    async fn writes_framed_packets() {
        let packets = vec![Packet::event("a").with_id(1), Packet::ack(1, None, None)];

        let mut writer = PacketWriter::new(Cursor::new(Vec::new()));
        for packet in packets.clone() {
            writer.send(packet).await.unwrap();
        }

        assert_eq!(writer.into_inner().into_inner(), frame_packets(&packets));
    }
}
