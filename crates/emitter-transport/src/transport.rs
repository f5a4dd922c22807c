//! Byte transports that can carry packets.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::codec::PacketCodec;
use crate::reader::PacketReader;
use crate::writer::PacketWriter;

/// A byte stream that can be split into separate read and write halves.
///
/// Implemented for TCP streams and for the in-memory
/// [`MemoryTransport`](crate::testing::MemoryTransport).
pub trait Transport: Send + 'static {
    /// The read half type.
    type Read: AsyncRead + Unpin + Send + 'static;
    /// The write half type.
    type Write: AsyncWrite + Unpin + Send + 'static;

    /// Split the transport into separate read and write halves.
    fn into_split(self) -> (Self::Read, Self::Write);
}

impl Transport for TcpStream {
    type Read = OwnedReadHalf;
    type Write = OwnedWriteHalf;

    fn into_split(self) -> (Self::Read, Self::Write) {
        TcpStream::into_split(self)
    }
}

/// Split a transport into a packet reader and writer pair.
pub fn split<T: Transport>(transport: T) -> (PacketReader<T::Read>, PacketWriter<T::Write>) {
    split_with_codec(transport, PacketCodec::new())
}

/// Like [`split`], with both halves using copies of `codec`.
pub fn split_with_codec<T: Transport>(
    transport: T,
    codec: PacketCodec,
) -> (PacketReader<T::Read>, PacketWriter<T::Write>) {
    let (read, write) = transport.into_split();
    (
        PacketReader::with_codec(read, codec.clone()),
        PacketWriter::with_codec(write, codec),
    )
}
