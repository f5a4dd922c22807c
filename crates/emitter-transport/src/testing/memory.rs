//! In-memory transport for testing.

use tokio::io::{DuplexStream, duplex};

use crate::transport::Transport;

/// One end of an in-memory byte connection built from tokio [`DuplexStream`]s.
///
/// # Example
///
/// ```
/// use emitter_transport::testing::MemoryTransport;
/// use emitter_transport::split;
///
/// let (client, server) = MemoryTransport::pair();
/// let (_client_reader, _client_writer) = split(client);
/// let (_server_reader, _server_writer) = split(server);
/// // client_writer -> server_reader, server_writer -> client_reader
/// ```
pub struct MemoryTransport {
    read: DuplexStream,
    write: DuplexStream,
}

impl MemoryTransport {
    /// Create a connected pair with a 64KB buffer in each direction.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_buffer_size(64 * 1024)
    }

    /// Create a connected pair with a custom buffer size.
    pub fn pair_with_buffer_size(buffer_size: usize) -> (Self, Self) {
        let (a_write, b_read) = duplex(buffer_size);
        let (b_write, a_read) = duplex(buffer_size);

        (
            MemoryTransport {
                read: a_read,
                write: a_write,
            },
            MemoryTransport {
                read: b_read,
                write: b_write,
            },
        )
    }
}

impl Transport for MemoryTransport {
    type Read = DuplexStream;
    type Write = DuplexStream;

    fn into_split(self) -> (Self::Read, Self::Write) {
        (self.read, self.write)
    }
}
