//! Stream transport for `ack-emitter`, built on tokio.
//!
//! # Architecture
//!
//! The byte-level half follows the tokio-util codec pattern:
//!
//! - [`PacketCodec`] frames packets as `Content-Length` prefixed JSON
//! - [`PacketReader`] wraps an `AsyncRead` into a `Stream` of packets
//! - [`PacketWriter`] wraps an `AsyncWrite` into a `Sink` of packets
//!
//! On top of that, [`StreamConnection`] implements [`emitter::Connection`] so
//! an [`emitter::Emitter`] can be bound directly to a TCP stream or any other
//! [`Transport`].
//!
//! # Usage
//!
//! ```ignore
//! use emitter::Emitter;
//! use emitter_transport::{ConnectionConfig, connect};
//!
//! #[tokio::main]
//! async fn main() -> eyre::Result<()> {
//!     let conn = connect("127.0.0.1:7070", ConnectionConfig::default()).await?;
//!     let emitter = Emitter::with_connection(&conn);
//!
//!     let (_, ack) = emitter.request("ping", None)?;
//!     println!("{:?}", ack.await?);
//!
//!     conn.shutdown().await;
//!     Ok(())
//! }
//! ```

mod codec;
mod config;
mod connection;
mod error;
mod reader;
mod transport;
mod writer;

pub mod testing;

pub use codec::{DEFAULT_MAX_MESSAGE_SIZE, PacketCodec};
pub use config::ConnectionConfig;
pub use connection::{StreamConnection, connect};
pub use error::CodecError;
pub use reader::PacketReader;
pub use transport::{Transport, split, split_with_codec};
pub use writer::PacketWriter;

/// The default port `emitter-peer` listens on
pub const DEFAULT_PORT: u16 = 7070;
