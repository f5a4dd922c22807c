//! Error types for the emitter.

/// Errors reported by a [`Connection`](crate::Connection) when writing.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection no longer accepts packets.
    #[error("connection closed")]
    Closed,

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned from sending events or replies.
#[derive(Debug, thiserror::Error)]
pub enum EmitterError {
    /// The emitter has not been bound to a connection yet.
    #[error("emitter is not bound to a connection")]
    NotBound,

    /// [`Emitter::bind`](crate::Emitter::bind) was called on a bound emitter.
    #[error("emitter is already bound to a connection")]
    AlreadyBound,

    /// The bound connection has been dropped.
    #[error("connection has been dropped")]
    ConnectionDropped,

    /// Writing the packet failed.
    #[error("writing packet: {0}")]
    Connection(#[from] ConnectionError),
}
