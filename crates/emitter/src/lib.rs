//! Named events with correlated acknowledgements.
//!
//! This crate layers event dispatch on top of any duplex packet connection.
//! Either side sends a named event with an optional payload, and may ask the
//! other side to acknowledge it. Acks are matched to the waiting callback by
//! a per-emitter id that only ever increases, and each callback fires at most
//! once.
//!
//! # Architecture
//!
//! - [`Packet`] is the wire unit, either an event or an ack
//! - [`Connection`] is what an [`Emitter`] is bound to: it writes packets,
//!   delivers inbound ones, dispatches application events and knows which
//!   event names the transport reserves for itself
//! - [`Emitter`] owns id allocation and the table of pending acks
//! - [`Reply`] is handed to the application with each event that asked for an
//!   ack, and writes at most one ack packet
//!
//! # Scope
//!
//! Framing, serialization and connection management belong to the
//! connection. See the `ack-emitter-transport` crate for a stream-based one.

mod connection;
mod emitter;
mod error;
mod listeners;
mod packet;
mod pending_acks;
mod reply;

pub mod testing;

pub use connection::{
    Connection, DEFAULT_RESERVED_EVENTS, DataHandler, IncomingEvent, is_default_reserved,
};
pub use emitter::{Ack, Emitter, SendOptions};
pub use error::{ConnectionError, EmitterError};
pub use listeners::{Listener, Listeners};
pub use packet::{Id, Packet, PacketType, packets};
pub use pending_acks::AckCallback;
pub use reply::Reply;
