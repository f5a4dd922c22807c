//! Testing utilities for the transport layer.
//!
//! This module provides an in-memory transport and helpers for building
//! framed byte streams by hand.

mod memory;

pub use memory::MemoryTransport;

use emitter::Packet;

/// Frame a single packet the way [`PacketCodec`](crate::PacketCodec) does.
///
/// # Example
///
/// ```
/// use emitter::Packet;
/// use emitter_transport::testing::frame_packet;
///
/// let bytes = frame_packet(&Packet::event("ping"));
/// assert!(bytes.starts_with(b"Content-Length: "));
/// ```
pub fn frame_packet(packet: &Packet) -> Vec<u8> {
    let json = serde_json::to_string(packet).expect("failed to serialize packet");
    format!("Content-Length: {}\r\n\r\n{}", json.len(), json).into_bytes()
}

/// Frame several packets back to back.
pub fn frame_packets(packets: &[Packet]) -> Vec<u8> {
    packets.iter().flat_map(frame_packet).collect()
}
