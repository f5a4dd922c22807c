//! Testing utilities for code built on the emitter.
//!
//! This module provides [`MemoryConnection`], a [`Connection`](crate::Connection)
//! that records writes and lets tests inject inbound packets, plus a linked
//! pair for exercising two emitters against each other.

mod memory;

pub use memory::MemoryConnection;
