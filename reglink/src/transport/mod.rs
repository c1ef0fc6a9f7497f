//! Byte transport layer for peripheral connections.
//!
//! The protocol engine only needs a synchronous, order-preserving byte
//! channel: write a command frame, then read an exact number of response
//! bytes. This module defines that capability as a trait and provides the
//! direct serial implementation. Anything that can move bytes in order
//! (serial line, SPI bridge, a pipe to a simulator) can plug in underneath
//! the same engine.

use async_trait::async_trait;

use crate::error::Result;

pub mod serial;

pub use serial::SerialLink;

/// A blocking, order-preserving byte channel to the peripheral.
///
/// Implementations must not buffer away or reorder bytes: framing
/// correctness depends on every write landing before the next read, and on
/// reads returning exactly the requested count. A short read is a transport
/// failure at this layer, never something to retry or pad.
#[async_trait]
pub trait Transport: Send {
    /// Write all bytes, failing on any I/O error.
    async fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read exactly `buf.len()` bytes, failing if fewer are available.
    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;
}
