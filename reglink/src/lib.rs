//! Host-side access to a peripheral's 16-bit register space over a
//! serial byte transport.
//!
//! A [`Device`] session drives a point-to-point request/response protocol:
//! one-byte opcodes with big-endian arguments go out, a status byte (and
//! optionally data) comes back. Single registers, contiguous
//! auto-incrementing ranges, and fixed-address FIFOs can be read and
//! written; variable-length transfers are bracketed by stream start/end
//! framing that reports how many elements the peripheral actually
//! accepted.
//!
//! The engine is generic over a [`Transport`] byte channel. A direct
//! serial implementation is included; anything that can move bytes in
//! order can implement the trait and reuse the whole protocol layer.
//!
//! ```ignore
//! use reglink::{Device, LinkConfig, Span};
//!
//! let config = LinkConfig::new("/dev/ttyUSB0");
//! let mut device = Device::open(&config).await?;
//!
//! device.write_register(0x0010, 0x1234).await?;
//! let gains = device.read_range(0x0100, 0x0110).await?;
//! device.set(Span::with_step(0x0200, 64, Some(0))?, 0).await?;
//! ```

pub mod access;
pub mod config;
pub mod device;
pub mod error;
pub mod protocol;
pub mod tracing;
pub mod transport;

// Re-export commonly used types
pub use access::{Payload, Span};
pub use config::{BootstrapPolicy, LinkConfig};
pub use device::{Device, StreamRead, StreamWrite};
pub use error::{Error, Result};
pub use protocol::{Opcode, ResponseKind, Status, StatusFlags};
pub use transport::{SerialLink, Transport};
