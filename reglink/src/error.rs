//! Common error types for reglink.
//!
//! This module provides a centralized Error enum using thiserror,
//! covering transport failures, peripheral-reported conditions, and
//! malformed requests rejected before they reach the wire.

use thiserror::Error;

/// Main error type for reglink operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from the underlying byte transport
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Serial port open/configuration errors
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Peripheral reported a timeout, either as the response kind or as a
    /// flag on a stream trailer
    #[error("peripheral reported timeout")]
    Timeout,

    /// Zero-length transfer
    #[error("zero-length transfer")]
    NullSize,

    /// Address outside the peripheral's register space
    #[error("address not mapped by peripheral")]
    AddressError,

    /// Opcode the peripheral does not implement
    #[error("instruction not implemented by peripheral")]
    InvalidInstruction,

    /// Response inconsistent with the command that produced it. The
    /// transport's byte alignment is suspect; the session should be reset.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Malformed request, rejected before any bytes were sent
    #[error("usage error: {0}")]
    Usage(String),
}

impl Error {
    /// True when the transport's framing position can no longer be trusted
    /// and the session should be closed or reset rather than reused.
    pub fn needs_reset(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Serial(_) | Error::Protocol(_))
    }
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
