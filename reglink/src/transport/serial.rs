//! Direct serial port transport.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::Transport;
use crate::error::Result;
use crate::tracing::prelude::*;

/// Serial line to the peripheral.
///
/// Thin wrapper over a [`SerialStream`]; the protocol engine owns it
/// exclusively, so no locking is needed to keep request/response exchanges
/// whole.
pub struct SerialLink {
    stream: SerialStream,
}

impl SerialLink {
    /// Open `path` at the given baud rate.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        trace!(port = %path, baud, "opening serial port");
        let stream = tokio_serial::new(path, baud).open_native_async()?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl Transport for SerialLink {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf).await?;
        Ok(())
    }
}
