//! Device session: the protocol engine.
//!
//! A [`Device`] owns its transport exclusively and sequences one logical
//! operation at a time: serialize a command, write it, read the status
//! byte, then read whatever payload the response kind promises. Streaming
//! transfers add a stream-end trailer whose accepted count caps the usable
//! result.
//!
//! All operations take `&mut self`, so a session shared across tasks must
//! sit behind an exclusive lock; an exchange interrupted mid-frame leaves
//! the transport at an unknown byte position and the session must be reset.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::config::{BootstrapPolicy, LinkConfig};
use crate::error::{Error, Result};
use crate::protocol::{Command, CommandCodec, ResponseKind, Status, StatusFlags, StreamEnd};
use crate::tracing::prelude::*;
use crate::transport::{SerialLink, Transport};

/// Values returned by a streaming read.
///
/// The peripheral reports how many of the requested elements were actually
/// valid; `values` is truncated to that count and may be shorter than the
/// request. A short result is not an error, just all the data there was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRead {
    /// Register values in request order
    pub values: Vec<u16>,
    /// FIFO-error flag from the trailer. The values above are still what
    /// the peripheral sent; the caller decides whether to trust them.
    pub fifo_error: bool,
}

/// Peripheral acknowledgment closing a streaming write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamWrite {
    /// Number of elements the peripheral accepted, at most the number sent
    pub accepted: u16,
    /// FIFO-error flag from the trailer
    pub fifo_error: bool,
}

/// Session with one peripheral over an exclusively-owned transport.
///
/// The interface version and project identifier are read once at
/// construction and stay fixed for the life of the session.
#[derive(Debug)]
pub struct Device<T> {
    pub(crate) link: T,
    if_version: Option<u16>,
    project_id: Option<u16>,
}

impl Device<SerialLink> {
    /// Open the configured serial port and bootstrap a session on it.
    pub async fn open(config: &LinkConfig) -> Result<Self> {
        let link = SerialLink::open(&config.port, config.baud)?;
        Self::connect(link, config.bootstrap).await
    }
}

impl<T: Transport> Device<T> {
    /// Bootstrap a session over `link`.
    ///
    /// Sends READ_IFVER and READ_PROJID once. `policy` decides what a
    /// malformed identify response does: tolerant leaves the field unset,
    /// strict fails construction. Transport failures fail construction
    /// under either policy.
    pub async fn connect(link: T, policy: BootstrapPolicy) -> Result<Self> {
        let mut device = Self {
            link,
            if_version: None,
            project_id: None,
        };
        device.if_version = device.identify(Command::ReadIfVersion, policy).await?;
        device.project_id = device.identify(Command::ReadProjectId, policy).await?;
        debug!(
            if_version = ?device.if_version,
            project_id = ?device.project_id,
            "session bootstrapped"
        );
        Ok(device)
    }

    /// Interface version learned at bootstrap, if the peripheral reported one.
    pub fn if_version(&self) -> Option<u16> {
        self.if_version
    }

    /// Project identifier learned at bootstrap, if the peripheral reported one.
    pub fn project_id(&self) -> Option<u16> {
        self.project_id
    }

    /// Give the transport back, ending the session.
    ///
    /// After a protocol violation this is the way out: the byte position on
    /// the wire is unknown, so the caller resets or reopens the underlying
    /// channel rather than issuing more operations.
    pub fn into_transport(self) -> T {
        self.link
    }

    /// No-op round trip confirming the peripheral is responsive.
    pub async fn nop(&mut self) -> Result<()> {
        self.send(Command::Nop).await?;
        self.expect_short().await
    }

    /// Clear the peripheral's latched error flags.
    pub async fn clear_errors(&mut self) -> Result<()> {
        self.send(Command::ClearErrors).await?;
        self.expect_short().await
    }

    /// Read the register at `addr`.
    pub async fn read_register(&mut self, addr: u16) -> Result<u16> {
        self.send(Command::ReadSingle { addr }).await?;
        let status = self.read_status().await?;
        if !status.matches(ResponseKind::Single) {
            return Err(Self::unexpected(status, ResponseKind::Single));
        }
        let value = self.read_word().await?;
        trace!(addr, value, "read register");
        Ok(value)
    }

    /// Write `value` to the register at `addr`.
    pub async fn write_register(&mut self, addr: u16, value: u16) -> Result<()> {
        self.send(Command::WriteSingle { addr, value }).await?;
        self.expect_short().await?;
        trace!(addr, value, "wrote register");
        Ok(())
    }

    /// Read `count` registers starting at `addr`, address auto-incrementing.
    pub async fn read_map(&mut self, addr: u16, count: u16) -> Result<StreamRead> {
        self.stream_in(Command::ReadMap { addr, count }, count).await
    }

    /// Read up to `count` elements from the FIFO at `addr` (fixed address).
    pub async fn read_fifo(&mut self, addr: u16, count: u16) -> Result<StreamRead> {
        self.stream_in(Command::ReadFifo { addr, count }, count).await
    }

    /// Write `values` to consecutive registers starting at `addr`.
    pub async fn write_map(&mut self, addr: u16, values: &[u16]) -> Result<StreamWrite> {
        let (count, first) = Self::stream_out_args(values)?;
        self.stream_out(Command::WriteMap { addr, count, first }, values)
            .await
    }

    /// Write `values` into the FIFO at `addr` (fixed address).
    pub async fn write_fifo(&mut self, addr: u16, values: &[u16]) -> Result<StreamWrite> {
        let (count, first) = Self::stream_out_args(values)?;
        self.stream_out(Command::WriteFifo { addr, count, first }, values)
            .await
    }

    async fn identify(
        &mut self,
        command: Command,
        policy: BootstrapPolicy,
    ) -> Result<Option<u16>> {
        self.send(command).await?;
        let mut byte = [0u8; 1];
        self.link.read_exact(&mut byte).await?;
        match Status::decode(byte[0]) {
            Ok(status) if status.matches(ResponseKind::Single) => {
                Ok(Some(self.read_word().await?))
            }
            Ok(status) => match policy {
                BootstrapPolicy::Tolerant => {
                    debug!(?command, response = %status, "identify unanswered, continuing without");
                    Ok(None)
                }
                BootstrapPolicy::Strict => Err(Self::unexpected(status, ResponseKind::Single)),
            },
            Err(err) => match policy {
                BootstrapPolicy::Tolerant => {
                    debug!(?command, byte = byte[0], "undecodable identify response, continuing without");
                    Ok(None)
                }
                BootstrapPolicy::Strict => Err(err),
            },
        }
    }

    async fn stream_in(&mut self, command: Command, count: u16) -> Result<StreamRead> {
        self.send(command).await?;
        let status = self.read_status().await?;
        if !status.matches(ResponseKind::StreamStart) {
            // The peripheral sends nothing further after refusing a stream.
            return Err(Self::unexpected(status, ResponseKind::StreamStart));
        }
        let mut raw = vec![0u8; count as usize * 2];
        self.link.read_exact(&mut raw).await?;
        let end = self.read_stream_end().await?;
        Self::check_trailer(&end)?;
        let mut values: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        // Only the first `accepted` elements are valid; the rest is padding
        // the peripheral clocked out to keep the framing fixed.
        values.truncate(end.accepted as usize);
        if end.accepted < count {
            debug!(requested = count, accepted = end.accepted, "short stream");
        }
        Ok(StreamRead {
            values,
            fifo_error: end.flags.contains(StatusFlags::FIFO_ERROR),
        })
    }

    fn stream_out_args(values: &[u16]) -> Result<(u16, u16)> {
        // The handshake frame inlines the first value, so an empty transfer
        // cannot even be framed; reject it before touching the wire.
        let Some(&first) = values.first() else {
            return Err(Error::NullSize);
        };
        let count = u16::try_from(values.len()).map_err(|_| {
            Error::Usage(format!(
                "{} values exceed the 16-bit count field",
                values.len()
            ))
        })?;
        Ok((count, first))
    }

    async fn stream_out(&mut self, command: Command, values: &[u16]) -> Result<StreamWrite> {
        self.send(command).await?;
        let status = self.read_status().await?;
        if !status.matches(ResponseKind::Short) {
            // Readiness handshake failed; the peripheral is not reading, so
            // the bulk payload must not be sent.
            return Err(Self::unexpected(status, ResponseKind::Short));
        }
        let rest = &values[1..];
        if !rest.is_empty() {
            let mut body = BytesMut::with_capacity(rest.len() * 2);
            for value in rest {
                body.put_u16(*value);
            }
            self.link.write_all(&body).await?;
        }
        let end = self.read_stream_end().await?;
        Self::check_trailer(&end)?;
        if (end.accepted as usize) < values.len() {
            debug!(sent = values.len(), accepted = end.accepted, "short write");
        }
        Ok(StreamWrite {
            accepted: end.accepted,
            fifo_error: end.flags.contains(StatusFlags::FIFO_ERROR),
        })
    }

    async fn send(&mut self, command: Command) -> Result<()> {
        let mut codec = CommandCodec;
        let mut frame = BytesMut::new();
        codec.encode(command, &mut frame)?;
        trace!(?command, "sending command");
        self.link.write_all(&frame).await
    }

    async fn read_status(&mut self) -> Result<Status> {
        let mut byte = [0u8; 1];
        self.link.read_exact(&mut byte).await?;
        let status = Status::decode(byte[0])?;
        trace!(%status, "status");
        Ok(status)
    }

    async fn read_word(&mut self) -> Result<u16> {
        let mut word = [0u8; 2];
        self.link.read_exact(&mut word).await?;
        Ok(u16::from_be_bytes(word))
    }

    async fn read_stream_end(&mut self) -> Result<StreamEnd> {
        let mut trailer = [0u8; StreamEnd::LEN];
        self.link.read_exact(&mut trailer).await?;
        StreamEnd::decode(trailer)
    }

    async fn expect_short(&mut self) -> Result<()> {
        let status = self.read_status().await?;
        if status.matches(ResponseKind::Short) {
            Ok(())
        } else {
            Err(Self::unexpected(status, ResponseKind::Short))
        }
    }

    /// Map a mismatched status onto the failure taxonomy. Error kinds the
    /// peripheral defines become their typed failure; anything else means
    /// the exchange is out of step with the wire.
    fn unexpected(status: Status, expected: ResponseKind) -> Error {
        match status.kind {
            ResponseKind::Timeout => Error::Timeout,
            ResponseKind::NullSize => Error::NullSize,
            ResponseKind::AddressError => Error::AddressError,
            ResponseKind::InvalidInstruction => Error::InvalidInstruction,
            _ => Error::Protocol(format!("expected {expected}, got {status}")),
        }
    }

    /// Trailer flags that void the whole transfer. The FIFO-error flag is
    /// deliberately not checked here; it travels with the result as a
    /// warning.
    fn check_trailer(end: &StreamEnd) -> Result<()> {
        if end.flags.contains(StatusFlags::TIMEOUT) {
            return Err(Error::Timeout);
        }
        if end.flags.contains(StatusFlags::ADDRESS_ERROR) {
            return Err(Error::AddressError);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockLink;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    // Identify replies: IFVER = 0x0102, PROJID = 0xABCD.
    const BOOT: &[u8] = &[0x80, 0x01, 0x02, 0x80, 0xAB, 0xCD];

    async fn booted(reply: &[u8]) -> Device<MockLink> {
        crate::tracing::init_for_tests();
        let mut link = MockLink::replying(BOOT);
        link.push_reply(reply);
        Device::connect(link, BootstrapPolicy::Tolerant)
            .await
            .unwrap()
    }

    /// In-memory peripheral with a small register file and one FIFO queue.
    ///
    /// Parses command frames as the engine writes them and queues the
    /// response bytes a real peripheral would clock out, including padded
    /// short streams and the stream-end accounting.
    struct SimPeripheral {
        regs: Vec<u16>,
        fifo: VecDeque<u16>,
        outbound: VecDeque<u8>,
        // Streaming write in progress: target address, None for FIFO writes
        bulk: Option<(Option<u16>, u16)>,
    }

    impl SimPeripheral {
        const IF_VERSION: u16 = 0x0102;
        const PROJECT_ID: u16 = 0xABCD;

        fn new(registers: usize) -> Self {
            Self {
                regs: vec![0; registers],
                fifo: VecDeque::new(),
                outbound: VecDeque::new(),
                bulk: None,
            }
        }

        fn push_status(&mut self, byte: u8) {
            self.outbound.push_back(byte);
        }

        fn push_word(&mut self, word: u16) {
            self.outbound.extend(word.to_be_bytes());
        }

        fn push_trailer(&mut self, flags: u8, accepted: u16) {
            self.push_status(0xE0 | flags);
            self.push_word(accepted);
        }

        fn handle_frame(&mut self, frame: &[u8]) {
            let word = |hi: usize| u16::from_be_bytes([frame[hi], frame[hi + 1]]);
            match frame[0] {
                0x00 | 0x30 => self.push_status(0x60),
                0x10 => {
                    self.push_status(0x80);
                    self.push_word(Self::IF_VERSION);
                }
                0x20 => {
                    self.push_status(0x80);
                    self.push_word(Self::PROJECT_ID);
                }
                0x40 => {
                    let addr = word(1) as usize;
                    match self.regs.get(addr) {
                        Some(&value) => {
                            self.push_status(0x80);
                            self.push_word(value);
                        }
                        None => self.push_status(0x20),
                    }
                }
                0x80 => {
                    let addr = word(1) as usize;
                    match self.regs.get_mut(addr) {
                        Some(slot) => {
                            *slot = word(3);
                            self.push_status(0x60);
                        }
                        None => self.push_status(0x20),
                    }
                }
                0x50 => {
                    let (addr, count) = (word(1), word(3));
                    if count == 0 {
                        self.push_status(0x30);
                    } else if addr as usize >= self.regs.len() {
                        self.push_status(0x20);
                    } else {
                        self.push_status(0xC0);
                        let available = (self.regs.len() - addr as usize).min(count as usize);
                        for i in 0..count as usize {
                            let value = if i < available {
                                self.regs[addr as usize + i]
                            } else {
                                0
                            };
                            self.push_word(value);
                        }
                        self.push_trailer(0, available as u16);
                    }
                }
                0x60 => {
                    let count = word(3);
                    if count == 0 {
                        self.push_status(0x30);
                    } else {
                        self.push_status(0xC0);
                        let available = self.fifo.len().min(count as usize);
                        for _ in 0..available {
                            let value = self.fifo.pop_front().unwrap();
                            self.push_word(value);
                        }
                        for _ in available..count as usize {
                            self.push_word(0);
                        }
                        self.push_trailer(0, available as u16);
                    }
                }
                0x90 => {
                    let (addr, count, first) = (word(1), word(3), word(5));
                    if addr as usize >= self.regs.len() {
                        self.push_status(0x20);
                    } else {
                        self.regs[addr as usize] = first;
                        self.push_status(0x60);
                        if count > 1 {
                            self.bulk = Some((Some(addr + 1), count - 1));
                        } else {
                            self.push_trailer(0, self.accepted_at(addr, count));
                        }
                    }
                }
                0xA0 => {
                    let (count, first) = (word(3), word(5));
                    self.fifo.push_back(first);
                    self.push_status(0x60);
                    if count > 1 {
                        self.bulk = Some((None, count - 1));
                    } else {
                        self.push_trailer(0, count);
                    }
                }
                other => panic!("simulator got unknown opcode 0x{other:02x}"),
            }
        }

        fn accepted_at(&self, addr: u16, count: u16) -> u16 {
            (self.regs.len() - addr as usize).min(count as usize) as u16
        }

        fn handle_bulk(&mut self, bytes: &[u8]) {
            let (target, count) = self.bulk.take().expect("unexpected bulk payload");
            assert_eq!(bytes.len(), count as usize * 2, "bulk length mismatch");
            let mut stored = 1u16; // first value landed with the handshake
            for (i, pair) in bytes.chunks_exact(2).enumerate() {
                let value = u16::from_be_bytes([pair[0], pair[1]]);
                match target {
                    Some(base) => {
                        if let Some(slot) = self.regs.get_mut(base as usize + i) {
                            *slot = value;
                            stored += 1;
                        }
                    }
                    None => {
                        self.fifo.push_back(value);
                        stored += 1;
                    }
                }
            }
            self.push_trailer(0, stored);
        }
    }

    #[async_trait]
    impl Transport for SimPeripheral {
        async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
            if self.bulk.is_some() {
                self.handle_bulk(bytes);
            } else {
                self.handle_frame(bytes);
            }
            Ok(())
        }

        async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
            for slot in buf.iter_mut() {
                *slot = self.outbound.pop_front().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "nothing to clock out")
                })?;
            }
            Ok(())
        }
    }

    async fn sim_device(registers: usize) -> Device<SimPeripheral> {
        crate::tracing::init_for_tests();
        Device::connect(SimPeripheral::new(registers), BootstrapPolicy::Strict)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_records_identity() {
        let device = booted(&[]).await;
        assert_eq!(device.if_version(), Some(0x0102));
        assert_eq!(device.project_id(), Some(0xABCD));
        assert_eq!(device.link.written, vec![vec![0x10], vec![0x20]]);
        assert_eq!(device.link.unread(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_tolerant_records_nothing() {
        // IFVER answered with a bare SHORT, PROJID answered properly
        let link = MockLink::replying(&[0x60, 0x80, 0xAB, 0xCD]);
        let device = Device::connect(link, BootstrapPolicy::Tolerant)
            .await
            .unwrap();
        assert_eq!(device.if_version(), None);
        assert_eq!(device.project_id(), Some(0xABCD));
    }

    #[tokio::test]
    async fn test_bootstrap_strict_rejects_short() {
        let link = MockLink::replying(&[0x60]);
        let err = Device::connect(link, BootstrapPolicy::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_bootstrap_strict_maps_timeout() {
        let link = MockLink::replying(&[0xA0]);
        let err = Device::connect(link, BootstrapPolicy::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn test_bootstrap_transport_failure_always_fatal() {
        // Empty script: the very first status read dies
        let err = Device::connect(MockLink::new(), BootstrapPolicy::Tolerant)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_register_round_trip() {
        let mut device = sim_device(256).await;
        for addr in [0u16, 1, 42, 255] {
            let value = addr.wrapping_mul(0x101) ^ 0x5A5A;
            device.write_register(addr, value).await.unwrap();
            assert_eq!(device.read_register(addr).await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_read_unmapped_register() {
        let mut device = sim_device(16).await;
        assert!(matches!(
            device.read_register(0x4000).await,
            Err(Error::AddressError)
        ));
    }

    #[tokio::test]
    async fn test_map_round_trip() {
        let mut device = sim_device(64).await;
        let values: Vec<u16> = (0..8).map(|i| 0x1000 + i).collect();
        let ack = device.write_map(4, &values).await.unwrap();
        assert_eq!(ack.accepted, 8);
        assert!(!ack.fifo_error);

        let read = device.read_map(4, 8).await.unwrap();
        assert_eq!(read.values, values);
    }

    #[tokio::test]
    async fn test_map_read_truncates_to_accepted() {
        // 16 registers; a read of 8 starting at 12 only has 4 behind it
        let mut device = sim_device(16).await;
        for addr in 12..16 {
            device.write_register(addr, 0xC0DE + addr).await.unwrap();
        }
        let read = device.read_map(12, 8).await.unwrap();
        assert_eq!(read.values.len(), 4);
        assert_eq!(
            read.values,
            vec![0xC0DE + 12, 0xC0DE + 13, 0xC0DE + 14, 0xC0DE + 15]
        );
    }

    #[tokio::test]
    async fn test_map_read_zero_length_reported_by_peripheral() {
        let mut device = sim_device(16).await;
        assert!(matches!(device.read_map(0, 0).await, Err(Error::NullSize)));
    }

    #[tokio::test]
    async fn test_fifo_round_trip() {
        let mut device = sim_device(16).await;
        let ack = device.write_fifo(3, &[7, 8, 9]).await.unwrap();
        assert_eq!(ack.accepted, 3);

        // Ask for more than is queued; only the queued elements come back
        let read = device.read_fifo(3, 5).await.unwrap();
        assert_eq!(read.values, vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_single_element_stream_write_sends_no_bulk() {
        let mut device = sim_device(16).await;
        let ack = device.write_map(0, &[0xFFFF]).await.unwrap();
        assert_eq!(ack.accepted, 1);
        assert_eq!(device.read_register(0).await.unwrap(), 0xFFFF);
    }

    #[tokio::test]
    async fn test_failed_handshake_suppresses_bulk_payload() {
        // Peripheral refuses the WRITE_MAP handshake with a timeout status
        let mut device = booted(&[0xA0]).await;
        let err = device.write_map(0, &[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        // Two identify frames plus the refused handshake; no bulk payload
        assert_eq!(device.link.written.len(), 3);
        assert_eq!(
            device.link.written[2],
            vec![0x90, 0x00, 0x00, 0x00, 0x03, 0x00, 0x01]
        );
    }

    #[tokio::test]
    async fn test_stream_write_trailer_flags() {
        // Handshake ok, trailer carries the FIFO-error warning
        let mut device = booted(&[0x60, 0xE1, 0x00, 0x03]).await;
        let ack = device.write_fifo(2, &[5, 6, 7]).await.unwrap();
        assert_eq!(ack.accepted, 3);
        assert!(ack.fifo_error);

        // Trailer timeout flag voids the transfer
        device.link.push_reply(&[0x60, 0xE4, 0x00, 0x00]);
        let err = device.write_fifo(2, &[5, 6, 7]).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn test_stream_read_trailer_address_flag() {
        // Stream start, two padded words, trailer with the address-error flag
        let mut device = booted(&[0xC0, 0x00, 0x00, 0x00, 0x00, 0xE2, 0x00, 0x00]).await;
        let err = device.read_map(0xFFFE, 2).await.unwrap_err();
        assert!(matches!(err, Error::AddressError));
    }

    #[tokio::test]
    async fn test_empty_stream_write_rejected_before_wire() {
        let mut device = booted(&[]).await;
        assert!(matches!(
            device.write_map(0, &[]).await,
            Err(Error::NullSize)
        ));
        assert!(matches!(
            device.write_fifo(0, &[]).await,
            Err(Error::NullSize)
        ));
        // Nothing beyond the two identify frames hit the wire
        assert_eq!(device.link.written.len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_stream_write_rejected_before_wire() {
        let mut device = booted(&[]).await;
        let values = vec![0u16; 0x1_0000];
        assert!(matches!(
            device.write_map(0, &values).await,
            Err(Error::Usage(_))
        ));
        assert_eq!(device.link.written.len(), 2);
    }

    #[tokio::test]
    async fn test_unexpected_kind_is_protocol_violation() {
        let mut device = booted(&[0xC0]).await;
        let err = device.read_register(9).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.needs_reset());
    }

    #[tokio::test]
    async fn test_error_kinds_map_to_failures() {
        let mut device = booted(&[0x20, 0x30, 0x40, 0xA0]).await;
        assert!(matches!(
            device.write_register(1, 1).await,
            Err(Error::AddressError)
        ));
        assert!(matches!(
            device.write_register(1, 1).await,
            Err(Error::NullSize)
        ));
        assert!(matches!(
            device.write_register(1, 1).await,
            Err(Error::InvalidInstruction)
        ));
        assert!(matches!(device.write_register(1, 1).await, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn test_short_read_propagates_transport_error() {
        // Stream start arrives but the payload never does
        let mut device = booted(&[0xC0, 0x12]).await;
        let err = device.read_map(0, 4).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.needs_reset());
    }

    #[tokio::test]
    async fn test_nop_and_clear_errors() {
        let mut device = booted(&[0x60, 0x60]).await;
        device.nop().await.unwrap();
        device.clear_errors().await.unwrap();
        assert_eq!(device.link.written[2], vec![0x00]);
        assert_eq!(device.link.written[3], vec![0x30]);
    }
}
