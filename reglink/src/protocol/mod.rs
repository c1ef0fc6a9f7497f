//! Wire protocol for the register interface.
//!
//! The host drives a point-to-point request/response exchange: a one-byte
//! opcode with big-endian 16-bit arguments goes out, a status byte comes
//! back, optionally followed by data. Variable-length transfers are
//! bracketed by a stream-start acknowledgment and a three-byte stream-end
//! trailer reporting the element count the peripheral actually accepted.
//!
//! This module defines the wire constants, the command encoder, and the
//! status/trailer decoders. It knows nothing about transports; the device
//! session in [`crate::device`] sequences the exchanges.

use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::io;
use strum::{Display, FromRepr};
use tokio_util::codec::Encoder;

use crate::error::{Error, Result};

/// One-byte command selectors, host to peripheral.
///
/// All wire values are fixed by the peripheral's instruction decoder. The
/// packet opcodes are decoded by the peripheral but carry no host-side
/// operation here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    ReadIfVersion = 0x10,
    ReadProjectId = 0x20,
    ClearErrors = 0x30,
    ReadSingle = 0x40,
    ReadMap = 0x50,
    ReadFifo = 0x60,
    WriteSingle = 0x80,
    WriteMap = 0x90,
    WriteFifo = 0xA0,
    PacketExec = 0xC0,
    PacketRead = 0xD0,
    PacketWrite = 0xE0,
    Invalid = 0xF0,
}

/// Response classification carried in the top nibble of every status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum ResponseKind {
    NothingToSay = 0x00,
    AddressError = 0x20,
    NullSize = 0x30,
    InvalidInstruction = 0x40,
    Short = 0x60,
    /// Followed by one big-endian 16-bit value
    Single = 0x80,
    Timeout = 0xA0,
    /// Opens a variable-length transfer
    StreamStart = 0xC0,
    /// Closes a variable-length transfer; followed by the accepted count
    StreamEnd = 0xE0,
}

bitflags! {
    /// Error flags carried in the low nibble of a status byte.
    ///
    /// The peripheral sets these on stream-end trailers. They are decoded on
    /// every status byte, but callers must gate on the response kind before
    /// giving them meaning.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const TIMEOUT = 0x04;
        const ADDRESS_ERROR = 0x02;
        const FIFO_ERROR = 0x01;
    }
}

/// A decoded status byte: response kind plus error flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub kind: ResponseKind,
    pub flags: StatusFlags,
}

impl Status {
    /// Decode the first byte of a response.
    ///
    /// Top nibbles outside the nine defined kinds mean the host and
    /// peripheral have lost byte alignment, so they decode to a protocol
    /// error rather than a kind.
    pub fn decode(byte: u8) -> Result<Self> {
        let kind = ResponseKind::from_repr(byte & 0xF0)
            .ok_or_else(|| Error::Protocol(format!("unknown status byte 0x{byte:02x}")))?;
        Ok(Self {
            kind,
            flags: StatusFlags::from_bits_truncate(byte & 0x0F),
        })
    }

    /// True iff the decoded kind is the one the command expects.
    pub fn matches(&self, expected: ResponseKind) -> bool {
        self.kind == expected
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.flags.contains(StatusFlags::TIMEOUT) {
            write!(f, "+timeout")?;
        }
        if self.flags.contains(StatusFlags::ADDRESS_ERROR) {
            write!(f, "+addr")?;
        }
        if self.flags.contains(StatusFlags::FIFO_ERROR) {
            write!(f, "+fifo")?;
        }
        Ok(())
    }
}

/// Decoded stream-end trailer: status byte plus big-endian accepted count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEnd {
    pub flags: StatusFlags,
    /// Number of elements the peripheral actually transferred. May be less
    /// than the requested count; never more.
    pub accepted: u16,
}

impl StreamEnd {
    /// Trailer length on the wire.
    pub const LEN: usize = 3;

    /// Decode the three trailer bytes closing a streaming transfer.
    pub fn decode(bytes: [u8; Self::LEN]) -> Result<Self> {
        let status = Status::decode(bytes[0])?;
        if !status.matches(ResponseKind::StreamEnd) {
            return Err(Error::Protocol(format!(
                "expected stream end trailer, got {status}"
            )));
        }
        Ok(Self {
            flags: status.flags,
            accepted: u16::from_be_bytes([bytes[1], bytes[2]]),
        })
    }
}

/// A command frame, fully determined by the operation kind.
///
/// Streaming writes inline only the first value; the device session sends
/// the remaining values as a contiguous byte stream after the peripheral
/// acknowledges readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Nop,
    ReadIfVersion,
    ReadProjectId,
    ClearErrors,
    ReadSingle { addr: u16 },
    WriteSingle { addr: u16, value: u16 },
    ReadMap { addr: u16, count: u16 },
    ReadFifo { addr: u16, count: u16 },
    WriteMap { addr: u16, count: u16, first: u16 },
    WriteFifo { addr: u16, count: u16, first: u16 },
}

impl Command {
    /// Wire opcode for this command.
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Nop => Opcode::Nop,
            Command::ReadIfVersion => Opcode::ReadIfVersion,
            Command::ReadProjectId => Opcode::ReadProjectId,
            Command::ClearErrors => Opcode::ClearErrors,
            Command::ReadSingle { .. } => Opcode::ReadSingle,
            Command::WriteSingle { .. } => Opcode::WriteSingle,
            Command::ReadMap { .. } => Opcode::ReadMap,
            Command::ReadFifo { .. } => Opcode::ReadFifo,
            Command::WriteMap { .. } => Opcode::WriteMap,
            Command::WriteFifo { .. } => Opcode::WriteFifo,
        }
    }
}

/// Encodes command frames onto the wire.
pub struct CommandCodec;

impl Encoder<Command> for CommandCodec {
    type Error = io::Error;

    fn encode(&mut self, command: Command, dst: &mut BytesMut) -> std::result::Result<(), Self::Error> {
        dst.put_u8(command.opcode() as u8);

        match command {
            Command::Nop
            | Command::ReadIfVersion
            | Command::ReadProjectId
            | Command::ClearErrors => {}
            Command::ReadSingle { addr } => {
                dst.put_u16(addr);
            }
            Command::WriteSingle { addr, value } => {
                dst.put_u16(addr);
                dst.put_u16(value);
            }
            Command::ReadMap { addr, count } | Command::ReadFifo { addr, count } => {
                dst.put_u16(addr);
                dst.put_u16(count);
            }
            Command::WriteMap { addr, count, first }
            | Command::WriteFifo { addr, count, first } => {
                dst.put_u16(addr);
                dst.put_u16(count);
                dst.put_u16(first);
            }
        }

        Ok(())
    }
}
