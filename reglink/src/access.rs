//! Addressed-access facade over the device session.
//!
//! The named range operations (`read_range`/`write_range` for contiguous
//! maps, `read_stream`/`write_stream` for FIFOs) are the contract. On top
//! of them, [`Span`] and [`Payload`] give callers a compact
//! point/range/stream notation: a span says what is addressed, a payload
//! says what to write, and [`Device::get`]/[`Device::set`] dispatch onto
//! the underlying operation. Malformed notation fails before any bytes
//! reach the transport.

use crate::device::{Device, StreamRead, StreamWrite};
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Addressing shape for a facade operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    /// One register
    Point(u16),
    /// Contiguous `[start, stop)` range, address auto-incrementing
    Range { start: u16, stop: u16 },
    /// `count` elements at a fixed FIFO address
    Stream { addr: u16, count: u16 },
}

impl Span {
    /// Build a span from slice-style `start:stop:step` notation.
    ///
    /// A step of 1 (or none) selects the contiguous range `[start, stop)`.
    /// A step of 0 selects `stop` elements of the FIFO at `start`. Any
    /// other step has no wire operation behind it and is rejected here,
    /// before a transport is ever involved.
    pub fn with_step(start: u16, stop: u16, step: Option<u16>) -> Result<Self> {
        match step {
            None | Some(1) => Ok(Span::Range { start, stop }),
            Some(0) => Ok(Span::Stream {
                addr: start,
                count: stop,
            }),
            Some(step) => Err(Error::Usage(format!(
                "step {step} not supported (only steps 0 and 1 exist on the wire)"
            ))),
        }
    }

    /// Number of elements this span addresses.
    fn count(&self) -> Result<u16> {
        match *self {
            Span::Point(_) => Ok(1),
            Span::Range { start, stop } => stop.checked_sub(start).ok_or_else(|| {
                Error::Usage(format!(
                    "range stop 0x{stop:04x} precedes start 0x{start:04x}"
                ))
            }),
            Span::Stream { count, .. } => Ok(count),
        }
    }
}

impl From<u16> for Span {
    fn from(addr: u16) -> Self {
        Span::Point(addr)
    }
}

/// Data for a facade write: one word, or one word per addressed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Broadcast to every element the span addresses
    Word(u16),
    /// One word per element, length-checked against the span
    Words(Vec<u16>),
}

impl Payload {
    /// Expand to exactly `count` words: scalars broadcast, vectors must
    /// already agree with the span.
    fn materialize(self, count: u16) -> Result<Vec<u16>> {
        match self {
            Payload::Word(word) => Ok(vec![word; count as usize]),
            Payload::Words(words) if words.len() == count as usize => Ok(words),
            Payload::Words(words) => Err(Error::Usage(format!(
                "payload of {} words disagrees with span of {count}",
                words.len()
            ))),
        }
    }
}

impl From<u16> for Payload {
    fn from(word: u16) -> Self {
        Payload::Word(word)
    }
}

impl From<Vec<u16>> for Payload {
    fn from(words: Vec<u16>) -> Self {
        Payload::Words(words)
    }
}

impl From<&[u16]> for Payload {
    fn from(words: &[u16]) -> Self {
        Payload::Words(words.to_vec())
    }
}

impl<T: Transport> Device<T> {
    /// Read the contiguous range `[start, stop)`.
    pub async fn read_range(&mut self, start: u16, stop: u16) -> Result<StreamRead> {
        let count = Span::Range { start, stop }.count()?;
        self.read_map(start, count).await
    }

    /// Write across `[start, stop)`; a scalar payload is broadcast to the
    /// whole range.
    pub async fn write_range(
        &mut self,
        start: u16,
        stop: u16,
        payload: impl Into<Payload>,
    ) -> Result<StreamWrite> {
        let count = Span::Range { start, stop }.count()?;
        let words = payload.into().materialize(count)?;
        self.write_map(start, &words).await
    }

    /// Read `count` elements from the FIFO at `addr`.
    pub async fn read_stream(&mut self, addr: u16, count: u16) -> Result<StreamRead> {
        self.read_fifo(addr, count).await
    }

    /// Write `count` elements into the FIFO at `addr`; a scalar payload
    /// repeats `count` times.
    pub async fn write_stream(
        &mut self,
        addr: u16,
        count: u16,
        payload: impl Into<Payload>,
    ) -> Result<StreamWrite> {
        let words = payload.into().materialize(count)?;
        self.write_fifo(addr, &words).await
    }

    /// Read whatever `span` addresses. A point yields one value; streaming
    /// spans may yield fewer elements than addressed when the peripheral
    /// runs out of data.
    pub async fn get(&mut self, span: impl Into<Span>) -> Result<Vec<u16>> {
        match span.into() {
            Span::Point(addr) => Ok(vec![self.read_register(addr).await?]),
            Span::Range { start, stop } => Ok(self.read_range(start, stop).await?.values),
            Span::Stream { addr, count } => Ok(self.read_stream(addr, count).await?.values),
        }
    }

    /// Write `payload` to whatever `span` addresses.
    ///
    /// A point span with a single word is a plain register write. A point
    /// span with a word vector feeds the FIFO at that address, which is how
    /// hardware queues are filled without spelling out a count.
    pub async fn set(&mut self, span: impl Into<Span>, payload: impl Into<Payload>) -> Result<()> {
        match (span.into(), payload.into()) {
            (Span::Point(addr), Payload::Word(value)) => self.write_register(addr, value).await,
            (Span::Point(addr), Payload::Words(words)) => {
                self.write_fifo(addr, &words).await.map(|_| ())
            }
            (Span::Range { start, stop }, payload) => {
                self.write_range(start, stop, payload).await.map(|_| ())
            }
            (Span::Stream { addr, count }, payload) => {
                self.write_stream(addr, count, payload).await.map(|_| ())
            }
        }
    }
}
