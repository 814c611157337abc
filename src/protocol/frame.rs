//! STX/ETX frame codec.
//!
//! Wire format (multi-byte fields big-endian):
//! ```text
//! ┌─────┬──────────┬─────────┬───────┬──────────┬─────┬─────┐
//! │ STX │ ADDR (4) │ LEN (2) │ FUNCT │ DATA (N) │ CRC │ ETX │
//! │ 0A  │ serial   │ 8 + N   │       │          │     │ 0D  │
//! └─────┴──────────┴─────────┴───────┴──────────┴─────┴─────┘
//!        └──────────── CRC-8 over these bytes ───┘
//! ```
//!
//! The TCP stream delivers arbitrary slices; [`FrameAssembler`] buffers
//! them and [`elaborate`] cuts frames out of the buffer.  An invalid frame
//! discards the whole buffer, there is no resynchronisation inside it.

use heapless::Vec;
use log::warn;

use super::crc::crc8;

pub const STX: u8 = 0x0A;
pub const ETX: u8 = 0x0D;

/// ADDR + LEN + FUNCT + CRC: the part of LEN that is not payload.
pub const LEN_OVERHEAD: usize = 8;
/// Bytes from STX needed to read ADDR and LEN.
const HEADER_LEN: usize = 7;
const FUNCT_POS: usize = 7;
const DATA_POS: usize = 8;

/// Largest payload the firmware emits or accepts (PROFILE answer).
pub const MAX_PAYLOAD: usize = 192;
/// Largest complete frame.
pub const MAX_FRAME: usize = MAX_PAYLOAD + LEN_OVERHEAD + 2;
/// Receive accumulation capacity.
pub const ASSEMBLY_CAPACITY: usize = 512;

/// A validated frame borrowed from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub funct: u8,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elaborated<'a> {
    /// A frame for this device; `consumed` bytes (from the buffer start)
    /// can be dropped.
    Complete { consumed: usize, frame: Frame<'a> },
    /// More bytes are needed.
    Incomplete,
    /// Bad terminator, foreign address, bad length or CRC mismatch.
    Invalid,
}

/// Cut the first frame out of `buf`.
pub fn elaborate(buf: &[u8], own_address: u32) -> Elaborated<'_> {
    let Some(start) = buf.iter().position(|&b| b == STX) else {
        return Elaborated::Incomplete;
    };
    let rest = &buf[start..];
    if rest.len() < HEADER_LEN {
        return Elaborated::Incomplete;
    }

    let address = u32::from_be_bytes([rest[1], rest[2], rest[3], rest[4]]);
    let len = usize::from(u16::from_be_bytes([rest[5], rest[6]]));
    if !(LEN_OVERHEAD..=MAX_PAYLOAD + LEN_OVERHEAD).contains(&len) {
        return Elaborated::Invalid;
    }

    let total = len + 2;
    if rest.len() < total {
        return Elaborated::Incomplete;
    }
    if rest[total - 1] != ETX || address != own_address {
        return Elaborated::Invalid;
    }
    if crc8(&rest[1..total - 2]) != rest[total - 2] {
        return Elaborated::Invalid;
    }

    Elaborated::Complete {
        consumed: start + total,
        frame: Frame {
            funct: rest[FUNCT_POS],
            payload: &rest[DATA_POS..total - 2],
        },
    }
}

/// Encode one frame.  Returns `None` if the payload is too large.
pub fn encode(address: u32, funct: u8, payload: &[u8]) -> Option<Vec<u8, MAX_FRAME>> {
    if payload.len() > MAX_PAYLOAD {
        return None;
    }
    let len = (LEN_OVERHEAD + payload.len()) as u16;

    let mut out: Vec<u8, MAX_FRAME> = Vec::new();
    out.push(STX).ok()?;
    out.extend_from_slice(&address.to_be_bytes()).ok()?;
    out.extend_from_slice(&len.to_be_bytes()).ok()?;
    out.push(funct).ok()?;
    out.extend_from_slice(payload).ok()?;
    let crc = crc8(&out[1..]);
    out.push(crc).ok()?;
    out.push(ETX).ok()?;
    Some(out)
}

// ───────────────────────────────────────────────────────────────
// Assembler
// ───────────────────────────────────────────────────────────────

/// Accumulates link bytes until [`elaborate`] finds a frame.
pub struct FrameAssembler {
    buf: Vec<u8, ASSEMBLY_CAPACITY>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append received bytes.  On overflow the buffer is discarded and
    /// refilled from `data`.
    pub fn push(&mut self, data: &[u8]) {
        if self.buf.extend_from_slice(data).is_err() {
            warn!("Frame: receive buffer overflow, discarding {} bytes", self.buf.len());
            self.buf.clear();
            let keep = data.len().min(ASSEMBLY_CAPACITY);
            // cannot fail: keep <= capacity of the empty buffer
            let _ = self.buf.extend_from_slice(&data[data.len() - keep..]);
        }
    }

    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Drop the first `n` bytes after a frame was handled.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.copy_within(n.., 0);
        self.buf.truncate(self.buf.len() - n);
    }

    /// Drop everything before the first STX.  Returns the number of bytes
    /// dropped; a buffer without STX is emptied.
    pub fn discard_noise(&mut self) -> usize {
        let n = self
            .buf
            .iter()
            .position(|&b| b == STX)
            .unwrap_or(self.buf.len());
        self.consume(n);
        n
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
