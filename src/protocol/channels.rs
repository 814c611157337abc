//! Link inter-task communication channels.
//!
//! Uses `embassy-sync` bounded MPMC channels to bridge the async TCP I/O
//! thread with the synchronous control loop.  Both sides share these
//! static channels without heap allocation.
//!
//! ```text
//! ┌──────────────┐  RxChunk / LinkStatus  ┌──────────────┐
//! │   I/O Task   │───────────────────────▶│ Control Loop │
//! │  (async)     │◀───────────────────────│  (sync)      │
//! └──────────────┘  TxFrame / LinkControl └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::{String, Vec};

use super::frame::MAX_FRAME;

/// Bytes per inbound chunk.
pub const RX_CHUNK: usize = 128;

/// Raw bytes read from the socket, not yet framed.
pub struct RxChunk {
    pub data: Vec<u8, RX_CHUNK>,
}

/// One encoded frame for the socket.
pub struct TxFrame {
    pub data: Vec<u8, MAX_FRAME>,
}

/// Requests from the control loop to the I/O task.
pub enum LinkControl {
    Connect { host: String<32>, port: u16 },
    Close,
}

/// Connection state changes reported by the I/O task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Up,
    Down,
}

const RX_DEPTH: usize = 16;
const TX_DEPTH: usize = 8;

/// Inbound bytes: I/O task → control loop.
pub static RX_CHANNEL: Channel<CriticalSectionRawMutex, RxChunk, RX_DEPTH> = Channel::new();

/// Outbound frames: control loop → I/O task.
pub static TX_CHANNEL: Channel<CriticalSectionRawMutex, TxFrame, TX_DEPTH> = Channel::new();

/// Connect / close requests: control loop → I/O task.
pub static CONTROL_CHANNEL: Channel<CriticalSectionRawMutex, LinkControl, 2> = Channel::new();

/// Link up / down: I/O task → control loop.
pub static STATUS_CHANNEL: Channel<CriticalSectionRawMutex, LinkStatus, 4> = Channel::new();
