//! Interrupt-driven event system.
//!
//! Events are produced by:
//! - Timer callbacks (control tick)
//! - The BLE stack (custom-data write received)
//! - The IR receive thread (remote key press)
//! - The link I/O thread (connection state, inbound bytes)
//!
//! Events are consumed by the main control loop, which processes them
//! one at a time in FIFO order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Timer task  │────▶│              │     │              │
//! │ BLE host    │────▶│  Event Queue │────▶│  Main Loop   │
//! │ Link I/O    │────▶│  (lock-free) │     │  (consumer)  │
//! │ IR receiver │────▶│              │     │              │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Payloads never travel through the queue: the event only tells the main
//! loop which mailbox (BLE command slot, link channel, IR key channel) to
//! look at.

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events.
const EVENT_QUEUE_CAP: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    // ── Link ──────────────────────────────────────────────
    /// TCP link came up or dropped.
    LinkStatusChanged      = 10,
    /// Bytes are waiting in the link RX channel.
    LinkDataReceived       = 11,

    // ── BLE ───────────────────────────────────────────────
    /// A text command was written to the custom-data characteristic.
    BleCommandReceived     = 20,

    // ── IR remote ─────────────────────────────────────────
    /// A key press is waiting in the IR key channel.
    RemoteKeyReceived      = 21,

    // ── Control ───────────────────────────────────────────
    /// Ventilation controller tick (1 Hz).
    ControlTick            = 30,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// Callbacks write (produce), main loop reads (consume).

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
// SAFETY: EVENT_BUFFER slots are written only by the producer before it
// publishes EVENT_HEAD (Release) and read only by the consumer after it
// observes that head (Acquire).
static mut EVENT_BUFFER: [u8; EVENT_QUEUE_CAP] = [0; EVENT_QUEUE_CAP];

/// Push an event into the queue.
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

    if next_head == tail {
        return false; // Queue full, drop the event.
    }

    // SAFETY: single producer; the slot at `head` is not visible to the
    // consumer until EVENT_HEAD is stored below.
    unsafe {
        EVENT_BUFFER[head as usize] = event as u8;
    }

    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next event from the queue.
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None;
    }

    let raw = unsafe { EVENT_BUFFER[tail as usize] };
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

    event_from_u8(raw)
}

/// Drain all pending events into a callback, FIFO.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

pub fn queue_is_empty() -> bool {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);
    tail == head
}

/// Number of pending events.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed) as usize;
    let tail = EVENT_TAIL.load(Ordering::Relaxed) as usize;
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        10 => Some(Event::LinkStatusChanged),
        11 => Some(Event::LinkDataReceived),
        20 => Some(Event::BleCommandReceived),
        21 => Some(Event::RemoteKeyReceived),
        30 => Some(Event::ControlTick),
        _  => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_decode() {
        for e in [
            Event::LinkStatusChanged,
            Event::LinkDataReceived,
            Event::BleCommandReceived,
            Event::RemoteKeyReceived,
            Event::ControlTick,
        ] {
            assert_eq!(event_from_u8(e as u8), Some(e));
        }
        assert_eq!(event_from_u8(0), None);
    }
}
