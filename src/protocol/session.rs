//! Per-connection receive state: frame assembly plus an inbound rate limit.
//!
//! One [`LinkSession`] lives as long as the TCP connection.  On every
//! link-up the service calls [`LinkSession::reset`] so a reconnecting
//! server starts with an empty buffer and a full token bucket.

use burster::Limiter;
use core::time::Duration;
use log::{debug, warn};

use crate::config::LinkConfig;

use super::frame::{Elaborated, Frame, FrameAssembler, elaborate};

/// Counters reported after a [`LinkSession::drain`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub handled: usize,
    pub throttled: usize,
    pub discarded: bool,
}

pub struct LinkSession {
    assembler: FrameAssembler,
    limiter: burster::TokenBucket<fn() -> Duration>,
    frames_per_sec: u64,
    frame_burst: u64,
}

impl LinkSession {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            assembler: FrameAssembler::new(),
            limiter: make_bucket(config.frames_per_sec, config.frame_burst),
            frames_per_sec: config.frames_per_sec,
            frame_burst: config.frame_burst,
        }
    }

    /// Fresh buffer and a full bucket.
    pub fn reset(&mut self) {
        self.assembler.reset();
        self.limiter = make_bucket(self.frames_per_sec, self.frame_burst);
    }

    pub fn push(&mut self, data: &[u8]) {
        self.assembler.push(data);
    }

    pub fn buffered_len(&self) -> usize {
        self.assembler.len()
    }

    /// Cut every complete frame out of the buffer and hand it to `handle`.
    ///
    /// Frames beyond the token budget are dropped without a reply.  An
    /// invalid frame discards the whole accumulation buffer.
    pub fn drain(&mut self, own_address: u32, mut handle: impl FnMut(&Frame<'_>)) -> DrainStats {
        let mut stats = DrainStats::default();
        loop {
            let skipped = self.assembler.discard_noise();
            if skipped > 0 {
                debug!("Link: skipped {} bytes before STX", skipped);
            }
            match elaborate(self.assembler.buffered(), own_address) {
                Elaborated::Complete { consumed, frame } => {
                    if self.limiter.try_consume(1).is_ok() {
                        handle(&frame);
                        stats.handled += 1;
                    } else {
                        warn!("Link: rate limit hit, dropping frame 0x{:02X}", frame.funct);
                        stats.throttled += 1;
                    }
                    self.assembler.consume(consumed);
                }
                Elaborated::Incomplete => break,
                Elaborated::Invalid => {
                    debug!("Link: invalid frame, discarding {} bytes", self.assembler.len());
                    self.assembler.reset();
                    stats.discarded = true;
                    break;
                }
            }
        }
        stats
    }
}

fn make_bucket(per_sec: u64, burst: u64) -> burster::TokenBucket<fn() -> Duration> {
    burster::TokenBucket::new_with_time_provider(per_sec, burst, platform_now as fn() -> Duration)
}

// ── Platform time for rate limiter ───────────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    let us = unsafe { esp_idf_sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::protocol::frame::encode;

    const ADDR: u32 = 0xBEEF_CAFE;

    fn make_session() -> LinkSession {
        LinkSession::new(&LinkConfig::default())
    }

    fn query_frame() -> heapless::Vec<u8, { crate::protocol::frame::MAX_FRAME }> {
        encode(ADDR, 0x3F, &[0x00, 0x10, 0x00, 0x00]).unwrap()
    }

    #[test]
    fn split_frame_is_handled_once_complete() {
        let mut s = make_session();
        let f = query_frame();
        let mut seen = 0;

        s.push(&f[..5]);
        assert_eq!(s.drain(ADDR, |_| seen += 1).handled, 0);
        s.push(&f[5..]);
        assert_eq!(s.drain(ADDR, |_| seen += 1).handled, 1);
        assert_eq!(seen, 1);
        assert_eq!(s.buffered_len(), 0);
    }

    #[test]
    fn back_to_back_frames_in_one_chunk() {
        let mut s = make_session();
        let f = query_frame();
        s.push(&f);
        s.push(&f);
        let stats = s.drain(ADDR, |frame| assert_eq!(frame.funct, 0x3F));
        assert_eq!(stats.handled, 2);
    }

    #[test]
    fn invalid_frame_discards_buffer() {
        let mut s = make_session();
        let mut f = query_frame();
        let n = f.len();
        f[n - 2] ^= 0xFF;
        s.push(&f);
        s.push(&query_frame());
        let stats = s.drain(ADDR, |_| {});
        assert!(stats.discarded);
        assert_eq!(stats.handled, 0);
        assert_eq!(s.buffered_len(), 0);
    }

    #[test]
    fn noise_without_stx_is_not_kept() {
        let mut s = make_session();
        s.push(&[0x55; 100]);
        let stats = s.drain(ADDR, |_| {});
        assert_eq!(stats.handled, 0);
        assert!(!stats.discarded);
        assert_eq!(s.buffered_len(), 0);

        s.push(&[0x01, 0x02]);
        s.push(&query_frame());
        assert_eq!(s.drain(ADDR, |_| {}).handled, 1);
        assert_eq!(s.buffered_len(), 0);
    }

    #[test]
    fn burst_beyond_bucket_is_throttled() {
        let mut s = make_session();
        let f = query_frame();
        for _ in 0..11 {
            s.push(&f);
        }
        let stats = s.drain(ADDR, |_| {});
        assert_eq!(stats.handled, 10);
        assert_eq!(stats.throttled, 1);
    }

    #[test]
    fn reset_refills_bucket() {
        let mut s = make_session();
        let f = query_frame();
        for _ in 0..10 {
            s.push(&f);
        }
        s.drain(ADDR, |_| {});
        s.reset();
        s.push(&f);
        assert_eq!(s.drain(ADDR, |_| {}).handled, 1);
    }
}
