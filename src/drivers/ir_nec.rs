//! NEC infrared decoding and press classification.
//!
//! The receiver module strips the 38 kHz carrier; the RMT peripheral hands
//! over (mark, space) pairs in microseconds.  A full frame is a 9 ms /
//! 4.5 ms leader followed by 32 bits LSB first (address, !address,
//! command, !command).  While a key is held the remote repeats a
//! 9 ms / 2.25 ms burst every 108 ms.
//!
//! [`PressTracker`] turns frames and repeats into key codes: a key held
//! for [`LONG_PRESS_MS`] yields its code with [`LONG_PRESS_FLAG`] once, a
//! key released earlier yields the plain code.

use crate::ux::LONG_PRESS_FLAG;

/// Accepted deviation of every mark and space.
pub const MARGIN_US: u32 = 200;

const LEADER_MARK_US: u32 = 9000;
const LEADER_SPACE_US: u32 = 4500;
const REPEAT_SPACE_US: u32 = 2250;
const BIT_MARK_US: u32 = 560;
const ZERO_SPACE_US: u32 = 560;
const ONE_SPACE_US: u32 = 1690;

const FRAME_BITS: usize = 32;

/// Hold time that turns a press into a long press.
pub const LONG_PRESS_MS: u32 = 1500;
/// Silence after the last repeat that counts as release.
pub const RELEASE_GAP_MS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NecSymbol {
    /// Raw 32-bit frame, first received bit in bit 0.
    Frame(u32),
    Repeat,
}

fn near(value: u32, target: u32) -> bool {
    value.abs_diff(target) <= MARGIN_US
}

/// Decode one burst of (mark, space) pairs.
pub fn decode(pairs: &[(u32, u32)]) -> Option<NecSymbol> {
    let (&(mark, space), bits) = pairs.split_first()?;
    if !near(mark, LEADER_MARK_US) {
        return None;
    }
    if near(space, REPEAT_SPACE_US) {
        return Some(NecSymbol::Repeat);
    }
    if !near(space, LEADER_SPACE_US) || bits.len() < FRAME_BITS {
        return None;
    }

    let mut raw = 0u32;
    for (i, &(mark, space)) in bits[..FRAME_BITS].iter().enumerate() {
        if !near(mark, BIT_MARK_US) {
            return None;
        }
        if near(space, ONE_SPACE_US) {
            raw |= 1 << i;
        } else if !near(space, ZERO_SPACE_US) {
            return None;
        }
    }
    Some(NecSymbol::Frame(raw))
}

/// Command word of a raw frame (`!cmd << 8 | cmd`), if the command byte
/// matches its complement.
pub fn command_word(raw: u32) -> Option<u16> {
    let word = (raw >> 16) as u16;
    ((word >> 8) as u8 == !(word as u8)).then_some(word)
}

#[derive(Debug, Clone, Copy)]
struct Held {
    word: u16,
    since_ms: u32,
    last_ms: u32,
    long_sent: bool,
}

#[derive(Debug, Default)]
pub struct PressTracker {
    held: Option<Held>,
}

impl PressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a decoded symbol.  Returns a finished key code, if any.
    pub fn on_symbol(&mut self, symbol: NecSymbol, now_ms: u32) -> Option<u32> {
        match symbol {
            NecSymbol::Frame(raw) => {
                let released = self.release();
                self.held = command_word(raw).map(|word| Held {
                    word,
                    since_ms: now_ms,
                    last_ms: now_ms,
                    long_sent: false,
                });
                released
            }
            NecSymbol::Repeat => {
                let held = self.held.as_mut()?;
                held.last_ms = now_ms;
                if !held.long_sent && now_ms.wrapping_sub(held.since_ms) >= LONG_PRESS_MS {
                    held.long_sent = true;
                    return Some(LONG_PRESS_FLAG | u32::from(held.word));
                }
                None
            }
        }
    }

    /// Call between bursts; reports a release once the repeats stop.
    pub fn poll(&mut self, now_ms: u32) -> Option<u32> {
        let held = self.held?;
        if now_ms.wrapping_sub(held.last_ms) > RELEASE_GAP_MS {
            self.release()
        } else {
            None
        }
    }

    fn release(&mut self) -> Option<u32> {
        let held = self.held.take()?;
        (!held.long_sent).then_some(u32::from(held.word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pulse train for `address`/`command` as a remote sends it.
    fn frame(address: u8, command: u8) -> Vec<(u32, u32)> {
        let raw = u32::from(address)
            | u32::from(!address) << 8
            | u32::from(command) << 16
            | u32::from(!command) << 24;
        let mut pairs = vec![(9000, 4500)];
        for i in 0..32 {
            let space = if raw & (1 << i) != 0 { 1690 } else { 560 };
            pairs.push((560, space));
        }
        pairs.push((560, 0));
        pairs
    }

    #[test]
    fn decodes_power_key() {
        let symbol = decode(&frame(0x00, 0x16)).unwrap();
        let NecSymbol::Frame(raw) = symbol else {
            panic!("expected a frame, got {symbol:?}");
        };
        assert_eq!(command_word(raw), Some(0xE916));
    }

    #[test]
    fn tolerates_timing_jitter() {
        let jittered: Vec<_> = frame(0x00, 0x45)
            .into_iter()
            .map(|(m, s)| (m + 150, s.saturating_sub(150)))
            .collect();
        assert!(matches!(decode(&jittered), Some(NecSymbol::Frame(_))));
    }

    #[test]
    fn decodes_repeat_and_rejects_noise() {
        assert_eq!(decode(&[(9000, 2250), (560, 0)]), Some(NecSymbol::Repeat));
        assert_eq!(decode(&[(4000, 4500)]), None);
        assert_eq!(decode(&[]), None);
        assert_eq!(decode(&frame(0, 0x45)[..20]), None);
    }

    #[test]
    fn broken_complement_is_dropped() {
        assert_eq!(command_word(0x4545_00FF), None);
        let mut t = PressTracker::new();
        assert_eq!(t.on_symbol(NecSymbol::Frame(0x4545_00FF), 0), None);
        assert_eq!(t.poll(1000), None);
    }

    #[test]
    fn short_press_reported_on_release() {
        let mut t = PressTracker::new();
        let raw = 0xBA45_00FF;
        assert_eq!(t.on_symbol(NecSymbol::Frame(raw), 0), None);
        assert_eq!(t.on_symbol(NecSymbol::Repeat, 108), None);
        assert_eq!(t.poll(200), None);
        assert_eq!(t.poll(400), Some(0xBA45));
        assert_eq!(t.poll(600), None);
    }

    #[test]
    fn held_key_reports_long_once() {
        let mut t = PressTracker::new();
        t.on_symbol(NecSymbol::Frame(0xF807_00FF), 0);
        let mut codes = Vec::new();
        let mut now = 0;
        while now < 3000 {
            now += 108;
            codes.extend(t.on_symbol(NecSymbol::Repeat, now));
        }
        codes.extend(t.poll(now + 500));
        assert_eq!(codes, vec![LONG_PRESS_FLAG | 0xF807]);
    }

    #[test]
    fn new_frame_releases_previous_key() {
        let mut t = PressTracker::new();
        t.on_symbol(NecSymbol::Frame(0xBF40_00FF), 0);
        assert_eq!(t.on_symbol(NecSymbol::Frame(0xEA15_00FF), 150), Some(0xBF40));
        assert_eq!(t.poll(1000), Some(0xEA15));
    }
}
