//! Fuzz target: `frame::elaborate` and `LinkSession::drain`
//!
//! Feeds arbitrary bytes to the frame cutter directly and, split at a
//! fuzzer-chosen point, through a link session.  Neither may panic, and
//! every frame handed out must lie inside the input.
//!
//! cargo fuzz run fuzz_frame_parser

#![no_main]

use airexchange::config::LinkConfig;
use airexchange::protocol::frame::{self, Elaborated, MAX_PAYLOAD};
use airexchange::protocol::session::LinkSession;
use libfuzzer_sys::fuzz_target;

const ADDRESS: u32 = 0xBEEF_CAFE;

fuzz_target!(|data: &[u8]| {
    if let Elaborated::Complete { consumed, frame } = frame::elaborate(data, ADDRESS) {
        assert!(consumed <= data.len(), "frame overruns input");
        assert!(frame.payload.len() <= MAX_PAYLOAD, "payload exceeds bound");
    }

    let split = data.first().map_or(0, |b| usize::from(*b)).min(data.len());
    let (head, tail) = data.split_at(split);

    let mut session = LinkSession::new(&LinkConfig::default());
    for chunk in [head, tail] {
        session.push(chunk);
        session.drain(ADDRESS, |f| {
            assert!(f.payload.len() <= MAX_PAYLOAD, "payload exceeds bound");
        });
    }

    // A reset session starts clean.
    session.reset();
    assert_eq!(session.buffered_len(), 0);
});
