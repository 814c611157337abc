//! IR remote keys through the adapter and the service.

use airexchange::adapters::ir_remote::IrRemoteAdapter;
use airexchange::app::events::AppEvent;
use airexchange::app::service::AppService;
use airexchange::app::state::DeviceState;
use airexchange::model::{Direction, Mode, Speed, ThresholdSetting};
use airexchange::protocol::engine::funct;
use airexchange::protocol::frame;
use airexchange::ux::{Key, KeyPress, MENU_TIMEOUT_SECS, UxState};

use crate::mock_hw::{
    LogSink, MockHardware, MockNet, MockNvs, MockSystem, SERIAL, identity, make_app,
};

struct Hand {
    app: AppService,
    nvs: MockNvs,
    remote: IrRemoteAdapter,
    hw: MockHardware,
    net: MockNet,
    sys: MockSystem,
    sink: LogSink,
}

impl Hand {
    fn new() -> Self {
        let (app, nvs) = make_app();
        Self {
            app,
            nvs,
            remote: IrRemoteAdapter::new(),
            hw: MockHardware::new(),
            net: MockNet::new(),
            sys: MockSystem::default(),
            sink: LogSink::new(),
        }
    }

    /// Receive raw codes and run them through the firmware loop path.
    fn codes(&mut self, codes: &[u32]) -> bool {
        for &code in codes {
            self.remote.sim_receive(code);
        }
        self.app
            .handle_remote_keys(&mut self.remote, &mut self.net, &mut self.sys, &mut self.sink)
    }

    fn press(&mut self, key: Key) -> bool {
        self.codes(&[KeyPress::short(key).code()])
    }

    fn hold(&mut self, key: Key) -> bool {
        self.codes(&[KeyPress::long(key).code()])
    }

    fn run(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.app.tick(&mut self.hw, &mut self.sink);
        }
    }
}

// ── Power, mode and speed ─────────────────────────────────────

#[test]
fn power_key_toggles_unit_and_persists() {
    let mut hand = Hand::new();
    hand.codes(&[0xE916]);
    hand.run(1);
    assert_eq!(hand.app.mode(), Mode::AutomaticCycle);

    let reloaded = DeviceState::load(Box::new(hand.nvs.clone()), identity());
    assert_eq!(reloaded.settings().mode_set, Mode::AutomaticCycle);
    assert_eq!(reloaded.settings().speed_set, Speed::Medium);

    hand.press(Key::Power);
    hand.run(1);
    assert_eq!(hand.app.mode(), Mode::Off);
    assert_eq!(hand.app.device().settings().speed_set, Speed::None);
    assert_eq!(hand.hw.last_call().map(|c| c.direction), Some(Direction::None));
}

#[test]
fn power_on_returns_to_mode_set_by_server() {
    let mut hand = Hand::new();
    let oper = frame::encode(
        SERIAL,
        funct::WRITE,
        &[0x00, 0x50, 0x00, 0x00, Mode::FixedCycle as u8, Speed::High as u8],
    )
    .expect("OPER frame fits");
    hand.app
        .handle_link_bytes(&oper, &mut hand.net, &mut hand.sys, &mut hand.sink);
    hand.run(2);

    hand.press(Key::Power);
    hand.run(1);
    assert_eq!(hand.app.mode(), Mode::Off);

    hand.press(Key::Power);
    let s = hand.app.device().settings();
    assert_eq!((s.mode_set, s.speed_set), (Mode::FixedCycle, Speed::High));
}

#[test]
fn speed_keys_step_within_night_and_high() {
    let mut hand = Hand::new();
    hand.press(Key::Emission);
    for _ in 0..4 {
        hand.press(Key::SpeedDown);
    }
    hand.run(1);
    assert_eq!(
        hand.hw.last_call().map(|c| (c.direction, c.speed)),
        Some((Direction::Out, Speed::Night))
    );

    for _ in 0..6 {
        hand.press(Key::SpeedUp);
    }
    assert_eq!(hand.app.device().settings().speed_set, Speed::High);
}

// ── Threshold menus ───────────────────────────────────────────

#[test]
fn menu_change_publishes_conf_frame() {
    let mut hand = Hand::new();
    hand.hold(Key::Lux);
    assert!(hand.net.sent_frames().is_empty());

    hand.press(Key::Lux);
    hand.press(Key::Lux);
    assert_eq!(hand.app.device().settings().lux_set, ThresholdSetting::Medium);

    let frames = hand.net.sent_frames();
    assert_eq!(frames.len(), 2);
    for (f, payload) in &frames {
        assert_eq!(*f, funct::VOLUNTARY);
        assert_eq!(&payload[..4], &[0x00, 0x20, 0x00, 0x00]);
    }
}

#[test]
fn menu_closes_after_idle_minute_of_ticks() {
    let mut hand = Hand::new();
    hand.hold(Key::Voc);
    hand.run(MENU_TIMEOUT_SECS - 1);
    assert!(matches!(hand.app.ux().state(), UxState::Setting(_)));

    hand.run(1);
    assert_eq!(hand.app.ux().state(), UxState::Operative);

    // Back in operative a short VOC press only shows the setting.
    hand.press(Key::Voc);
    assert_eq!(hand.app.device().settings().voc_set, ThresholdSetting::NotConfigured);
}

// ── Long presses ──────────────────────────────────────────────

#[test]
fn long_filter_key_resets_counter() {
    let mut hand = Hand::new();
    hand.press(Key::Emission);
    hand.run(20);
    assert!(hand.app.filter_usage() > 0);

    hand.hold(Key::Filter);
    assert!(hand.sink.contains(&AppEvent::FilterCleared));
    assert_eq!(hand.app.filter_usage(), 0);
}

#[test]
fn long_back_key_asks_for_advertising() {
    let mut hand = Hand::new();
    assert!(!hand.press(Key::Back));
    assert!(hand.hold(Key::Back));
}

#[test]
fn unknown_codes_are_ignored() {
    let mut hand = Hand::new();
    assert!(!hand.codes(&[0x7F80, 0x8000_E916]));
    assert_eq!(hand.app.device().settings().mode_set, Mode::Off);
}
