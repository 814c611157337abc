//! End-to-end controller scenarios: mode changes arrive over the link,
//! the service ticks against mock hardware, and settings land in storage.

use airexchange::app::events::AppEvent;
use airexchange::app::service::AppService;
use airexchange::app::state::DeviceState;
use airexchange::config::SystemConfig;
use airexchange::model::{Direction, Mode, Speed};
use airexchange::protocol::engine::funct;
use airexchange::protocol::frame;

use crate::mock_hw::{
    FanCall, LogSink, MockHardware, MockNet, MockNvs, MockSystem, SERIAL, identity, make_app,
    make_app_with,
};

fn write_oper(mode: Mode, speed: Speed) -> Vec<u8> {
    frame::encode(
        SERIAL,
        funct::WRITE,
        &[0x00, 0x50, 0x00, 0x00, mode as u8, speed as u8],
    )
    .expect("OPER frame fits")
    .to_vec()
}

fn run(app: &mut AppService, hw: &mut MockHardware, sink: &mut LogSink, ticks: usize) {
    for _ in 0..ticks {
        app.tick(hw, sink);
    }
}

// ── Off ───────────────────────────────────────────────────────

#[test]
fn off_mode_keeps_fan_stopped() {
    let (mut app, _nvs) = make_app();
    let mut hw = MockHardware::new();
    let mut sink = LogSink::new();

    run(&mut app, &mut hw, &mut sink, 30);

    assert_eq!(app.mode(), Mode::Off);
    assert!(hw
        .calls
        .iter()
        .all(|c| c.direction == Direction::None && c.speed == Speed::None));
    assert_eq!(app.filter_usage(), 0);
}

// ── Fixed cycle ───────────────────────────────────────────────

#[test]
fn fixed_cycle_set_over_link_alternates_direction() {
    let (mut app, _nvs) = make_app();
    let (mut hw, mut sink) = (MockHardware::new(), LogSink::new());
    let (mut net, mut sys) = (MockNet::new(), MockSystem::default());

    app.handle_link_bytes(&write_oper(Mode::FixedCycle, Speed::Low), &mut net, &mut sys, &mut sink);

    run(&mut app, &mut hw, &mut sink, 1);
    assert_eq!(
        hw.last_call(),
        Some(FanCall {
            direction: Direction::Out,
            speed: Speed::Low
        })
    );
    assert!(sink.contains(&AppEvent::ModeChanged {
        from: Mode::Off,
        to: Mode::FixedCycle
    }));

    run(&mut app, &mut hw, &mut sink, 70);
    assert_eq!(hw.last_call().map(|c| c.direction), Some(Direction::In));

    // Two half periods later the fan has turned round exactly twice.
    run(&mut app, &mut hw, &mut sink, 75);
    assert_eq!(hw.reversals(), 2);
}

#[test]
fn settings_survive_restart() {
    let nvs = MockNvs::new();
    {
        let mut app = make_app_with(SystemConfig::default(), &nvs);
        let (mut net, mut sys, mut sink) = (MockNet::new(), MockSystem::default(), LogSink::new());
        app.handle_link_bytes(&write_oper(Mode::FixedCycle, Speed::High), &mut net, &mut sys, &mut sink);
    }

    let reloaded = DeviceState::load(Box::new(nvs.clone()), identity());
    assert_eq!(reloaded.settings().mode_set, Mode::FixedCycle);
    assert_eq!(reloaded.settings().speed_set, Speed::High);

    let mut app = make_app_with(SystemConfig::default(), &nvs);
    let (mut hw, mut sink) = (MockHardware::new(), LogSink::new());
    run(&mut app, &mut hw, &mut sink, 1);
    assert_eq!(
        hw.last_call(),
        Some(FanCall {
            direction: Direction::Out,
            speed: Speed::High
        })
    );
}

// ── Immission timeout ─────────────────────────────────────────

#[test]
fn immission_falls_back_to_fixed_cycle() {
    let nvs = MockNvs::new();
    let mut config = SystemConfig::default();
    config.timings.immission_emission_secs = 30;
    let mut app = make_app_with(config, &nvs);
    let (mut hw, mut sink) = (MockHardware::new(), LogSink::new());
    let (mut net, mut sys) = (MockNet::new(), MockSystem::default());

    app.handle_link_bytes(&write_oper(Mode::Immission, Speed::Low), &mut net, &mut sys, &mut sink);
    run(&mut app, &mut hw, &mut sink, 1);
    assert_eq!(app.mode(), Mode::Immission);
    assert_eq!(hw.last_call().map(|c| c.direction), Some(Direction::In));

    run(&mut app, &mut hw, &mut sink, 30);
    let reloaded = DeviceState::load(Box::new(nvs.clone()), identity());
    assert_eq!(reloaded.settings().mode_set, Mode::FixedCycle);

    run(&mut app, &mut hw, &mut sink, 1);
    assert_eq!(app.mode(), Mode::FixedCycle);
}

// ── Filter ────────────────────────────────────────────────────

#[test]
fn filter_wear_follows_speed_weight() {
    let (mut app, _nvs) = make_app();
    let (mut hw, mut sink) = (MockHardware::new(), LogSink::new());
    let (mut net, mut sys) = (MockNet::new(), MockSystem::default());

    app.handle_link_bytes(&write_oper(Mode::Emission, Speed::Low), &mut net, &mut sys, &mut sink);
    run(&mut app, &mut hw, &mut sink, 20);

    assert_eq!(app.filter_usage(), 20 * 6);
}

#[test]
fn filter_warning_raised_and_persisted() {
    let nvs = MockNvs::new();
    let mut config = SystemConfig::default();
    config.filter.threshold = 500;
    let mut app = make_app_with(config, &nvs);
    let (mut hw, mut sink) = (MockHardware::new(), LogSink::new());
    let (mut net, mut sys) = (MockNet::new(), MockSystem::default());

    app.handle_link_bytes(&write_oper(Mode::Emission, Speed::Medium), &mut net, &mut sys, &mut sink);
    run(&mut app, &mut hw, &mut sink, 49);
    assert!(!sink.events.iter().any(|e| matches!(e, AppEvent::FilterWarning { .. })));

    run(&mut app, &mut hw, &mut sink, 1);
    assert!(sink.contains(&AppEvent::FilterWarning { usage: 500 }));

    let reloaded = DeviceState::load(Box::new(nvs.clone()), identity());
    assert!(reloaded.settings().filter_warning());
    assert_eq!(reloaded.settings().filter_usage, 500);
}

#[test]
fn filter_warning_suppressed_when_disabled() {
    let nvs = MockNvs::new();
    let mut config = SystemConfig::default();
    config.filter.threshold = 100;
    let mut app = make_app_with(config, &nvs);
    let (mut hw, mut sink) = (MockHardware::new(), LogSink::new());
    let (mut net, mut sys) = (MockNet::new(), MockSystem::default());

    app.handle_text_command(b"WRNFLTDISABLE:1", &mut net, &mut sys, &mut sink);
    app.handle_link_bytes(&write_oper(Mode::Emission, Speed::Medium), &mut net, &mut sys, &mut sink);
    run(&mut app, &mut hw, &mut sink, 20);

    assert!(app.filter_usage() >= 100);
    assert!(!sink.events.iter().any(|e| matches!(e, AppEvent::FilterWarning { .. })));
    assert!(!app.device().settings().filter_warning());
}
