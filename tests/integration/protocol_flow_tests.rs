//! Server link flows: provisioning, identification on connect, and the
//! QUERY / WRITE / EXECUTE exchanges as the server sees them.

use airexchange::app::events::AppEvent;
use airexchange::app::service::{AppService, LinkPhase};
use airexchange::model::{Mode, Speed};
use airexchange::protocol::engine::funct;
use airexchange::protocol::frame;
use airexchange::protocol::records::WIFI_CONF_LEN;

use crate::mock_hw::{LogSink, MockHardware, MockNet, MockSystem, SERIAL, make_app};

struct Rig {
    app: AppService,
    hw: MockHardware,
    net: MockNet,
    sys: MockSystem,
    sink: LogSink,
}

impl Rig {
    fn new() -> Self {
        let (app, _nvs) = make_app();
        Self {
            app,
            hw: MockHardware::new(),
            net: MockNet::new(),
            sys: MockSystem::default(),
            sink: LogSink::new(),
        }
    }

    fn text(&mut self, cmd: &str) {
        self.app
            .handle_text_command(cmd.as_bytes(), &mut self.net, &mut self.sys, &mut self.sink);
    }

    fn tick(&mut self) {
        self.app.tick(&mut self.hw, &mut self.sink);
        self.app.service_link(&mut self.net, &mut self.sink);
    }

    /// Provision over BLE and bring the link all the way up.
    fn connect(&mut self) {
        self.text("SSID:home");
        self.text("PWD:secret12");
        self.text("SERVER:cloud.local");
        self.text("PORT:5000");
        self.text("WIFIACT:1");
        self.tick();
        assert_eq!(self.net.opened.last(), Some(&("cloud.local".to_owned(), 5000)));
        assert_eq!(self.app.link_phase(), LinkPhase::Connecting);

        self.net.open = true;
        self.app.on_link_up(&mut self.net, &mut self.sink);
        self.net.sent.clear();
    }

    fn send(&mut self, funct: u8, payload: &[u8]) {
        let bytes = frame::encode(SERIAL, funct, payload).expect("frame fits");
        self.bytes(&bytes);
    }

    fn bytes(&mut self, data: &[u8]) {
        self.app
            .handle_link_bytes(data, &mut self.net, &mut self.sys, &mut self.sink);
    }

    fn replies(&mut self) -> Vec<(u8, Vec<u8>)> {
        let frames = self.net.sent_frames();
        self.net.sent.clear();
        frames
    }
}

// ── Connection ────────────────────────────────────────────────

#[test]
fn link_up_sends_identification() {
    let mut rig = Rig::new();
    rig.connect();
    assert_eq!(rig.app.link_phase(), LinkPhase::Up);
    assert!(rig.sink.contains(&AppEvent::LinkUp));

    // Replay the link-up to see the identification frame itself.
    rig.app.on_link_up(&mut rig.net, &mut rig.sink);
    let frames = rig.replies();
    assert_eq!(frames.len(), 1);
    let (f, payload) = &frames[0];
    assert_eq!(*f, funct::IDENTIFICATION);
    assert_eq!(&payload[..4], &SERIAL.to_be_bytes());
    assert_eq!(payload.len(), 6);
}

#[test]
fn link_down_schedules_retry() {
    let mut rig = Rig::new();
    rig.connect();
    rig.net.open = false;
    rig.app.on_link_down(&mut rig.sink);
    assert_eq!(rig.app.link_phase(), LinkPhase::Offline);
    assert!(rig.sink.contains(&AppEvent::LinkDown));

    let opened = rig.net.opened.len();
    for _ in 0..9 {
        rig.tick();
    }
    assert_eq!(rig.net.opened.len(), opened);
    for _ in 0..2 {
        rig.tick();
    }
    assert_eq!(rig.net.opened.len(), opened + 1);
}

// ── WRITE / QUERY ─────────────────────────────────────────────

#[test]
fn write_oper_is_acked_and_queryable() {
    let mut rig = Rig::new();
    rig.connect();

    rig.send(
        funct::WRITE,
        &[0x00, 0x50, 0x00, 0x00, Mode::FixedCycle as u8, Speed::Low as u8],
    );
    assert_eq!(
        rig.replies(),
        vec![(funct::ACK, vec![0x31, funct::WRITE, 0x00, 0x50])]
    );

    rig.send(funct::QUERY, &[0x00, 0x50, 0x00, 0x00]);
    assert_eq!(
        rig.replies(),
        vec![(
            funct::ANSWER,
            vec![0x00, 0x50, 0x00, 0x00, Mode::FixedCycle as u8, Speed::Low as u8]
        )]
    );
}

#[test]
fn master_state_reports_running_speed() {
    let mut rig = Rig::new();
    rig.connect();
    rig.send(
        funct::WRITE,
        &[0x00, 0x50, 0x00, 0x00, Mode::Emission as u8, Speed::Medium as u8],
    );
    rig.replies();
    rig.tick();

    rig.send(funct::QUERY, &[0x00, 0x70, 0x00, 0x00]);
    let frames = rig.replies();
    assert_eq!(frames.len(), 1);
    let (f, payload) = &frames[0];
    assert_eq!(*f, funct::ANSWER);
    assert_eq!(&payload[..4], &[0x00, 0x70, 0x00, 0x00]);
    assert_eq!(payload[5], Speed::Medium as u8);
}

#[test]
fn oper_boost_is_rejected() {
    let mut rig = Rig::new();
    rig.connect();
    rig.send(
        funct::WRITE,
        &[0x00, 0x50, 0x00, 0x00, Mode::FixedCycle as u8, Speed::Boost as u8],
    );
    assert_eq!(
        rig.replies(),
        vec![(funct::NACK, vec![0x41, funct::WRITE, 0x00, 0x50])]
    );
    assert_eq!(rig.app.device().settings().mode_set, Mode::Off);
}

#[test]
fn read_only_object_write_is_nacked() {
    let mut rig = Rig::new();
    rig.connect();
    rig.send(funct::WRITE, &[0x00, 0x80, 0x00, 0x00, 0x01]);
    assert_eq!(
        rig.replies(),
        vec![(funct::NACK, vec![0x41, funct::WRITE, 0x00, 0x80])]
    );
}

#[test]
fn threshold_write_publishes_conf() {
    let mut rig = Rig::new();
    rig.connect();
    let mut record = vec![0x00, 0x20, 0x00, 0x00];
    record.extend_from_slice(&[0xFF, 0x02, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0, 0, 0]);
    rig.send(funct::WRITE, &record);

    let frames = rig.replies();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0], (funct::ACK, vec![0x31, funct::WRITE, 0x00, 0x20]));
    let (f, payload) = &frames[1];
    assert_eq!(*f, funct::VOLUNTARY);
    assert_eq!(&payload[..4], &[0x00, 0x20, 0x00, 0x00]);
    assert_eq!(payload[5], 0x02);
}

#[test]
fn wifi_conf_hides_password() {
    let mut rig = Rig::new();
    rig.connect();
    rig.send(funct::QUERY, &[0x00, 0x22, 0x00, 0x00]);
    let frames = rig.replies();
    let (f, payload) = &frames[0];
    assert_eq!(*f, funct::ANSWER);
    assert_eq!(payload.len(), 4 + WIFI_CONF_LEN);
    assert_eq!(&payload[4..8], b"home");
    // password field follows the 32-byte SSID field
    assert!(payload[4 + 32..4 + 96].iter().all(|&b| b == 0));
}

#[test]
fn stats_beyond_history_is_nacked() {
    let mut rig = Rig::new();
    rig.connect();
    rig.send(funct::QUERY, &[0x00, 0x60, 0x00, 0x05]);
    let frames = rig.replies();
    let (f, payload) = &frames[0];
    assert_eq!(*f, funct::NACK);
    assert_eq!(&payload[..2], &[0x43, funct::QUERY]);
}

#[test]
fn voluntary_state_follows_period() {
    let mut rig = Rig::new();
    rig.connect();

    let mut record = vec![0x00, 0x22, 0x00, 0x00];
    let mut wifi_conf = vec![0u8; WIFI_CONF_LEN];
    let period = 10u16.to_be_bytes();
    wifi_conf[WIFI_CONF_LEN - 2..].copy_from_slice(&period);
    record.extend_from_slice(&wifi_conf);
    rig.send(funct::WRITE, &record);
    assert_eq!(
        rig.replies(),
        vec![(funct::ACK, vec![0x31, funct::WRITE, 0x00, 0x22])]
    );
    assert_eq!(rig.app.device().settings().period, 10);
    // blank fields keep the stored credentials
    assert_eq!(rig.app.device().settings().ssid, "home");

    let mut voluntary = 0;
    for _ in 0..25 {
        rig.tick();
        voluntary += rig
            .replies()
            .iter()
            .filter(|(f, p)| *f == funct::VOLUNTARY && p[..2] == [0x00, 0x80])
            .count();
    }
    assert!((2..=3).contains(&voluntary), "got {voluntary}");
}

// ── Framing ───────────────────────────────────────────────────

#[test]
fn frame_split_across_reads_is_reassembled() {
    let mut rig = Rig::new();
    rig.connect();
    let bytes = frame::encode(SERIAL, funct::QUERY, &[0x00, 0x50, 0x00, 0x00]).expect("frame fits");
    let (head, tail) = bytes.split_at(5);

    rig.bytes(head);
    assert!(rig.replies().is_empty());
    rig.bytes(tail);
    assert_eq!(rig.replies().len(), 1);
}

#[test]
fn foreign_address_and_bad_crc_are_ignored() {
    let mut rig = Rig::new();
    rig.connect();

    let foreign = frame::encode(0x1234_5678, funct::QUERY, &[0x00, 0x50, 0x00, 0x00]).expect("frame fits");
    rig.bytes(&foreign);
    assert!(rig.replies().is_empty());

    let mut corrupt = frame::encode(SERIAL, funct::QUERY, &[0x00, 0x50, 0x00, 0x00])
        .expect("frame fits")
        .to_vec();
    let crc_at = corrupt.len() - 2;
    corrupt[crc_at] ^= 0xFF;
    rig.bytes(&corrupt);
    assert!(rig.replies().is_empty());

    rig.send(funct::QUERY, &[0x00, 0x50, 0x00, 0x00]);
    assert_eq!(rig.replies().len(), 1);
}

#[test]
fn unknown_function_gets_generic_nack() {
    let mut rig = Rig::new();
    rig.connect();
    rig.send(0x55, &[]);
    assert_eq!(rig.replies(), vec![(funct::NACK, vec![0x40, 0x55, 0x00, 0x00])]);
}

// ── EXECUTE_FUNCTION ──────────────────────────────────────────

#[test]
fn execute_reboot_acks_then_reboots() {
    let mut rig = Rig::new();
    rig.connect();
    rig.send(funct::EXECUTE_FUNCTION, &[0x00, 0x01]);
    assert_eq!(
        rig.replies(),
        vec![(funct::ACK, vec![0x34, funct::EXECUTE_FUNCTION, 0x00, 0x01])]
    );
    assert_eq!(rig.sys.reboots, 1);
}

#[test]
fn execute_clear_filter_warning() {
    let mut rig = Rig::new();
    rig.connect();
    rig.send(funct::EXECUTE_FUNCTION, &[0x00, 0x1A]);
    assert_eq!(
        rig.replies(),
        vec![(funct::ACK, vec![0x34, funct::EXECUTE_FUNCTION, 0x00, 0x1A])]
    );
    assert!(rig.sink.contains(&AppEvent::FilterCleared));
    assert_eq!(rig.app.filter_usage(), 0);
}

#[test]
fn execute_unknown_id_is_nacked() {
    let mut rig = Rig::new();
    rig.connect();
    rig.send(funct::EXECUTE_FUNCTION, &[0x12, 0x34]);
    assert_eq!(
        rig.replies(),
        vec![(funct::NACK, vec![0x44, funct::EXECUTE_FUNCTION, 0x12, 0x34])]
    );
    assert_eq!(rig.sys.reboots, 0);
}

#[test]
fn close_socket_holds_off_reconnect() {
    let mut rig = Rig::new();
    rig.connect();
    let opened = rig.net.opened.len();

    // 5 s requested plus the fixed grace period.
    rig.send(funct::EXECUTE_FUNCTION, &[0x00, 0x0A, 0x00, 0x00, 0x00, 0x05]);
    assert_eq!(rig.net.closes, 1);
    assert_eq!(rig.app.link_phase(), LinkPhase::Offline);

    for _ in 0..30 {
        rig.tick();
    }
    assert_eq!(rig.net.opened.len(), opened);
    for _ in 0..10 {
        rig.tick();
    }
    assert_eq!(rig.net.opened.len(), opened + 1);
}
