//! Mock adapters for integration tests.
//!
//! Records every fan command, link frame and system request so tests can
//! assert on the full history without touching real peripherals.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use airexchange::app::events::AppEvent;
use airexchange::app::ports::{
    ConfigError, ConfigPort, ConnectivityError, ConnectivityPort, EventSink, FanPort, LinkError,
    LinkPort, SensorPort, StorageError, StoragePort, SystemPort,
};
use airexchange::app::service::AppService;
use airexchange::app::state::{DeviceIdentity, DeviceState};
use airexchange::config::SystemConfig;
use airexchange::error::CommsError;
use airexchange::fsm::context::SensorSnapshot;
use airexchange::model::{Direction, Speed};
use airexchange::protocol::frame::{self, Elaborated};

pub const SERIAL: u32 = 0xBEEF_CAFE;

// ── Fan call record ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanCall {
    pub direction: Direction,
    pub speed: Speed,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub snapshot: SensorSnapshot,
    pub calls: Vec<FanCall>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            snapshot: SensorSnapshot {
                temperature: 2100,
                relative_humidity: 450,
                voc: 100,
                lux: 300,
                ntc_internal: 2000,
                ntc_external: 1200,
            },
            calls: Vec::new(),
        }
    }

    pub fn last_call(&self) -> Option<FanCall> {
        self.calls.last().copied()
    }

    /// Number of direction reversals in the recorded history.
    pub fn reversals(&self) -> usize {
        self.calls
            .windows(2)
            .filter(|w| {
                w[0].direction != Direction::None
                    && w[1].direction != Direction::None
                    && w[0].direction != w[1].direction
            })
            .count()
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn read_all(&mut self) -> SensorSnapshot {
        self.snapshot
    }
}

impl FanPort for MockHardware {
    fn set_fan(&mut self, direction: Direction, speed: Speed) {
        self.calls.push(FanCall { direction, speed });
    }
}

// ── MockNvs ───────────────────────────────────────────────────

/// Shared in-memory store: clones see the same data, so a test can hand
/// one clone to `DeviceState` and reload from another.
#[derive(Clone, Default)]
pub struct MockNvs {
    store: Rc<RefCell<HashMap<String, Vec<u8>>>>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> usize {
        self.store.borrow().len()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let store = self.store.borrow();
        let v = store
            .get(&format!("{}::{}", namespace, key))
            .ok_or(StorageError::NotFound)?;
        if v.len() > buf.len() {
            return Err(StorageError::IoError);
        }
        buf[..v.len()].copy_from_slice(v);
        Ok(v.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.borrow_mut().remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.borrow().contains_key(&format!("{}::{}", namespace, key))
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(SystemConfig::default())
    }

    fn save(&self, _config: &SystemConfig) -> Result<(), ConfigError> {
        Ok(())
    }
}

// ── MockSystem ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSystem {
    pub reboots: u32,
    pub ota_urls: Vec<String>,
}

impl SystemPort for MockSystem {
    fn reboot(&mut self) {
        self.reboots += 1;
    }

    fn start_ota(&mut self, url: &str) -> Result<(), CommsError> {
        self.ota_urls.push(url.to_owned());
        Ok(())
    }
}

// ── MockNet ───────────────────────────────────────────────────

/// WiFi station plus server link.  `wifi_reachable` decides whether
/// `connect` succeeds.
pub struct MockNet {
    pub wifi_reachable: bool,
    pub wifi: bool,
    pub credentials: Option<(String, String)>,
    pub open: bool,
    pub opened: Vec<(String, u16)>,
    pub closes: u32,
    pub sent: Vec<Vec<u8>>,
    pub wps_starts: u32,
}

#[allow(dead_code)]
impl MockNet {
    pub fn new() -> Self {
        Self {
            wifi_reachable: true,
            wifi: false,
            credentials: None,
            open: false,
            opened: Vec::new(),
            closes: 0,
            sent: Vec::new(),
            wps_starts: 0,
        }
    }

    /// `(funct, payload)` of every frame sent so far.
    pub fn sent_frames(&self) -> Vec<(u8, Vec<u8>)> {
        self.sent
            .iter()
            .map(|bytes| match frame::elaborate(bytes, SERIAL) {
                Elaborated::Complete { frame, .. } => (frame.funct, frame.payload.to_vec()),
                other => panic!("device sent a malformed frame: {:?}", other),
            })
            .collect()
    }
}

impl Default for MockNet {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityPort for MockNet {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.credentials.is_none() {
            return Err(ConnectivityError::NoCredentials);
        }
        if !self.wifi_reachable {
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.wifi = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.wifi = false;
    }

    fn is_connected(&self) -> bool {
        self.wifi
    }

    fn poll(&mut self) {
        if !self.wifi_reachable {
            self.wifi = false;
        }
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        self.credentials = Some((ssid.to_owned(), password.to_owned()));
        Ok(())
    }

    fn start_wps(&mut self) -> Result<(), ConnectivityError> {
        self.wps_starts += 1;
        Ok(())
    }

    fn wps_running(&self) -> bool {
        false
    }
}

impl LinkPort for MockNet {
    fn open(&mut self, server: &str, port: u16) -> Result<(), LinkError> {
        self.opened.push((server.to_owned(), port));
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.closes += 1;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        self.sent.push(frame.to_vec());
        Ok(())
    }
}

// ── LogSink ───────────────────────────────────────────────────

/// Event sink that keeps every event for later inspection.
#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Builders ──────────────────────────────────────────────────

pub fn identity() -> DeviceIdentity {
    DeviceIdentity {
        serial: SERIAL,
        bt_addr: [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0x00],
        wifi_addr: [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE],
    }
}

/// Started service on top of `nvs` with the given configuration.
pub fn make_app_with(config: SystemConfig, nvs: &MockNvs) -> AppService {
    let device = DeviceState::load(Box::new(nvs.clone()), identity());
    let mut app = AppService::new(config, device);
    app.start(&mut LogSink::new());
    app
}

#[allow(dead_code)]
pub fn make_app() -> (AppService, MockNvs) {
    let nvs = MockNvs::new();
    let app = make_app_with(SystemConfig::default(), &nvs);
    (app, nvs)
}
