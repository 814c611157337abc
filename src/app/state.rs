//! Device settings and identity.
//!
//! [`DeviceState`] is the single owner of every persisted setting.  It is
//! owned by the [`AppService`](super::service::AppService) and lent to the
//! protocol engine and the text command router, which mutate settings only
//! through the setters below.  Each setter updates the in-memory value
//! first and then writes the key through the [`StoragePort`]; a failed
//! write is logged and the new value stays in effect.
//!
//! ```text
//!   router / engine ──▶ DeviceState::set_*() ──▶ Settings (RAM)
//!                                         └────▶ StoragePort "airx::<key>"
//! ```

use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::fsm::context::ControlSettings;
use crate::model::{Mode, Speed, ThresholdSetting};

use super::ports::{StorageError, StoragePort};

/// Storage namespace of the device settings.
pub const NAMESPACE: &str = "airx";

/// `device_state` bit raised when the filter needs replacing.
pub const DEVICE_STATE_FILTER_WARNING: u8 = 0x01;

pub const SSID_MAX_LEN: usize = 32;
pub const PASSWORD_MAX_LEN: usize = 64;
pub const SERVER_MAX_LEN: usize = 32;
pub const OTA_URL_MAX_LEN: usize = 256;

/// Storage keys, one per persisted setting.
pub mod keys {
    pub const MODE_SET: &str = "mode_set";
    pub const SPEED_SET: &str = "speed_set";
    pub const RELATIVE_HUMIDITY_SET: &str = "r_hum_set";
    pub const LUX_SET: &str = "lux_set";
    pub const VOC_SET: &str = "voc_set";
    pub const TEMP_OFFSET: &str = "temp_offset";
    pub const RELATIVE_HUMIDITY_OFFSET: &str = "r_hum_offset";
    pub const DEVICE_STATE: &str = "device_state";
    pub const FILTER: &str = "filter";
    pub const SSID: &str = "ssid";
    pub const PASSWORD: &str = "password";
    pub const SERVER: &str = "server";
    pub const PORT: &str = "port";
    pub const ACTIVE: &str = "active";
    pub const PERIOD: &str = "period";
    pub const FC_SET: &str = "fc_set";
    pub const ROTATION: &str = "rotation";
    pub const ROLE: &str = "role";
    pub const FILTER_WARNING_DISABLED: &str = "wrn_flt_dis";
}

// ───────────────────────────────────────────────────────────────
// Identity
// ───────────────────────────────────────────────────────────────

/// Factory identity, read once at boot.  Never persisted by the firmware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Frame address on the binary protocol.
    pub serial: u32,
    pub bt_addr: [u8; 6],
    pub wifi_addr: [u8; 6],
}

impl DeviceIdentity {
    /// Serial as 8 upper-case hex digits.
    pub fn serial_text(&self) -> String {
        format!("{:08X}", self.serial)
    }
}

// ───────────────────────────────────────────────────────────────
// Settings
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mode_set: Mode,
    pub speed_set: Speed,
    pub relative_humidity_set: ThresholdSetting,
    pub lux_set: ThresholdSetting,
    pub voc_set: ThresholdSetting,
    /// Centidegrees added to valid temperature readings.
    pub temp_offset: i16,
    /// Tenths of %RH added to valid humidity readings.
    pub relative_humidity_offset: i16,
    pub device_state: u8,
    pub filter_usage: u64,
    pub ssid: String,
    pub password: String,
    pub server: String,
    /// 0 when not configured.
    pub port: u16,
    pub active: bool,
    pub period: u16,
    pub fc_set: u8,
    pub rotation: u8,
    pub role: u8,
    pub filter_warning_disabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode_set: Mode::Off,
            speed_set: Speed::None,
            relative_humidity_set: ThresholdSetting::NotConfigured,
            lux_set: ThresholdSetting::NotConfigured,
            voc_set: ThresholdSetting::NotConfigured,
            temp_offset: 0,
            relative_humidity_offset: 0,
            device_state: 0,
            filter_usage: 0,
            ssid: String::new(),
            password: String::new(),
            server: String::new(),
            port: 0,
            active: false,
            period: 0,
            fc_set: 0,
            rotation: 0,
            role: 0,
            filter_warning_disabled: false,
        }
    }
}

impl Settings {
    /// Every field needed to open the server link is present.
    pub fn link_credentials_complete(&self) -> bool {
        !self.ssid.is_empty() && !self.password.is_empty() && !self.server.is_empty() && self.port != 0
    }

    pub fn filter_warning(&self) -> bool {
        self.device_state & DEVICE_STATE_FILTER_WARNING != 0
    }
}

// ───────────────────────────────────────────────────────────────
// DeviceState
// ───────────────────────────────────────────────────────────────

pub struct DeviceState {
    storage: Box<dyn StoragePort>,
    identity: DeviceIdentity,
    settings: Settings,
    /// Set by a matching WIFIACTKEY; cleared at boot.
    wifi_act_key_unlocked: bool,
    ota_url: String,
}

impl DeviceState {
    /// Load every key from `storage`, falling back to the default of any
    /// key that is missing or unreadable.
    pub fn load(storage: Box<dyn StoragePort>, identity: DeviceIdentity) -> Self {
        let d = Settings::default();
        let s: &dyn StoragePort = &*storage;
        let settings = Settings {
            mode_set: read_or(s, keys::MODE_SET, d.mode_set),
            speed_set: read_or(s, keys::SPEED_SET, d.speed_set),
            relative_humidity_set: read_or(s, keys::RELATIVE_HUMIDITY_SET, d.relative_humidity_set),
            lux_set: read_or(s, keys::LUX_SET, d.lux_set),
            voc_set: read_or(s, keys::VOC_SET, d.voc_set),
            temp_offset: read_or(s, keys::TEMP_OFFSET, d.temp_offset),
            relative_humidity_offset: read_or(s, keys::RELATIVE_HUMIDITY_OFFSET, d.relative_humidity_offset),
            device_state: read_or(s, keys::DEVICE_STATE, d.device_state),
            filter_usage: read_or(s, keys::FILTER, d.filter_usage),
            ssid: read_or(s, keys::SSID, d.ssid),
            password: read_or(s, keys::PASSWORD, d.password),
            server: read_or(s, keys::SERVER, d.server),
            port: read_or(s, keys::PORT, d.port),
            active: read_or(s, keys::ACTIVE, d.active),
            period: read_or(s, keys::PERIOD, d.period),
            fc_set: read_or(s, keys::FC_SET, d.fc_set),
            rotation: read_or(s, keys::ROTATION, d.rotation),
            role: read_or(s, keys::ROLE, d.role),
            filter_warning_disabled: read_or(s, keys::FILTER_WARNING_DISABLED, d.filter_warning_disabled),
        };
        info!(
            "DeviceState: loaded (mode_set={}, speed_set={:?}, active={})",
            settings.mode_set.name(),
            settings.speed_set,
            settings.active
        );
        Self {
            storage,
            identity,
            settings,
            wifi_act_key_unlocked: false,
            ota_url: String::new(),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn serial(&self) -> u32 {
        self.identity.serial
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The subset of settings the controller reads each tick.
    pub fn control_settings(&self) -> ControlSettings {
        ControlSettings {
            mode_set: self.settings.mode_set,
            speed_set: self.settings.speed_set,
            relative_humidity_set: self.settings.relative_humidity_set,
            lux_set: self.settings.lux_set,
            voc_set: self.settings.voc_set,
        }
    }

    // ── Control settings ──────────────────────────────────────

    pub fn set_mode_set(&mut self, mode: Mode) {
        self.settings.mode_set = mode;
        self.persist(keys::MODE_SET, &mode);
    }

    pub fn set_speed_set(&mut self, speed: Speed) {
        self.settings.speed_set = speed;
        self.persist(keys::SPEED_SET, &speed);
    }

    pub fn set_relative_humidity_set(&mut self, setting: ThresholdSetting) {
        self.settings.relative_humidity_set = setting;
        self.persist(keys::RELATIVE_HUMIDITY_SET, &setting);
    }

    pub fn set_lux_set(&mut self, setting: ThresholdSetting) {
        self.settings.lux_set = setting;
        self.persist(keys::LUX_SET, &setting);
    }

    pub fn set_voc_set(&mut self, setting: ThresholdSetting) {
        self.settings.voc_set = setting;
        self.persist(keys::VOC_SET, &setting);
    }

    pub fn set_temp_offset(&mut self, offset: i16) {
        self.settings.temp_offset = offset;
        self.persist(keys::TEMP_OFFSET, &offset);
    }

    pub fn set_relative_humidity_offset(&mut self, offset: i16) {
        self.settings.relative_humidity_offset = offset;
        self.persist(keys::RELATIVE_HUMIDITY_OFFSET, &offset);
    }

    pub fn set_fc_set(&mut self, fc: u8) {
        self.settings.fc_set = fc;
        self.persist(keys::FC_SET, &fc);
    }

    pub fn set_rotation(&mut self, rotation: u8) {
        self.settings.rotation = rotation;
        self.persist(keys::ROTATION, &rotation);
    }

    pub fn set_role(&mut self, role: u8) {
        self.settings.role = role;
        self.persist(keys::ROLE, &role);
    }

    // ── Filter ────────────────────────────────────────────────

    pub fn set_filter_usage(&mut self, usage: u64) {
        self.settings.filter_usage = usage;
        self.persist(keys::FILTER, &usage);
    }

    pub fn set_filter_warning(&mut self, raised: bool) {
        let bits = if raised {
            self.settings.device_state | DEVICE_STATE_FILTER_WARNING
        } else {
            self.settings.device_state & !DEVICE_STATE_FILTER_WARNING
        };
        if bits != self.settings.device_state {
            self.settings.device_state = bits;
            self.persist(keys::DEVICE_STATE, &bits);
        }
    }

    pub fn set_filter_warning_disabled(&mut self, disabled: bool) {
        self.settings.filter_warning_disabled = disabled;
        self.persist(keys::FILTER_WARNING_DISABLED, &disabled);
    }

    // ── Link ──────────────────────────────────────────────────

    pub fn set_ssid(&mut self, ssid: &str) {
        self.settings.ssid = ssid.to_owned();
        self.persist(keys::SSID, &self.settings.ssid.clone());
    }

    pub fn set_password(&mut self, password: &str) {
        self.settings.password = password.to_owned();
        self.persist(keys::PASSWORD, &self.settings.password.clone());
    }

    pub fn set_server(&mut self, server: &str) {
        self.settings.server = server.to_owned();
        self.persist(keys::SERVER, &self.settings.server.clone());
    }

    pub fn set_port(&mut self, port: u16) {
        self.settings.port = port;
        self.persist(keys::PORT, &port);
    }

    pub fn set_period(&mut self, period: u16) {
        self.settings.period = period;
        self.persist(keys::PERIOD, &period);
    }

    /// Enable or disable the server link.
    ///
    /// Enabling is refused while any credential is missing; the setting is
    /// left unchanged and `false` is returned.
    pub fn set_active(&mut self, active: bool) -> bool {
        if active && !self.settings.link_credentials_complete() {
            warn!("DeviceState: link enable rejected, credentials incomplete");
            return false;
        }
        self.settings.active = active;
        self.persist(keys::ACTIVE, &active);
        true
    }

    // ── Transient ─────────────────────────────────────────────

    pub fn wifi_act_key_unlocked(&self) -> bool {
        self.wifi_act_key_unlocked
    }

    pub fn unlock_wifi_act_key(&mut self) {
        self.wifi_act_key_unlocked = true;
    }

    pub fn ota_url(&self) -> &str {
        &self.ota_url
    }

    pub fn set_ota_url(&mut self, url: &str) {
        self.ota_url = url.to_owned();
    }

    /// Restore factory defaults and rewrite every key.
    pub fn factory_reset(&mut self) {
        info!("DeviceState: restoring factory defaults");
        self.settings = Settings::default();
        self.wifi_act_key_unlocked = false;
        self.ota_url.clear();
        self.persist_all();
    }

    fn persist_all(&mut self) {
        let s = self.settings.clone();
        self.persist(keys::MODE_SET, &s.mode_set);
        self.persist(keys::SPEED_SET, &s.speed_set);
        self.persist(keys::RELATIVE_HUMIDITY_SET, &s.relative_humidity_set);
        self.persist(keys::LUX_SET, &s.lux_set);
        self.persist(keys::VOC_SET, &s.voc_set);
        self.persist(keys::TEMP_OFFSET, &s.temp_offset);
        self.persist(keys::RELATIVE_HUMIDITY_OFFSET, &s.relative_humidity_offset);
        self.persist(keys::DEVICE_STATE, &s.device_state);
        self.persist(keys::FILTER, &s.filter_usage);
        self.persist(keys::SSID, &s.ssid);
        self.persist(keys::PASSWORD, &s.password);
        self.persist(keys::SERVER, &s.server);
        self.persist(keys::PORT, &s.port);
        self.persist(keys::ACTIVE, &s.active);
        self.persist(keys::PERIOD, &s.period);
        self.persist(keys::FC_SET, &s.fc_set);
        self.persist(keys::ROTATION, &s.rotation);
        self.persist(keys::ROLE, &s.role);
        self.persist(keys::FILTER_WARNING_DISABLED, &s.filter_warning_disabled);
    }

    fn persist<T: Serialize>(&mut self, key: &str, value: &T) {
        let result = postcard::to_allocvec(value)
            .map_err(|_| StorageError::Codec)
            .and_then(|bytes| self.storage.write(NAMESPACE, key, &bytes));
        match result {
            Ok(()) => debug!("DeviceState: saved '{}'", key),
            Err(e) => warn!("DeviceState: failed to save '{}': {}", key, e),
        }
    }
}

/// Largest encoded value: a 64-byte password plus its length prefix.
const READ_BUF_LEN: usize = 96;

fn read_or<T: DeserializeOwned>(storage: &dyn StoragePort, key: &str, default: T) -> T {
    let mut buf = [0u8; READ_BUF_LEN];
    match storage.read(NAMESPACE, key, &mut buf) {
        Ok(n) => match postcard::from_bytes(&buf[..n]) {
            Ok(v) => v,
            Err(_) => {
                warn!("DeviceState: '{}' corrupted, using default", key);
                default
            }
        },
        Err(StorageError::NotFound) => default,
        Err(e) => {
            warn!("DeviceState: failed to read '{}': {}", key, e);
            default
        }
    }
}
