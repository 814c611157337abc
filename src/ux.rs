//! IR remote user interface.
//!
//! Twelve keys, some with a long-press variant.  In the operative state the
//! keys switch power, mode and speed; a long press on a sensor key opens
//! that sensor's threshold menu, where short presses of the same key cycle
//! the setting.  A menu closes on the back key or after
//! [`MENU_TIMEOUT_SECS`] without a key.
//!
//! ```text
//!   Operative ──(RH/VOC/LUX long)──▶ Setting(sensor) ──(Back | 60 s)──▶ Operative
//!                                        │   ▲
//!                                        └───┘ other sensor long
//! ```
//!
//! The machine only touches [`DeviceState`]; anything that needs a port
//! comes back in the [`UxOutcome`].

use log::{debug, info};

use crate::app::commands::AppCommand;
use crate::app::state::DeviceState;
use crate::model::{Mode, Speed, ThresholdSetting};

/// Idle time after which an open threshold menu closes.
pub const MENU_TIMEOUT_SECS: u32 = 60;

/// Set on a key code when the key was held.
pub const LONG_PRESS_FLAG: u32 = 0x8000_0000;

// ───────────────────────────────────────────────────────────────
// Keys
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Power,
    Show,
    SpeedUp,
    Emission,
    AutomaticCycle,
    Immission,
    SpeedDown,
    Humidity,
    Voc,
    Back,
    Lux,
    Filter,
}

/// NEC command words of the supplied remote (`!cmd << 8 | cmd`).
const KEY_CODES: [(u16, Key); 12] = [
    (0xE916, Key::Power),
    (0xBA45, Key::Show),
    (0xBF40, Key::SpeedUp),
    (0xBB44, Key::Emission),
    (0xB946, Key::AutomaticCycle),
    (0xBC43, Key::Immission),
    (0xEA15, Key::SpeedDown),
    (0xB847, Key::Humidity),
    (0xA55A, Key::Voc),
    (0xE619, Key::Back),
    (0xF609, Key::Lux),
    (0xF807, Key::Filter),
];

impl Key {
    pub fn from_code(code: u16) -> Option<Self> {
        KEY_CODES.iter().find(|(c, _)| *c == code).map(|&(_, k)| k)
    }

    pub fn code(self) -> u16 {
        KEY_CODES
            .iter()
            .find(|(_, k)| *k == self)
            .map_or(0, |&(c, _)| c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub long: bool,
}

impl KeyPress {
    pub fn short(key: Key) -> Self {
        Self { key, long: false }
    }

    pub fn long(key: Key) -> Self {
        Self { key, long: true }
    }

    /// Decode a receiver code: the low 16 bits select the key,
    /// [`LONG_PRESS_FLAG`] marks a held key.
    pub fn from_code(code: u32) -> Option<Self> {
        let key = Key::from_code((code & 0xFFFF) as u16)?;
        Some(Self {
            key,
            long: code & LONG_PRESS_FLAG != 0,
        })
    }

    pub fn code(self) -> u32 {
        let flag = if self.long { LONG_PRESS_FLAG } else { 0 };
        flag | u32::from(self.key.code())
    }
}

// ───────────────────────────────────────────────────────────────
// State
// ───────────────────────────────────────────────────────────────

/// Environmental trigger whose threshold a menu edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    Humidity,
    Voc,
    Lux,
}

impl Sensor {
    fn for_key(key: Key) -> Option<Self> {
        match key {
            Key::Humidity => Some(Self::Humidity),
            Key::Voc => Some(Self::Voc),
            Key::Lux => Some(Self::Lux),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Humidity => "RH",
            Self::Voc => "VOC",
            Self::Lux => "LUX",
        }
    }

    fn setting(self, dev: &DeviceState) -> ThresholdSetting {
        let s = dev.settings();
        match self {
            Self::Humidity => s.relative_humidity_set,
            Self::Voc => s.voc_set,
            Self::Lux => s.lux_set,
        }
    }

    fn store(self, dev: &mut DeviceState, setting: ThresholdSetting) {
        match self {
            Self::Humidity => dev.set_relative_humidity_set(setting),
            Self::Voc => dev.set_voc_set(setting),
            Self::Lux => dev.set_lux_set(setting),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UxState {
    Operative,
    Setting(Sensor),
}

/// What the service must do after a key press.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UxOutcome {
    pub command: Option<AppCommand>,
    /// Restart BLE advertising for provisioning.
    pub advertise: bool,
}

pub struct RemoteUx {
    state: UxState,
    menu_secs_left: u32,
    /// Last mode other than `Off`; power-on returns to it.
    last_mode: Mode,
    /// Last speed other than `None`.
    last_speed: Speed,
}

impl Default for RemoteUx {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteUx {
    pub fn new() -> Self {
        Self {
            state: UxState::Operative,
            menu_secs_left: 0,
            last_mode: Mode::AutomaticCycle,
            last_speed: Speed::Medium,
        }
    }

    pub fn state(&self) -> UxState {
        self.state
    }

    /// Mode and speed a power-on restores.
    pub fn remembered(&self) -> (Mode, Speed) {
        (self.last_mode, self.last_speed)
    }

    /// One control second: follow settings changed elsewhere and expire
    /// an idle menu.
    pub fn tick(&mut self, dev: &DeviceState) {
        self.remember(dev);
        if let UxState::Setting(sensor) = self.state {
            self.menu_secs_left = self.menu_secs_left.saturating_sub(1);
            if self.menu_secs_left == 0 {
                info!("UX: {} menu timed out", sensor.name());
                self.state = UxState::Operative;
            }
        }
    }

    pub fn handle(&mut self, press: KeyPress, dev: &mut DeviceState) -> UxOutcome {
        let before = thresholds(dev);
        let mut outcome = match self.state {
            UxState::Operative => self.operative(press, dev),
            UxState::Setting(sensor) => {
                self.setting(sensor, press, dev);
                UxOutcome::default()
            }
        };
        if outcome.command.is_none() && thresholds(dev) != before {
            outcome.command = Some(AppCommand::PublishConf);
        }
        outcome
    }

    fn operative(&mut self, press: KeyPress, dev: &mut DeviceState) -> UxOutcome {
        let mut outcome = UxOutcome::default();
        let s = dev.settings();
        let (mode_set, speed_set) = (s.mode_set, s.speed_set);

        match (press.key, press.long) {
            (Key::Power, false) => {
                if mode_set != Mode::Off {
                    self.set_mode_speed(Some(Mode::Off), Some(Speed::None), dev);
                } else {
                    self.set_mode_speed(None, None, dev);
                }
            }
            (Key::SpeedUp, false) if speed_set < Speed::High => {
                let up = Speed::from_u8(speed_set as u8 + 1).unwrap_or(Speed::High);
                self.set_mode_speed(None, Some(up), dev);
            }
            (Key::SpeedDown, false) if speed_set > Speed::Night => {
                let down = Speed::from_u8(speed_set as u8 - 1).unwrap_or(Speed::Night);
                self.set_mode_speed(None, Some(down), dev);
            }
            (Key::Emission, false) => self.set_mode_speed(Some(Mode::Emission), None, dev),
            (Key::AutomaticCycle, false) => {
                self.set_mode_speed(Some(Mode::AutomaticCycle), None, dev)
            }
            (Key::Immission, false) => self.set_mode_speed(Some(Mode::Immission), None, dev),
            (key @ (Key::Humidity | Key::Voc | Key::Lux), true) => {
                if let Some(sensor) = Sensor::for_key(key) {
                    self.open_menu(sensor);
                }
            }
            (Key::Back, true) => {
                info!("UX: provisioning advertising requested");
                outcome.advertise = true;
            }
            (Key::Filter, true) => outcome.command = Some(AppCommand::ClearFilterWarning),
            _ => debug!("UX: {:?} has no action", press),
        }
        outcome
    }

    fn setting(&mut self, sensor: Sensor, press: KeyPress, dev: &mut DeviceState) {
        match (press.key, press.long) {
            (Key::Back, false) => {
                info!("UX: {} menu closed", sensor.name());
                self.state = UxState::Operative;
            }
            (key, false) if Sensor::for_key(key) == Some(sensor) => {
                let next = next_setting(sensor.setting(dev));
                info!("UX: {} threshold {:?}", sensor.name(), next);
                sensor.store(dev, next);
                self.menu_secs_left = MENU_TIMEOUT_SECS;
            }
            (key, true) => match Sensor::for_key(key) {
                Some(other) if other != sensor => self.open_menu(other),
                _ => debug!("UX: {:?} ignored in {} menu", press, sensor.name()),
            },
            _ => debug!("UX: {:?} ignored in {} menu", press, sensor.name()),
        }
    }

    fn open_menu(&mut self, sensor: Sensor) {
        info!("UX: {} menu open", sensor.name());
        self.state = UxState::Setting(sensor);
        self.menu_secs_left = MENU_TIMEOUT_SECS;
    }

    fn remember(&mut self, dev: &DeviceState) {
        let s = dev.settings();
        if s.mode_set != Mode::Off {
            self.last_mode = s.mode_set;
        }
        if s.speed_set != Speed::None {
            self.last_speed = s.speed_set;
        }
    }

    /// `None` keeps the remembered value.  Off is always stored with
    /// `Speed::None`, and a running mode never with it.
    fn set_mode_speed(&mut self, mode: Option<Mode>, speed: Option<Speed>, dev: &mut DeviceState) {
        self.remember(dev);
        if let Some(m) = mode.filter(|m| *m != Mode::Off) {
            self.last_mode = m;
        }
        if let Some(s) = speed.filter(|s| *s != Speed::None) {
            self.last_speed = s;
        }

        let (mode, speed) = if mode == Some(Mode::Off) || speed == Some(Speed::None) {
            (Mode::Off, Speed::None)
        } else {
            (self.last_mode, self.last_speed)
        };
        info!("UX: mode {} speed {:?}", mode.name(), speed);
        dev.set_mode_set(mode);
        dev.set_speed_set(speed);
    }
}

/// NotConfigured → Low → Medium → High → NotConfigured.
fn next_setting(setting: ThresholdSetting) -> ThresholdSetting {
    match setting {
        ThresholdSetting::NotConfigured => ThresholdSetting::Low,
        ThresholdSetting::Low => ThresholdSetting::Medium,
        ThresholdSetting::Medium => ThresholdSetting::High,
        ThresholdSetting::High => ThresholdSetting::NotConfigured,
    }
}

fn thresholds(dev: &DeviceState) -> [ThresholdSetting; 3] {
    let s = dev.settings();
    [s.relative_humidity_set, s.voc_set, s.lux_set]
}
