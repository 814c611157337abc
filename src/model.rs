//! Domain vocabulary shared by the controller, the protocol codec and the
//! command router.
//!
//! Every enum has a stable `u8` wire representation (`as u8`) and a
//! checked `from_u8` constructor.  Out-of-range values are rejected at the
//! write boundary, so the controller only ever sees valid variants.

use serde::{Deserialize, Serialize};

// ───────────────────────────────────────────────────────────────
// Sensor sentinels and scales
// ───────────────────────────────────────────────────────────────

/// Temperature reading that could not be sampled (centidegrees domain).
pub const TEMPERATURE_INVALID: i16 = i16::MAX;
/// Relative humidity reading that could not be sampled.
pub const RELATIVE_HUMIDITY_INVALID: u16 = u16::MAX;
/// VOC index reading that could not be sampled.
pub const VOC_INVALID: u16 = u16::MAX;
/// Luminosity reading that could not be sampled.
pub const LUX_INVALID: u16 = u16::MAX;

/// Temperatures are carried as hundredths of a degree Celsius.
pub const TEMPERATURE_SCALE: i32 = 100;
/// Relative humidity is carried as tenths of a percent.
pub const RELATIVE_HUMIDITY_SCALE: u16 = 10;

/// Offsets (temperature and humidity) accepted from remote peers.
pub const OFFSET_BOUND: i16 = 500;

// ───────────────────────────────────────────────────────────────
// Firmware identity
// ───────────────────────────────────────────────────────────────

pub const FW_VERSION_MAJOR: u8 = 1;
pub const FW_VERSION_MINOR: u8 = 4;
pub const FW_VERSION_PATCH: u8 = 2;

/// Packed firmware version as reported in the INFO record.
pub const fn firmware_version() -> u16 {
    ((FW_VERSION_MAJOR as u16) << 12) | ((FW_VERSION_MINOR as u16) << 6) | FW_VERSION_PATCH as u16
}

/// Device family code sent in the IDENTIFICATION frame.
pub const DEVICE_CODE: u16 = 10;

// ───────────────────────────────────────────────────────────────
// Mode
// ───────────────────────────────────────────────────────────────

/// Ventilation mode requested by the user or a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    #[default]
    Off = 0,
    Immission = 1,
    Emission = 2,
    FixedCycle = 3,
    AutomaticCycle = 4,
}

impl Mode {
    /// Number of modes.  Sizes the controller's state table.
    pub const COUNT: usize = 5;

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            1 => Some(Self::Immission),
            2 => Some(Self::Emission),
            3 => Some(Self::FixedCycle),
            4 => Some(Self::AutomaticCycle),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Immission => "Immission",
            Self::Emission => "Emission",
            Self::FixedCycle => "FixedCycle",
            Self::AutomaticCycle => "AutomaticCycle",
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Speed
// ───────────────────────────────────────────────────────────────

/// Fan speed level, ordered from stopped to boost.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Speed {
    #[default]
    None = 0,
    Night = 1,
    Low = 2,
    Medium = 3,
    High = 4,
    Boost = 5,
}

impl Speed {
    pub const COUNT: usize = 6;

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Night),
            2 => Some(Self::Low),
            3 => Some(Self::Medium),
            4 => Some(Self::High),
            5 => Some(Self::Boost),
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Direction
// ───────────────────────────────────────────────────────────────

/// Airflow direction.  `Out` pushes indoor air out (emission), `In`
/// pulls outdoor air in (immission).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    #[default]
    None = 0,
    Out = 1,
    In = 2,
}

impl Direction {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Out),
            2 => Some(Self::In),
            _ => None,
        }
    }

    /// Reverse the airflow.  A stopped fan stays stopped.
    pub fn flipped(self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Out => Self::In,
            Self::In => Self::Out,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Environmental threshold setting
// ───────────────────────────────────────────────────────────────

/// Sensitivity selected for one environmental trigger (RH, lux, VOC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ThresholdSetting {
    #[default]
    NotConfigured = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl ThresholdSetting {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::NotConfigured),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }

    pub fn is_configured(self) -> bool {
        self != Self::NotConfigured
    }
}
