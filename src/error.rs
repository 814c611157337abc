//! Unified error types for the air-exchange firmware.
//!
//! Every subsystem error converts into the top-level [`Error`] so the boot
//! sequence and the adapters report failures uniformly.  The control core
//! itself never fails: invalid input degrades to "no state change".

use core::fmt;

use crate::app::ports::{ConfigError, ConnectivityError, LinkError, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    /// A sensor could not be sampled.
    Sensor(SensorError),
    /// The fan driver rejected a command.
    Fan(FanError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Non-volatile storage failed.
    Storage(StorageError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Fan(e) => write!(f, "fan: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// I2C transaction with the environmental sensor failed.
    BusFailed,
    /// Sensor CRC on the returned word did not match.
    CrcMismatch,
    /// ADC read of an NTC channel failed.
    AdcReadFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFailed => write!(f, "bus transaction failed"),
            Self::CrcMismatch => write!(f, "CRC mismatch"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Fan errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanError {
    /// PWM duty-cycle write failed.
    PwmWriteFailed,
    /// Direction GPIO write failed.
    GpioWriteFailed,
}

impl fmt::Display for FanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<FanError> for Error {
    fn from(e: FanError) -> Self {
        Self::Fan(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    Wifi(ConnectivityError),
    Link(LinkError),
    BleInitFailed,
    OtaFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wifi(e) => write!(f, "WiFi: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::BleInitFailed => write!(f, "BLE init failed"),
            Self::OtaFailed => write!(f, "OTA update failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Comms(CommsError::Wifi(e))
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Comms(CommsError::Link(e))
    }
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_subsystem() {
        let e: Error = SensorError::CrcMismatch.into();
        assert_eq!(e.to_string(), "sensor: CRC mismatch");
        let e: Error = FanError::PwmWriteFailed.into();
        assert_eq!(e.to_string(), "fan: PWM write failed");
    }

    #[test]
    fn port_errors_convert() {
        let e: Error = StorageError::NotFound.into();
        assert!(matches!(e, Error::Storage(StorageError::NotFound)));
        let e: Error = ConfigError::ValidationFailed("x").into();
        assert!(e.to_string().contains("validation failed: x"));
        let e: Error = LinkError::NotConnected.into();
        assert!(matches!(e, Error::Comms(CommsError::Link(LinkError::NotConnected))));
    }
}
