//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (sensors, fan, storage, radio, TCP link) implement these
//! traits.  The [`AppService`](super::service::AppService) consumes them via
//! generics at the call site, so the control core never touches hardware.
//!
//! ## Notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **StoragePort** writes are durable once `write` returns `Ok`.
//! - All port errors are typed; callers handle every variant explicitly.

use core::fmt;

use crate::config::SystemConfig;
use crate::error::CommsError;
use crate::fsm::context::SensorSnapshot;
use crate::model::{Direction, Speed};
use crate::ux::KeyPress;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this once per control tick.
///
/// A sensor that could not be sampled reports its sentinel value
/// (`TEMPERATURE_INVALID`, `RELATIVE_HUMIDITY_INVALID`, ...).
pub trait SensorPort {
    fn read_all(&mut self) -> SensorSnapshot;
}

// ───────────────────────────────────────────────────────────────
// Fan port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the reversible fan.
pub trait FanPort {
    /// Drive the fan.  `Direction::None` or `Speed::None` stops it.
    fn set_fan(&mut self, direction: Direction, speed: Speed);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Remote port (driven adapter: IR receiver → domain)
// ───────────────────────────────────────────────────────────────

/// Key presses from the IR remote, oldest first.
pub trait RemotePort {
    fn take_key(&mut self) -> Option<KeyPress>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the tuning tables in [`SystemConfig`].
///
/// Implementations MUST validate config values before persisting and
/// reject invalid ones with [`ConfigError::ValidationFailed`] rather than
/// clamping them.
pub trait ConfigPort {
    /// Load configuration.  Returns [`SystemConfig::default()`] if no
    /// stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for the device settings.
///
/// Keys are namespaced to prevent collisions between subsystems.  Write
/// operations MUST be atomic; the ESP-IDF NVS API guarantees this natively.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (WiFi station)
// ───────────────────────────────────────────────────────────────

pub trait ConnectivityPort {
    fn connect(&mut self) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn poll(&mut self);
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
    /// Start push-button provisioning.
    fn start_wps(&mut self) -> Result<(), ConnectivityError>;
    fn wps_running(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Link port (TCP client to the supervision server)
// ───────────────────────────────────────────────────────────────

/// Byte link to the remote server.
///
/// `open` only requests the connection; the adapter reports the link
/// actually coming up or dropping through the event queue, and the main
/// loop forwards that to [`AppService::on_link_up`](super::service::AppService::on_link_up).
pub trait LinkPort {
    fn open(&mut self, server: &str, port: u16) -> Result<(), LinkError>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
    /// Queue one encoded frame for transmission.
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// System port (reboot, firmware update)
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Restart the device.  Real implementations do not return.
    fn reboot(&mut self);

    /// Download and install the image at `url`.
    fn start_ota(&mut self, url: &str) -> Result<(), CommsError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Stored bytes could not be encoded or decoded.
    Codec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
    WpsFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No connection is established.
    NotConnected,
    /// Server address could not be resolved.
    AddressInvalid,
    /// The outbound queue is full.
    QueueFull,
    /// Frame does not fit the transmit buffer.
    FrameTooLarge,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Codec => write!(f, "value encoding error"),
        }
    }
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
            Self::WpsFailed => write!(f, "WPS could not be started"),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "link not connected"),
            Self::AddressInvalid => write!(f, "server address invalid"),
            Self::QueueFull => write!(f, "transmit queue full"),
            Self::FrameTooLarge => write!(f, "frame too large"),
        }
    }
}
