//! Inbound commands to the application service.
//!
//! The protocol engine and the text command router mutate settings
//! directly on [`DeviceState`](super::state::DeviceState); anything that
//! needs a port (radio, link, reboot) or service-owned state (clock,
//! filter monitor) comes back as an [`AppCommand`] which the
//! [`AppService`](super::service::AppService) executes.

use crate::stats::DateTime;

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Restart the device.
    Reboot,

    /// Restore factory defaults, then restart.
    FactoryReset,

    /// Download and install the image at the stored OTA URL.
    StartOta,

    /// Start WiFi push-button provisioning.
    StartWps,

    /// The link enable setting changed.
    SetLinkEnabled(bool),

    /// Drop the server connection and stay offline for a while.
    CloseLink { reopen_after_secs: u32 },

    /// Filter replaced: reset the usage counter and the warning bit.
    ClearFilterWarning,

    /// Set the wall clock.
    SetClock { now: DateTime, dst: bool },

    /// Threshold settings changed; tell the server.
    PublishConf,
}
