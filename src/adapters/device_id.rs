//! Device identity derived from the ESP32 factory MAC address.
//!
//! The 32-bit serial is the big-endian value of MAC bytes 2..6.  It is the
//! frame address on the binary protocol and the text returned by the
//! `SERIAL` command, so it must be stable across reboots (eFuse MAC).

use core::fmt::Write;

use crate::app::state::DeviceIdentity;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the station MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: mac is 6 bytes, the size the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Bluetooth MAC address.
#[cfg(target_os = "espidf")]
pub fn read_bt_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: mac is 6 bytes, the size the call writes.
    unsafe {
        esp_idf_svc::sys::esp_read_mac(
            mac.as_mut_ptr(),
            esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_BT,
        );
    }
    mac
}

/// Simulation: the IDF default layout puts BT at base + 2.
#[cfg(not(target_os = "espidf"))]
pub fn read_bt_mac() -> MacAddress {
    let mut mac = read_mac();
    mac[5] = mac[5].wrapping_add(2);
    mac
}

pub fn serial_from_mac(mac: &MacAddress) -> u32 {
    u32::from_be_bytes([mac[2], mac[3], mac[4], mac[5]])
}

/// Identity of this unit, read once at boot.
pub fn identity() -> DeviceIdentity {
    let wifi_addr = read_mac();
    DeviceIdentity {
        serial: serial_from_mac(&wifi_addr),
        bt_addr: read_bt_mac(),
        wifi_addr,
    }
}

/// BLE local name and DHCP hostname: `airx-xxyyzz`.
pub fn hostname(mac: &MacAddress) -> heapless::String<24> {
    let mut name = heapless::String::<24>::new();
    let _ = write!(name, "airx-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}
