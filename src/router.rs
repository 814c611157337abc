//! BLE text command router.
//!
//! The phone app writes ASCII blobs of the form `<KEYWORD><SEP><payload>`
//! over the BLE custom-data characteristic.  Routing is a substring search
//! of [`COMMANDS`] against the blob; the first keyword found, in table
//! order, wins.  The payload is whatever follows the keyword and one
//! separator byte.
//!
//! Because matching is by substring and `WIFIACT` precedes `WIFIACTKEY`,
//! a `WIFIACTKEY` blob is always routed to the `WIFIACT` handler, which
//! then rejects it on length.
//!
//! Settings mutate [`DeviceState`] in place; anything needing a port comes
//! back as an [`AppCommand`].

use log::{info, warn};

use crate::app::commands::AppCommand;
use crate::app::state::{
    DeviceState, OTA_URL_MAX_LEN, PASSWORD_MAX_LEN, SERVER_MAX_LEN, SSID_MAX_LEN,
};
use crate::model::{FW_VERSION_MAJOR, FW_VERSION_MINOR, FW_VERSION_PATCH, OFFSET_BOUND, ThresholdSetting};
use crate::protocol::records::{PORT_FIELD_LEN, parse_port};

/// Result of routing one blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteOutcome {
    /// Text to notify back over BLE.
    pub reply: Option<String>,
    pub command: Option<AppCommand>,
}

impl RouteOutcome {
    fn none() -> Self {
        Self::default()
    }

    fn command(cmd: AppCommand) -> Self {
        Self {
            reply: None,
            command: Some(cmd),
        }
    }

    fn reply(text: String) -> Self {
        Self {
            reply: Some(text),
            command: None,
        }
    }
}

type Handler = fn(&[u8], &mut DeviceState) -> RouteOutcome;

/// Keyword table, searched in order.
pub const COMMANDS: &[(&str, Handler)] = &[
    ("OTA", ota),
    ("VERSION", version),
    ("SSID", ssid),
    ("PWD", password),
    ("SERVER", server),
    ("PORT", port),
    ("WIFIACT", wifi_active),
    ("WIFIACTKEY", wifi_active_key),
    ("WPS", wps),
    ("WRNFLTDISABLE", filter_warning_disable),
    ("WRNFLTCLEAR", filter_warning_clear),
    ("REBOOT", reboot),
    ("FACTORY", factory),
    ("TH_RH", threshold_relative_humidity),
    ("TH_LUX", threshold_lux),
    ("TH_VOC", threshold_voc),
    ("OFFSET_RH", offset_relative_humidity),
    ("OFFSET_T", offset_temperature),
];

/// Route one received blob.  Unrecognised text does nothing.
pub fn route(data: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    for (keyword, handler) in COMMANDS {
        if let Some(pos) = find(data, keyword.as_bytes()) {
            let start = (pos + keyword.len() + 1).min(data.len());
            info!("Router: {} ({} payload bytes)", keyword, data.len() - start);
            return handler(&data[start..], dev);
        }
    }
    RouteOutcome::none()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Payload as text, bounded by `max` bytes.
fn text<'a>(payload: &'a [u8], max: usize, what: &str) -> Option<&'a str> {
    if payload.len() > max {
        warn!("Router: {} exceeds {} bytes", what, max);
        return None;
    }
    match core::str::from_utf8(payload) {
        Ok(s) => Some(s),
        Err(_) => {
            warn!("Router: {} is not valid text", what);
            None
        }
    }
}

/// Leading optional sign and decimal digits; anything else reads as 0.
fn leading_int(payload: &[u8]) -> i32 {
    let (negative, digits) = match payload {
        [b'-', rest @ ..] => (true, rest),
        [b'+', rest @ ..] => (false, rest),
        _ => (false, payload),
    };
    let magnitude = digits
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0i32, |acc, d| acc.saturating_mul(10).saturating_add(i32::from(d - b'0')));
    if negative { -magnitude } else { magnitude }
}

// ── Handlers ──────────────────────────────────────────────────

fn ota(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    let Some(url) = text(payload, OTA_URL_MAX_LEN, "OTA url") else {
        return RouteOutcome::none();
    };
    dev.set_ota_url(url);
    RouteOutcome::command(AppCommand::StartOta)
}

fn version(_: &[u8], _: &mut DeviceState) -> RouteOutcome {
    RouteOutcome::reply(format!("{FW_VERSION_MAJOR}{FW_VERSION_MINOR}{FW_VERSION_PATCH}"))
}

fn ssid(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    if let Some(s) = text(payload, SSID_MAX_LEN, "ssid") {
        dev.set_ssid(s);
    }
    RouteOutcome::none()
}

fn password(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    if let Some(s) = text(payload, PASSWORD_MAX_LEN, "password") {
        dev.set_password(s);
    }
    RouteOutcome::none()
}

fn server(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    if let Some(s) = text(payload, SERVER_MAX_LEN, "server") {
        dev.set_server(s);
    }
    RouteOutcome::none()
}

fn port(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    if payload.len() > PORT_FIELD_LEN {
        warn!("Router: port exceeds {} digits", PORT_FIELD_LEN);
        return RouteOutcome::none();
    }
    match parse_port(payload) {
        Some(p) => dev.set_port(p),
        None => warn!("Router: invalid port number"),
    }
    RouteOutcome::none()
}

/// `'0'` disables the link, any other single byte enables it.
fn wifi_active(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    let &[flag] = payload else {
        warn!("Router: WIFIACT expects one byte, got {}", payload.len());
        return RouteOutcome::none();
    };
    let active = flag != b'0';
    if dev.settings().active == active {
        return RouteOutcome::none();
    }
    if dev.set_active(active) {
        RouteOutcome::command(AppCommand::SetLinkEnabled(active))
    } else {
        RouteOutcome::none()
    }
}

/// Unreachable through [`route`] while `WIFIACT` precedes it in the table.
fn wifi_active_key(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    if payload.len() != 16 {
        warn!("Router: WIFIACTKEY expects 16 chars");
        return RouteOutcome::none();
    }
    let serial = dev.identity().serial_text();
    let (first, second) = payload.split_at(8);
    if first == serial.as_bytes() && second == serial.as_bytes() {
        info!("Router: activation key accepted");
        dev.unlock_wifi_act_key();
    } else {
        warn!("Router: activation key mismatch");
    }
    RouteOutcome::none()
}

fn wps(_: &[u8], _: &mut DeviceState) -> RouteOutcome {
    RouteOutcome::command(AppCommand::StartWps)
}

fn filter_warning_disable(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    if payload.is_empty() {
        warn!("Router: WRNFLTDISABLE without a value");
        return RouteOutcome::none();
    }
    let disabled = leading_int(payload) != 0;
    info!("Router: filter warning {}", if disabled { "disabled" } else { "enabled" });
    dev.set_filter_warning_disabled(disabled);
    RouteOutcome::none()
}

fn filter_warning_clear(_: &[u8], _: &mut DeviceState) -> RouteOutcome {
    RouteOutcome::command(AppCommand::ClearFilterWarning)
}

fn reboot(_: &[u8], _: &mut DeviceState) -> RouteOutcome {
    RouteOutcome::command(AppCommand::Reboot)
}

fn factory(_: &[u8], _: &mut DeviceState) -> RouteOutcome {
    RouteOutcome::command(AppCommand::FactoryReset)
}

fn threshold(payload: &[u8], what: &str) -> Option<ThresholdSetting> {
    let setting = payload
        .first()
        .and_then(|b| b.checked_sub(b'0'))
        .and_then(ThresholdSetting::from_u8);
    if setting.is_none() {
        warn!("Router: {} threshold out of range", what);
    }
    setting
}

fn threshold_relative_humidity(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    if let Some(s) = threshold(payload, "RH") {
        dev.set_relative_humidity_set(s);
    }
    RouteOutcome::none()
}

fn threshold_lux(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    if let Some(s) = threshold(payload, "lux") {
        dev.set_lux_set(s);
    }
    RouteOutcome::none()
}

fn threshold_voc(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    if let Some(s) = threshold(payload, "VOC") {
        dev.set_voc_set(s);
    }
    RouteOutcome::none()
}

fn offset(payload: &[u8], what: &str) -> Option<i16> {
    let value = leading_int(payload);
    let bound = i32::from(OFFSET_BOUND);
    if (-bound..=bound).contains(&value) {
        i16::try_from(value).ok()
    } else {
        warn!("Router: {} offset {} outside ±{}", what, value, OFFSET_BOUND);
        None
    }
}

fn offset_relative_humidity(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    if let Some(v) = offset(payload, "RH") {
        dev.set_relative_humidity_offset(v);
    }
    RouteOutcome::none()
}

fn offset_temperature(payload: &[u8], dev: &mut DeviceState) -> RouteOutcome {
    if let Some(v) = offset(payload, "temperature") {
        dev.set_temp_offset(v);
    }
    RouteOutcome::none()
}

// ── Tests ────────────────────────────────────────────────────
