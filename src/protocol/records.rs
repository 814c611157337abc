//! Object records carried by QUERY / ANSWER / WRITE / VOLUNTARY frames.
//!
//! Every content starts with `obj_id BE16, index BE16`; the record follows
//! with a fixed, object-specific layout.  Multi-byte fields are big-endian.
//!
//! | Object       | Bytes | Access |
//! |--------------|-------|--------|
//! | INFO         | 26    | read   |
//! | CONF         | 12    | r/w    |
//! | ADV_CONF     | 4     | r/w    |
//! | WIFI_CONF    | 135   | r/w    |
//! | PROFILE      | 168   | read   |
//! | CLOCK        | 8     | r/w    |
//! | OPER         | 2     | r/w    |
//! | STATS        | 27    | read   |
//! | MASTER_STATE | 5     | read   |
//! | STATE        | 9     | read   |

use crate::model::{Mode, OFFSET_BOUND, Speed, ThresholdSetting};
use crate::stats::{DateTime, StatsRecord, hours};

// ───────────────────────────────────────────────────────────────
// Object ids
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ObjectId {
    Info = 0x0010,
    Conf = 0x0020,
    AdvConf = 0x0021,
    WifiConf = 0x0022,
    Profile = 0x0030,
    Clock = 0x0040,
    Oper = 0x0050,
    Stats = 0x0060,
    MasterState = 0x0070,
    State = 0x0080,
}

impl ObjectId {
    pub fn from_u16(raw: u16) -> Option<Self> {
        Some(match raw {
            0x0010 => Self::Info,
            0x0020 => Self::Conf,
            0x0021 => Self::AdvConf,
            0x0022 => Self::WifiConf,
            0x0030 => Self::Profile,
            0x0040 => Self::Clock,
            0x0050 => Self::Oper,
            0x0060 => Self::Stats,
            0x0070 => Self::MasterState,
            0x0080 => Self::State,
            _ => return None,
        })
    }

    /// Record length in bytes.
    pub fn record_len(self) -> usize {
        match self {
            Self::Info => 26,
            Self::Conf => 12,
            Self::AdvConf => 4,
            Self::WifiConf => WIFI_CONF_LEN,
            Self::Profile => PROFILE_LEN,
            Self::Clock => 8,
            Self::Oper => 2,
            Self::Stats => 27,
            Self::MasterState => 5,
            Self::State => 9,
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::Conf | Self::AdvConf | Self::WifiConf | Self::Clock | Self::Oper
        )
    }
}

/// `obj_id` + `index`.
pub const CONTENT_HEADER_LEN: usize = 4;

/// Marks a CONF byte the writer does not want to change.
pub const UNMODIFIED: u8 = 0xFF;

pub const SERIAL_FIELD_LEN: usize = 9;
pub const SSID_FIELD_LEN: usize = 32;
pub const PASSWORD_FIELD_LEN: usize = 64;
pub const SERVER_FIELD_LEN: usize = 32;
pub const PORT_FIELD_LEN: usize = 5;
pub const WIFI_CONF_LEN: usize =
    SSID_FIELD_LEN + PASSWORD_FIELD_LEN + SERVER_FIELD_LEN + PORT_FIELD_LEN + 2;
pub const PROFILE_LEN: usize = 7 * 24;

pub const ROLE_MAX: u8 = 2;
pub const ROTATION_MAX: u8 = 1;
pub const PERIOD_MIN_SECS: u16 = 10;
pub const PERIOD_MAX_SECS: u16 = 3600;

// ───────────────────────────────────────────────────────────────
// Record views (read side)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoRecord {
    pub fw_version: u16,
    /// `{serial:08X}` plus NUL.
    pub serial: [u8; SERIAL_FIELD_LEN],
    pub bt_addr: [u8; 6],
    pub wifi_addr: [u8; 6],
    pub wifi_connected: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfRecord {
    pub role: u8,
    pub relative_humidity: u8,
    pub lux: u8,
    pub voc: u8,
    pub fc: u8,
    pub rotation: u8,
    pub server_address: [u8; 6],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvConfRecord {
    pub temp_offset: i16,
    pub relative_humidity_offset: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiConfRecord {
    pub ssid: String,
    pub password: String,
    pub server: String,
    /// 0 when not configured.
    pub port: u16,
    pub period: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockRecord {
    pub now: DateTime,
    pub dst: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperRecord {
    pub mode: Mode,
    pub speed: Speed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MasterStateRecord {
    /// Mode state in wire form (base plus flag bits).
    pub mode: u8,
    pub speed: u8,
    pub direction: u8,
    pub duration: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateRecord {
    pub mode: u8,
    pub speed: u8,
    pub direction: u8,
    pub temperature: i16,
    pub relative_humidity: u16,
    pub voc: u16,
}

// ───────────────────────────────────────────────────────────────
// Encoding
// ───────────────────────────────────────────────────────────────

/// Start a content buffer with `obj_id` and `index`.
pub fn content_header(obj: ObjectId, index: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(CONTENT_HEADER_LEN + obj.record_len());
    out.extend_from_slice(&(obj as u16).to_be_bytes());
    out.extend_from_slice(&index.to_be_bytes());
    out
}

pub fn encode_info(out: &mut Vec<u8>, r: &InfoRecord) {
    out.extend_from_slice(&r.fw_version.to_be_bytes());
    out.extend_from_slice(&r.serial);
    out.extend_from_slice(&r.bt_addr);
    out.push(0); // bt_conn_num
    out.push(0); // bt_conn_state
    out.extend_from_slice(&r.wifi_addr);
    out.push(u8::from(r.wifi_connected));
}

pub fn encode_conf(out: &mut Vec<u8>, r: &ConfRecord) {
    out.extend_from_slice(&[r.role, r.relative_humidity, r.lux, r.voc, r.fc, r.rotation]);
    out.extend_from_slice(&r.server_address);
}

pub fn encode_adv_conf(out: &mut Vec<u8>, r: &AdvConfRecord) {
    out.extend_from_slice(&r.temp_offset.to_be_bytes());
    out.extend_from_slice(&r.relative_humidity_offset.to_be_bytes());
}

pub fn encode_wifi_conf(out: &mut Vec<u8>, r: &WifiConfRecord) {
    put_padded(out, r.ssid.as_bytes(), SSID_FIELD_LEN);
    put_padded(out, r.password.as_bytes(), PASSWORD_FIELD_LEN);
    put_padded(out, r.server.as_bytes(), SERVER_FIELD_LEN);
    if r.port == 0 {
        put_padded(out, &[], PORT_FIELD_LEN);
    } else {
        put_padded(out, r.port.to_string().as_bytes(), PORT_FIELD_LEN);
    }
    out.extend_from_slice(&r.period.to_be_bytes());
}

/// Weekly profiles are not supported; the record reads as all zero.
pub fn encode_profile(out: &mut Vec<u8>) {
    out.extend_from_slice(&[0; PROFILE_LEN]);
}

pub fn encode_clock(out: &mut Vec<u8>, r: &ClockRecord) {
    let t = r.now;
    out.extend_from_slice(&[
        t.year,
        t.month,
        t.day,
        t.dow,
        t.hour,
        t.minute,
        t.second,
        u8::from(r.dst),
    ]);
}

pub fn encode_oper(out: &mut Vec<u8>, r: &OperRecord) {
    out.extend_from_slice(&[r.mode as u8, r.speed as u8]);
}

pub fn encode_stats(out: &mut Vec<u8>, r: &StatsRecord) {
    out.extend_from_slice(&[r.day.year, r.day.month, r.day.day]);
    for secs in r.day.secs {
        out.extend_from_slice(&hours(secs).to_be_bytes());
    }
    for secs in r.totals {
        out.extend_from_slice(&hours(secs).to_be_bytes());
    }
}

pub fn encode_master_state(out: &mut Vec<u8>, r: &MasterStateRecord) {
    out.extend_from_slice(&[r.mode, r.speed, r.direction]);
    out.extend_from_slice(&r.duration.to_be_bytes());
}

pub fn encode_state(out: &mut Vec<u8>, r: &StateRecord) {
    out.extend_from_slice(&[r.mode, r.speed, r.direction]);
    out.extend_from_slice(&r.temperature.to_be_bytes());
    out.extend_from_slice(&r.relative_humidity.to_be_bytes());
    out.extend_from_slice(&r.voc.to_be_bytes());
}

fn put_padded(out: &mut Vec<u8>, bytes: &[u8], field: usize) {
    let n = bytes.len().min(field);
    out.extend_from_slice(&bytes[..n]);
    out.resize(out.len() + field - n, 0);
}

// ───────────────────────────────────────────────────────────────
// Decoding + validation (write side)
// ───────────────────────────────────────────────────────────────

/// A validated CONF write; `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfWrite {
    pub role: Option<u8>,
    pub relative_humidity: Option<ThresholdSetting>,
    pub lux: Option<ThresholdSetting>,
    pub voc: Option<ThresholdSetting>,
    /// Low nibble: threshold (0xF keeps it).  High nibble: enable (0x7 keeps it).
    pub fc: Option<u8>,
    pub rotation: Option<u8>,
}

impl ConfWrite {
    pub fn changes_thresholds(&self) -> bool {
        self.relative_humidity.is_some() || self.lux.is_some() || self.voc.is_some()
    }
}

/// A validated WIFI_CONF write.  Empty strings leave the stored value
/// unchanged; a blank port field likewise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiConfWrite {
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub period: u16,
}

pub fn decode_conf(data: &[u8]) -> Option<ConfWrite> {
    let &[role, rh, lux, voc, fc, rotation, ..] = data else {
        return None;
    };
    if data.len() != ObjectId::Conf.record_len() {
        return None;
    }

    let threshold = |raw: u8| -> Result<Option<ThresholdSetting>, ()> {
        if raw == UNMODIFIED {
            Ok(None)
        } else {
            ThresholdSetting::from_u8(raw).map(Some).ok_or(())
        }
    };
    let bounded = |raw: u8, max: u8| -> Result<Option<u8>, ()> {
        match raw {
            UNMODIFIED => Ok(None),
            v if v <= max => Ok(Some(v)),
            _ => Err(()),
        }
    };

    let fc = if fc == UNMODIFIED {
        None
    } else {
        let threshold_ok = (fc & 0x0F) <= 3 || (fc & 0x0F) == 0x0F;
        let enable_ok = (fc >> 4) <= 1 || (fc >> 4) == 0x07;
        if !(threshold_ok && enable_ok) {
            return None;
        }
        Some(fc)
    };

    Some(ConfWrite {
        role: bounded(role, ROLE_MAX).ok()?,
        relative_humidity: threshold(rh).ok()?,
        lux: threshold(lux).ok()?,
        voc: threshold(voc).ok()?,
        fc,
        rotation: bounded(rotation, ROTATION_MAX).ok()?,
    })
}

/// Merge a CONF `fc` byte into the stored one, honouring the keep markers.
pub fn merge_fc(stored: u8, written: u8) -> u8 {
    let mut fc = stored;
    if written & 0x0F != 0x0F {
        fc = (fc & 0xF0) | (written & 0x0F);
    }
    if written >> 4 != 0x07 {
        fc = (fc & 0x0F) | (written & 0xF0);
    }
    fc
}

pub fn decode_adv_conf(data: &[u8]) -> Option<AdvConfRecord> {
    let &[t0, t1, h0, h1] = data else {
        return None;
    };
    let temp_offset = i16::from_be_bytes([t0, t1]);
    let relative_humidity_offset = i16::from_be_bytes([h0, h1]);
    let in_bounds = |v: i16| (-OFFSET_BOUND..=OFFSET_BOUND).contains(&v);
    if !in_bounds(temp_offset) || !in_bounds(relative_humidity_offset) {
        return None;
    }
    Some(AdvConfRecord {
        temp_offset,
        relative_humidity_offset,
    })
}

pub fn decode_wifi_conf(data: &[u8]) -> Option<WifiConfWrite> {
    if data.len() != WIFI_CONF_LEN {
        return None;
    }
    let (ssid, rest) = data.split_at(SSID_FIELD_LEN);
    let (password, rest) = rest.split_at(PASSWORD_FIELD_LEN);
    let (server, rest) = rest.split_at(SERVER_FIELD_LEN);
    let (port, period) = rest.split_at(PORT_FIELD_LEN);

    let period = u16::from_be_bytes([period[0], period[1]]);
    if period != 0 && !(PERIOD_MIN_SECS..=PERIOD_MAX_SECS).contains(&period) {
        return None;
    }

    Some(WifiConfWrite {
        ssid: non_empty(nul_terminated(ssid)?),
        password: non_empty(nul_terminated(password)?),
        server: non_empty(nul_terminated(server)?),
        port: parse_port_field(port)?,
        period,
    })
}

pub fn decode_clock(data: &[u8]) -> Option<ClockRecord> {
    let &[year, month, day, dow, hour, minute, second, dst] = data else {
        return None;
    };
    let now = DateTime {
        year,
        month,
        day,
        dow,
        hour,
        minute,
        second,
    };
    if !now.is_valid() || dst > 1 {
        return None;
    }
    Some(ClockRecord { now, dst: dst == 1 })
}

/// OPER accepts speeds up to HIGH; BOOST is reserved for extra cycles.
pub fn decode_oper(data: &[u8]) -> Option<OperRecord> {
    let &[mode, speed] = data else {
        return None;
    };
    let mode = Mode::from_u8(mode)?;
    let speed = Speed::from_u8(speed).filter(|s| *s <= Speed::High)?;
    Some(OperRecord { mode, speed })
}

/// String in a fixed field: must hold a NUL terminator and be UTF-8.
fn nul_terminated(field: &[u8]) -> Option<String> {
    let end = field.iter().position(|&b| b == 0)?;
    core::str::from_utf8(&field[..end]).ok().map(str::to_owned)
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// `Some(None)` for a blank field, `Some(Some(port))` for a valid number.
fn parse_port_field(field: &[u8]) -> Option<Option<u16>> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let digits = &field[..end];
    if digits.is_empty() {
        return Some(None);
    }
    parse_port(digits).map(Some)
}

/// Decimal TCP port, 1..=65535, digits only.
pub fn parse_port(digits: &[u8]) -> Option<u16> {
    if digits.is_empty() || digits.len() > PORT_FIELD_LEN || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value = digits
        .iter()
        .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));
    u16::try_from(value).ok().filter(|p| *p != 0)
}
