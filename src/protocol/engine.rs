//! Protocol dispatcher.
//!
//! Turns one validated [`Frame`] into replies and, where the frame asks
//! for something beyond a settings change, an [`AppCommand`].
//!
//! ```text
//!  QUERY   {obj, idx}          ──▶ ANSWER {obj, idx, record} | NACK QUERY/STATS
//!  WRITE   {obj, idx, record}  ──▶ ACK WRITE_OK              | NACK WRITE
//!  EXECUTE {exec_id, args}     ──▶ ACK EXEC_F_OK + command    | NACK EXEC_F
//!  other                       ──▶ NACK GENERIC
//! ```
//!
//! Validation failures are answered with a [`NackCode`]; they never
//! surface as errors and never change a setting.

use log::{debug, info, warn};

use crate::app::commands::AppCommand;
use crate::app::state::DeviceState;
use crate::fsm::context::{ModeState, SensorSnapshot};
use crate::model::{DEVICE_CODE, Direction, Speed, firmware_version};
use crate::stats::{Clock, StatsBook};

use super::frame::Frame;
use super::records::{
    self, AdvConfRecord, ClockRecord, ConfRecord, InfoRecord, MasterStateRecord, ObjectId,
    OperRecord, SERIAL_FIELD_LEN, StateRecord, WifiConfRecord,
};

// ───────────────────────────────────────────────────────────────
// Codes
// ───────────────────────────────────────────────────────────────

/// Function codes (the FUNCT byte).
pub mod funct {
    pub const ACK: u8 = 0x2B;
    pub const NACK: u8 = 0x2D;
    pub const IDENTIFICATION: u8 = 0x28;
    pub const QUERY: u8 = 0x3F;
    pub const ANSWER: u8 = 0x21;
    pub const VOLUNTARY: u8 = 0x3B;
    pub const WRITE: u8 = 0x2F;
    pub const EXECUTE_FUNCTION: u8 = 0x26;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AckCode {
    WriteOk = 0x31,
    ExecFOk = 0x34,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NackCode {
    Generic = 0x40,
    Write = 0x41,
    Query = 0x42,
    Stats = 0x43,
    ExecF = 0x44,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ExecId {
    Reboot = 0x0001,
    CloseSocket = 0x000A,
    ClearFilterWarning = 0x001A,
    ResetFactoryDefaults = 0x0A01,
}

impl ExecId {
    pub fn from_u16(raw: u16) -> Option<Self> {
        Some(match raw {
            0x0001 => Self::Reboot,
            0x000A => Self::CloseSocket,
            0x001A => Self::ClearFilterWarning,
            0x0A01 => Self::ResetFactoryDefaults,
            _ => return None,
        })
    }
}

/// The link stays down this long beyond the requested CLOSE_SOCK delay.
pub const CLOSE_SOCKET_GRACE_SECS: u32 = 30;

// ───────────────────────────────────────────────────────────────
// Dispatch types
// ───────────────────────────────────────────────────────────────

/// One frame to send: FUNCT plus payload.  The serial is added on encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub funct: u8,
    pub payload: Vec<u8>,
}

impl Reply {
    pub fn ack(code: AckCode, funct: u8, add_data: u16) -> Self {
        Self::status(funct::ACK, code as u8, funct, add_data)
    }

    pub fn nack(code: NackCode, funct: u8, add_data: u16) -> Self {
        Self::status(funct::NACK, code as u8, funct, add_data)
    }

    fn status(kind: u8, code: u8, funct: u8, add_data: u16) -> Self {
        let [hi, lo] = add_data.to_be_bytes();
        Self {
            funct: kind,
            payload: vec![code, funct, hi, lo],
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Outcome {
    pub replies: Vec<Reply>,
    pub command: Option<AppCommand>,
}

impl Outcome {
    fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            command: None,
        }
    }

    fn with_command(reply: Reply, command: AppCommand) -> Self {
        Self {
            replies: vec![reply],
            command: Some(command),
        }
    }
}

/// Live state the read-only objects report, borrowed from the service.
pub struct StatusView<'a> {
    pub mode: ModeState,
    /// Effective speed.
    pub speed: Speed,
    pub direction: Direction,
    pub duration: u16,
    /// Offset-corrected readings.
    pub sensors: SensorSnapshot,
    pub clock: &'a Clock,
    pub stats: &'a StatsBook,
    pub wifi_connected: bool,
}

// ───────────────────────────────────────────────────────────────
// Dispatch
// ───────────────────────────────────────────────────────────────

pub fn dispatch(frame: &Frame<'_>, dev: &mut DeviceState, view: &StatusView<'_>) -> Outcome {
    match frame.funct {
        funct::QUERY => handle_query(frame.payload, dev, view),
        funct::WRITE => handle_write(frame.payload, dev),
        funct::EXECUTE_FUNCTION => handle_execute(frame.payload),
        other => {
            warn!("Protocol: unsupported function 0x{:02X}", other);
            Outcome::reply(Reply::nack(NackCode::Generic, other, 0))
        }
    }
}

/// Sent once each time the server link comes up.
pub fn identification(serial: u32) -> Reply {
    let mut payload = Vec::with_capacity(6);
    payload.extend_from_slice(&serial.to_be_bytes());
    payload.extend_from_slice(&DEVICE_CODE.to_be_bytes());
    Reply {
        funct: funct::IDENTIFICATION,
        payload,
    }
}

/// Unsolicited copy of a record, index 0.
pub fn voluntary(obj: ObjectId, dev: &DeviceState, view: &StatusView<'_>) -> Option<Reply> {
    let payload = read_object(obj, 0, dev, view).ok()?;
    Some(Reply {
        funct: funct::VOLUNTARY,
        payload,
    })
}

fn content_ids(payload: &[u8]) -> Option<(u16, u16, &[u8])> {
    let &[o0, o1, i0, i1, ref record @ ..] = payload else {
        return None;
    };
    Some((u16::from_be_bytes([o0, o1]), u16::from_be_bytes([i0, i1]), record))
}

// ── QUERY ─────────────────────────────────────────────────────

fn handle_query(payload: &[u8], dev: &DeviceState, view: &StatusView<'_>) -> Outcome {
    let Some((obj_id, index, _)) = content_ids(payload) else {
        return Outcome::reply(Reply::nack(NackCode::Generic, funct::QUERY, 0));
    };
    let Some(obj) = ObjectId::from_u16(obj_id) else {
        debug!("Protocol: query for unknown object 0x{:04X}", obj_id);
        return Outcome::reply(Reply::nack(NackCode::Query, funct::QUERY, obj_id));
    };
    match read_object(obj, index, dev, view) {
        Ok(payload) => Outcome::reply(Reply {
            funct: funct::ANSWER,
            payload,
        }),
        Err((code, add_data)) => Outcome::reply(Reply::nack(code, funct::QUERY, add_data)),
    }
}

/// Build `{obj_id, index, record}` for `obj`.
fn read_object(
    obj: ObjectId,
    index: u16,
    dev: &DeviceState,
    view: &StatusView<'_>,
) -> Result<Vec<u8>, (NackCode, u16)> {
    let s = dev.settings();
    let mut out = records::content_header(obj, index);
    match obj {
        ObjectId::Info => {
            let id = dev.identity();
            let mut serial = [0u8; SERIAL_FIELD_LEN];
            let text = id.serial_text();
            let n = text.len().min(SERIAL_FIELD_LEN - 1);
            serial[..n].copy_from_slice(&text.as_bytes()[..n]);
            records::encode_info(
                &mut out,
                &InfoRecord {
                    fw_version: firmware_version(),
                    serial,
                    bt_addr: id.bt_addr,
                    wifi_addr: id.wifi_addr,
                    wifi_connected: view.wifi_connected,
                },
            );
        }
        ObjectId::Conf => records::encode_conf(
            &mut out,
            &ConfRecord {
                role: s.role,
                relative_humidity: s.relative_humidity_set as u8,
                lux: s.lux_set as u8,
                voc: s.voc_set as u8,
                fc: s.fc_set,
                rotation: s.rotation,
                server_address: [0; 6],
            },
        ),
        ObjectId::AdvConf => records::encode_adv_conf(
            &mut out,
            &AdvConfRecord {
                temp_offset: s.temp_offset,
                relative_humidity_offset: s.relative_humidity_offset,
            },
        ),
        ObjectId::WifiConf => records::encode_wifi_conf(
            &mut out,
            // the password never leaves the device
            &WifiConfRecord {
                ssid: s.ssid.clone(),
                password: String::new(),
                server: s.server.clone(),
                port: s.port,
                period: s.period,
            },
        ),
        ObjectId::Profile => records::encode_profile(&mut out),
        ObjectId::Clock => records::encode_clock(
            &mut out,
            &ClockRecord {
                now: view.clock.now(),
                dst: view.clock.dst(),
            },
        ),
        ObjectId::Oper => records::encode_oper(
            &mut out,
            &OperRecord {
                mode: s.mode_set,
                speed: s.speed_set,
            },
        ),
        ObjectId::Stats => {
            let Some(record) = view.stats.get(index) else {
                return Err((NackCode::Stats, view.stats.last_index()));
            };
            records::encode_stats(&mut out, &record);
        }
        ObjectId::MasterState => records::encode_master_state(
            &mut out,
            &MasterStateRecord {
                mode: view.mode.to_wire(),
                speed: view.speed as u8,
                direction: view.direction as u8,
                duration: view.duration,
            },
        ),
        ObjectId::State => records::encode_state(
            &mut out,
            &StateRecord {
                mode: view.mode.to_wire(),
                speed: view.speed as u8,
                direction: view.direction as u8,
                temperature: view.sensors.temperature,
                relative_humidity: view.sensors.relative_humidity,
                voc: view.sensors.voc,
            },
        ),
    }
    Ok(out)
}

// ── WRITE ─────────────────────────────────────────────────────

fn handle_write(payload: &[u8], dev: &mut DeviceState) -> Outcome {
    let Some((obj_id, _index, record)) = content_ids(payload) else {
        return Outcome::reply(Reply::nack(NackCode::Generic, funct::WRITE, 0));
    };
    let nack = || Outcome::reply(Reply::nack(NackCode::Write, funct::WRITE, obj_id));
    let ack = || Reply::ack(AckCode::WriteOk, funct::WRITE, obj_id);

    let Some(obj) = ObjectId::from_u16(obj_id).filter(|o| o.is_writable()) else {
        debug!("Protocol: write to unknown or read-only object 0x{:04X}", obj_id);
        return nack();
    };

    match obj {
        ObjectId::Conf => {
            let Some(w) = records::decode_conf(record) else {
                return nack();
            };
            if let Some(role) = w.role {
                dev.set_role(role);
            }
            if let Some(t) = w.relative_humidity {
                dev.set_relative_humidity_set(t);
            }
            if let Some(t) = w.lux {
                dev.set_lux_set(t);
            }
            if let Some(t) = w.voc {
                dev.set_voc_set(t);
            }
            if let Some(fc) = w.fc {
                let merged = records::merge_fc(dev.settings().fc_set, fc);
                dev.set_fc_set(merged);
            }
            if let Some(rotation) = w.rotation {
                dev.set_rotation(rotation);
            }
            info!("Protocol: CONF written");
            if w.changes_thresholds() {
                return Outcome::with_command(ack(), AppCommand::PublishConf);
            }
        }
        ObjectId::AdvConf => {
            let Some(w) = records::decode_adv_conf(record) else {
                return nack();
            };
            dev.set_temp_offset(w.temp_offset);
            dev.set_relative_humidity_offset(w.relative_humidity_offset);
        }
        ObjectId::WifiConf => {
            let Some(w) = records::decode_wifi_conf(record) else {
                return nack();
            };
            if let Some(ssid) = &w.ssid {
                dev.set_ssid(ssid);
            }
            if let Some(password) = &w.password {
                dev.set_password(password);
            }
            if let Some(server) = &w.server {
                dev.set_server(server);
            }
            if let Some(port) = w.port {
                dev.set_port(port);
            }
            dev.set_period(w.period);
            info!("Protocol: WIFI_CONF written");
        }
        ObjectId::Clock => {
            let Some(w) = records::decode_clock(record) else {
                return nack();
            };
            return Outcome::with_command(ack(), AppCommand::SetClock { now: w.now, dst: w.dst });
        }
        ObjectId::Oper => {
            let Some(w) = records::decode_oper(record) else {
                return nack();
            };
            dev.set_mode_set(w.mode);
            dev.set_speed_set(w.speed);
            info!("Protocol: OPER mode_set={} speed_set={:?}", w.mode.name(), w.speed);
        }
        _ => return nack(),
    }
    Outcome::reply(ack())
}

// ── EXECUTE_FUNCTION ──────────────────────────────────────────

fn handle_execute(payload: &[u8]) -> Outcome {
    let &[e0, e1, ref args @ ..] = payload else {
        return Outcome::reply(Reply::nack(NackCode::ExecF, funct::EXECUTE_FUNCTION, 0));
    };
    let exec_id = u16::from_be_bytes([e0, e1]);
    let nack = || Outcome::reply(Reply::nack(NackCode::ExecF, funct::EXECUTE_FUNCTION, exec_id));

    let command = match ExecId::from_u16(exec_id) {
        Some(ExecId::Reboot) => AppCommand::Reboot,
        Some(ExecId::CloseSocket) => {
            let &[a, b, c, d, ..] = args else {
                return nack();
            };
            let secs = u32::from_be_bytes([a, b, c, d]);
            AppCommand::CloseLink {
                reopen_after_secs: secs.saturating_add(CLOSE_SOCKET_GRACE_SECS),
            }
        }
        Some(ExecId::ClearFilterWarning) => AppCommand::ClearFilterWarning,
        Some(ExecId::ResetFactoryDefaults) => AppCommand::FactoryReset,
        None => {
            warn!("Protocol: unknown exec id 0x{:04X}", exec_id);
            return nack();
        }
    };
    info!("Protocol: execute 0x{:04X}", exec_id);
    Outcome::with_command(
        Reply::ack(AckCode::ExecFOk, funct::EXECUTE_FUNCTION, exec_id),
        command,
    )
}
