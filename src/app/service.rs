//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the ventilation controller, the device settings and
//! every piece of state the protocol answers from (clock, statistics,
//! filter usage).  All I/O flows through port traits injected at call
//! sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          AppService          │
//!     FanPort ◀── │  Controller · DeviceState    │ ◀─▶ LinkPort (frames)
//!                 │  Filter · Clock · Stats      │ ◀── BLE text (router)
//!                 │  RemoteUx                    │ ◀── RemotePort (IR keys)
//!                 └──────────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::filter::FilterMonitor;
use crate::fsm::Controller;
use crate::fsm::context::{ControllerContext, FanCommand, ModeState, SensorSnapshot};
use crate::fsm::states::build_state_table;
use crate::model::{
    Direction, Mode, RELATIVE_HUMIDITY_INVALID, Speed, TEMPERATURE_INVALID,
};
use crate::protocol::engine::{self, Reply, StatusView};
use crate::protocol::frame;
use crate::protocol::records::ObjectId;
use crate::protocol::session::LinkSession;
use crate::router;
use crate::stats::{Clock, StatsBook};
use crate::ux::RemoteUx;

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{
    ConnectivityPort, EventSink, FanPort, LinkPort, RemotePort, SensorPort, SystemPort,
};
use super::state::DeviceState;

/// Relative humidity ceiling after offsets (100.0 %).
const RELATIVE_HUMIDITY_MAX: i32 = 1000;

// ───────────────────────────────────────────────────────────────
// Link bookkeeping
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Offline,
    /// `open` requested, waiting for the I/O task to report.
    Connecting,
    Up,
}

struct LinkState {
    phase: LinkPhase,
    /// Tick count before which no (re)connect is attempted.
    retry_at: u64,
    /// Tick count of the next periodic STATE push.
    voluntary_at: u64,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    controller: Controller,
    ctx: ControllerContext,
    device: DeviceState,
    config: SystemConfig,
    filter: FilterMonitor,
    clock: Clock,
    stats: StatsBook,
    session: LinkSession,
    link: LinkState,
    ux: RemoteUx,
    tick_count: u64,
}

impl AppService {
    /// Construct the service from configuration and loaded settings.
    ///
    /// Does **not** start the controller; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig, device: DeviceState) -> Self {
        let mut ctx = ControllerContext::new(&config);
        ctx.settings = device.control_settings();
        let filter = FilterMonitor::new(config.filter, device.settings().filter_usage);
        let clock = Clock::default();
        let stats = StatsBook::new(clock.now());
        let session = LinkSession::new(&config.link);

        Self {
            controller: Controller::new(build_state_table()),
            ctx,
            device,
            config,
            filter,
            clock,
            stats,
            session,
            link: LinkState {
                phase: LinkPhase::Offline,
                retry_at: 0,
                voluntary_at: 0,
            },
            ux: RemoteUx::new(),
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.controller.start(&mut self.ctx);
        let mode_set = self.device.settings().mode_set;
        sink.emit(&AppEvent::Started(mode_set));
        info!("AppService started (mode set {})", mode_set.name());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control second: read sensors → controller → fan, then
    /// account filter wear and statistics.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`FanPort`]; this avoids a double mutable borrow while keeping the
    /// port boundary explicit.
    pub fn tick(&mut self, hw: &mut (impl SensorPort + FanPort), sink: &mut impl EventSink) -> FanCommand {
        self.tick_count += 1;
        self.ux.tick(&self.device);

        // 1. Sensors, offsets applied
        let settings = self.device.settings();
        self.ctx.sensors = apply_offsets(
            hw.read_all(),
            settings.temp_offset,
            settings.relative_humidity_offset,
        );

        // 2. Controller
        let prev_mode = self.controller.current_mode();
        let prev_flags = self.ctx.mode;
        self.ctx.settings = self.device.control_settings();
        let fan = self.controller.tick(&mut self.ctx);

        if let Some(mode) = self.ctx.pending_mode_set.take() {
            info!("AppService: controller requested mode set {}", mode.name());
            self.device.set_mode_set(mode);
        }

        // 3. Fan
        hw.set_fan(fan.direction, fan.speed);

        // 4. Filter wear and statistics
        let running = running_speed(fan);
        self.account_filter(running, sink);
        self.stats.record(running);
        if self.clock.tick() {
            debug!("AppService: day rollover");
            self.stats.roll_day(self.clock.now());
        }

        // 5. Events
        self.emit_controller_events(prev_mode, prev_flags, sink);

        fan
    }

    fn account_filter(&mut self, running: Speed, sink: &mut impl EventSink) {
        let step = self.filter.accumulate(running);
        if step.persist || step.warning_raised {
            self.device.set_filter_usage(self.filter.usage());
        }
        if step.warning_raised {
            if self.device.settings().filter_warning_disabled {
                info!("AppService: filter threshold reached, warning disabled");
            } else {
                warn!("AppService: filter threshold reached (usage={})", self.filter.usage());
                self.device.set_filter_warning(true);
                sink.emit(&AppEvent::FilterWarning {
                    usage: self.filter.usage(),
                });
            }
        }
    }

    fn emit_controller_events(&self, prev_mode: Mode, prev_flags: ModeState, sink: &mut impl EventSink) {
        let mode = self.controller.current_mode();
        if mode != prev_mode {
            sink.emit(&AppEvent::ModeChanged {
                from: prev_mode,
                to: mode,
            });
            return;
        }
        if prev_flags.calculating_duration && !self.ctx.mode.calculating_duration {
            sink.emit(&AppEvent::CycleDurationComputed(self.ctx.duration));
        }
        if !prev_flags.extra_cycle && self.ctx.mode.extra_cycle {
            sink.emit(&AppEvent::ExtraCycleStarted {
                remaining: self.ctx.budget.available(),
            });
        }
    }

    // ── Server link ───────────────────────────────────────────

    /// Drive the WiFi station and the server connection.  Call once per
    /// control tick.
    pub fn service_link(&mut self, net: &mut (impl ConnectivityPort + LinkPort), sink: &mut impl EventSink) {
        net.poll();

        if !self.device.settings().active {
            if self.link.phase != LinkPhase::Offline {
                info!("AppService: link disabled, closing");
                net.close();
                self.set_offline(sink);
            }
            return;
        }

        if !net.is_connected() {
            if self.tick_count >= self.link.retry_at {
                self.link.retry_at = self.tick_count + self.reconnect_delay();
                self.connect_wifi(net);
            }
            return;
        }

        match self.link.phase {
            LinkPhase::Offline if self.tick_count >= self.link.retry_at => {
                let s = self.device.settings();
                match net.open(&s.server, s.port) {
                    Ok(()) => self.link.phase = LinkPhase::Connecting,
                    Err(e) => {
                        warn!("AppService: link open failed: {}", e);
                        self.link.retry_at = self.tick_count + self.reconnect_delay();
                    }
                }
            }
            LinkPhase::Up => {
                let period = u64::from(self.device.settings().period);
                if period != 0 && self.tick_count >= self.link.voluntary_at {
                    self.link.voluntary_at = self.tick_count + period;
                    let view = status_view(&self.ctx, &self.clock, &self.stats, true);
                    if let Some(reply) = engine::voluntary(ObjectId::State, &self.device, &view) {
                        self.send_reply(net, &reply);
                    }
                }
            }
            _ => {}
        }
    }

    /// The I/O task reported the connection up.
    pub fn on_link_up(&mut self, net: &mut impl LinkPort, sink: &mut impl EventSink) {
        info!("AppService: link up");
        self.link.phase = LinkPhase::Up;
        self.link.voluntary_at = self.tick_count + u64::from(self.device.settings().period);
        self.session.reset();
        self.send_reply(net, &engine::identification(self.device.serial()));
        sink.emit(&AppEvent::LinkUp);
    }

    /// The I/O task reported the connection closed or failed.
    pub fn on_link_down(&mut self, sink: &mut impl EventSink) {
        self.link.retry_at = self
            .link
            .retry_at
            .max(self.tick_count + self.reconnect_delay());
        self.set_offline(sink);
    }

    fn set_offline(&mut self, sink: &mut impl EventSink) {
        let was_up = self.link.phase == LinkPhase::Up;
        self.link.phase = LinkPhase::Offline;
        self.session.reset();
        if was_up {
            sink.emit(&AppEvent::LinkDown);
        }
    }

    fn connect_wifi(&mut self, net: &mut impl ConnectivityPort) {
        let s = self.device.settings();
        if let Err(e) = net.set_credentials(&s.ssid, &s.password) {
            warn!("AppService: WiFi credentials rejected: {}", e);
            return;
        }
        if let Err(e) = net.connect() {
            warn!("AppService: WiFi connect failed: {}", e);
        }
    }

    fn reconnect_delay(&self) -> u64 {
        u64::from(self.config.link.reconnect_delay_secs)
    }

    /// Bytes received from the server.  Complete frames are dispatched and
    /// answered; side-effect commands run after the replies are queued.
    pub fn handle_link_bytes(
        &mut self,
        data: &[u8],
        net: &mut (impl ConnectivityPort + LinkPort),
        sys: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) {
        self.session.push(data);

        let serial = self.device.serial();
        let view = status_view(&self.ctx, &self.clock, &self.stats, net.is_connected());
        let device = &mut self.device;
        let mut outcomes = Vec::new();
        self.session
            .drain(serial, |frame| outcomes.push(engine::dispatch(frame, device, &view)));

        for outcome in outcomes {
            for reply in &outcome.replies {
                self.send_reply(net, reply);
            }
            if let Some(cmd) = outcome.command {
                self.handle_command(cmd, net, sys, sink);
            }
        }
    }

    fn send_reply(&self, net: &mut impl LinkPort, reply: &Reply) {
        let Some(bytes) = frame::encode(self.device.serial(), reply.funct, &reply.payload) else {
            warn!("AppService: reply 0x{:02X} too large to frame", reply.funct);
            return;
        };
        if let Err(e) = net.send(&bytes) {
            warn!("AppService: send 0x{:02X} failed: {}", reply.funct, e);
        }
    }

    // ── BLE text commands ─────────────────────────────────────

    /// Route one BLE custom-data blob.  Returns the text to notify back.
    pub fn handle_text_command(
        &mut self,
        data: &[u8],
        net: &mut (impl ConnectivityPort + LinkPort),
        sys: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) -> Option<String> {
        let outcome = router::route(data, &mut self.device);
        if let Some(cmd) = outcome.command {
            self.handle_command(cmd, net, sys, sink);
        }
        outcome.reply
    }

    // ── IR remote ─────────────────────────────────────────────

    /// Apply every pending remote key.  Returns `true` when the user asked
    /// for BLE provisioning advertising.
    pub fn handle_remote_keys(
        &mut self,
        remote: &mut impl RemotePort,
        net: &mut (impl ConnectivityPort + LinkPort),
        sys: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) -> bool {
        let mut advertise = false;
        while let Some(press) = remote.take_key() {
            debug!("AppService: remote {:?}", press);
            let outcome = self.ux.handle(press, &mut self.device);
            advertise |= outcome.advertise;
            if let Some(cmd) = outcome.command {
                self.handle_command(cmd, net, sys, sink);
            }
        }
        advertise
    }

    // ── Command handling ──────────────────────────────────────

    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        net: &mut (impl ConnectivityPort + LinkPort),
        sys: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::Reboot => {
                info!("AppService: reboot requested");
                self.device.set_filter_usage(self.filter.usage());
                sys.reboot();
            }
            AppCommand::FactoryReset => {
                self.device.factory_reset();
                self.filter.reset();
                sys.reboot();
            }
            AppCommand::StartOta => {
                let url = self.device.ota_url().to_owned();
                if url.is_empty() {
                    warn!("AppService: OTA requested without a URL");
                } else if let Err(e) = sys.start_ota(&url) {
                    warn!("AppService: OTA failed: {}", e);
                }
            }
            AppCommand::StartWps => {
                if net.wps_running() {
                    debug!("AppService: WPS already running");
                } else if let Err(e) = net.start_wps() {
                    warn!("AppService: WPS start failed: {}", e);
                }
            }
            AppCommand::SetLinkEnabled(true) => {
                info!("AppService: link enabled");
                self.link.retry_at = self.tick_count;
                if !net.is_connected() {
                    self.connect_wifi(net);
                }
            }
            AppCommand::SetLinkEnabled(false) => {
                info!("AppService: link disabled");
                net.close();
                net.disconnect();
                self.set_offline(sink);
            }
            AppCommand::CloseLink { reopen_after_secs } => {
                info!("AppService: closing link for {} s", reopen_after_secs);
                net.close();
                self.link.retry_at = self.tick_count + u64::from(reopen_after_secs);
                self.set_offline(sink);
            }
            AppCommand::ClearFilterWarning => {
                info!("AppService: filter counter reset");
                self.filter.reset();
                self.device.set_filter_usage(0);
                self.device.set_filter_warning(false);
                sink.emit(&AppEvent::FilterCleared);
            }
            AppCommand::SetClock { now, dst } => {
                self.clock.set(now, dst);
                self.stats.redate(now);
            }
            AppCommand::PublishConf => {
                let view = status_view(&self.ctx, &self.clock, &self.stats, net.is_connected());
                if let Some(reply) = engine::voluntary(ObjectId::Conf, &self.device, &view) {
                    self.send_reply(net, &reply);
                }
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn build_telemetry(&self) -> TelemetryData {
        let s = &self.ctx.sensors;
        TelemetryData {
            mode: self.controller.current_mode(),
            mode_wire: self.ctx.mode.to_wire(),
            speed: self.ctx.speed.effective(),
            direction: self.ctx.direction,
            duration: self.ctx.duration,
            temperature: s.temperature,
            relative_humidity: s.relative_humidity,
            voc: s.voc,
            lux: s.lux,
            ntc_internal: s.ntc_internal,
            ntc_external: s.ntc_external,
            filter_usage: self.filter.usage(),
            extra_cycles_available: self.ctx.budget.available(),
        }
    }

    /// Current mode state (without flags).
    pub fn mode(&self) -> Mode {
        self.controller.current_mode()
    }

    pub fn context(&self) -> &ControllerContext {
        &self.ctx
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn stats(&self) -> &StatsBook {
        &self.stats
    }

    pub fn filter_usage(&self) -> u64 {
        self.filter.usage()
    }

    pub fn ux(&self) -> &RemoteUx {
        &self.ux
    }

    pub fn link_phase(&self) -> LinkPhase {
        self.link.phase
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Clone of the live configuration.
    pub fn current_config(&self) -> SystemConfig {
        self.config.clone()
    }
}

// ───────────────────────────────────────────────────────────────
// Helpers
// ───────────────────────────────────────────────────────────────

fn status_view<'a>(
    ctx: &ControllerContext,
    clock: &'a Clock,
    stats: &'a StatsBook,
    wifi_connected: bool,
) -> StatusView<'a> {
    StatusView {
        mode: ctx.mode,
        speed: ctx.speed.effective(),
        direction: ctx.direction,
        duration: ctx.duration,
        sensors: ctx.sensors,
        clock,
        stats,
        wifi_connected,
    }
}

/// Speed the filter and statistics account: nothing moves without a
/// direction.
fn running_speed(fan: FanCommand) -> Speed {
    if fan.direction == Direction::None {
        Speed::None
    } else {
        fan.speed
    }
}

/// Apply the user calibration offsets to valid readings.
pub fn apply_offsets(raw: SensorSnapshot, temp_offset: i16, rh_offset: i16) -> SensorSnapshot {
    let mut s = raw;
    if s.temperature != TEMPERATURE_INVALID {
        s.temperature = s
            .temperature
            .saturating_add(temp_offset)
            .min(TEMPERATURE_INVALID - 1);
    }
    if s.relative_humidity != RELATIVE_HUMIDITY_INVALID {
        let rh = (i32::from(s.relative_humidity) + i32::from(rh_offset)).clamp(0, RELATIVE_HUMIDITY_MAX);
        s.relative_humidity = rh as u16;
    }
    s
}
