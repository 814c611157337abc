//! AirExchange Firmware: Main Entry Point
//!
//! Hexagonal architecture with event-driven execution.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter     SystemAdapter │
//! │  (Sensor+Fan)      (EventSink)    (Config+NVS)   (reboot, OTA) │
//! │  NetworkAdapter    BleAdapter                                  │
//! │  (WiFi + link)     (text commands)                             │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Controller · Protocol engine · Router · Filter/Stats  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  link-io thread (Core 0) ◄── embassy-sync channels ──► main    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::Delay;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::ledc::config::TimerConfig;
use esp_idf_svc::hal::ledc::{LedcDriver, LedcTimerDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::gpio::PinDriver;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;

use airexchange::adapters::ble::BleAdapter;
use airexchange::adapters::device_id;
use airexchange::adapters::hardware::HardwareAdapter;
use airexchange::adapters::ir_remote::{self, IrRemoteAdapter};
use airexchange::adapters::link::{NetworkAdapter, TcpLinkAdapter};
use airexchange::adapters::log_sink::LogEventSink;
use airexchange::adapters::nvs::NvsAdapter;
use airexchange::adapters::system::{self, SystemAdapter};
use airexchange::adapters::wifi::WifiAdapter;
use airexchange::app::events::AppEvent;
use airexchange::app::ports::{ConfigPort, EventSink};
use airexchange::app::service::AppService;
use airexchange::app::state::DeviceState;
use airexchange::config::{CONTROL_TICK_MS, SystemConfig};
use airexchange::drivers::fan::FanDriver;
use airexchange::drivers::{hw_init, hw_timer, watchdog::Watchdog};
use airexchange::events::{self, Event};
use airexchange::pins;
use airexchange::protocol::channels::LinkStatus;
use airexchange::protocol::io_task;
use airexchange::sensors::SensorHub;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AirExchange v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    system::confirm_running_image();

    // ── 2. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    if let Err(e) = hw_init::init_peripherals() {
        // NTC reads fall back to the invalid sentinel; the fan still runs.
        error!("ADC init failed: {}", e);
    }
    info!(
        "Pins: fan PWM GPIO{} dir GPIO{} | I2C SDA GPIO{} SCL GPIO{} | NTC ADC1 CH{}",
        pins::FAN_PWM_GPIO,
        pins::FAN_DIRECTION_GPIO,
        pins::I2C_SDA_GPIO,
        pins::I2C_SCL_GPIO,
        pins::NTC_ADC_CHANNEL
    );

    // ── 3. Config + settings from NVS ─────────────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            let cfg = SystemConfig::default();
            if let Err(e) = nvs.save(&cfg) {
                warn!("NVS: saving defaults failed: {}", e);
            }
            cfg
        }
    };

    let identity = device_id::identity();
    let dev_hostname = device_id::hostname(&identity.wifi_addr);
    info!("Device serial: {} (hostname: {})", identity.serial_text(), dev_hostname);
    let device = DeviceState::load(Box::new(nvs), identity);

    // ── 4. Hardware adapter ───────────────────────────────────
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio4,
        peripherals.pins.gpio5,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;
    let mut sensors = SensorHub::new(i2c, Delay::new_default());
    if let Err(e) = sensors.init() {
        warn!("Sensor init incomplete: {}", e);
    }

    let fan_timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::new().frequency(Hertz(pins::FAN_PWM_FREQ_HZ)),
    )?;
    let fan_pwm = LedcDriver::new(peripherals.ledc.channel0, fan_timer, peripherals.pins.gpio7)?;
    let fan_dir = PinDriver::output(peripherals.pins.gpio6)?;
    let mut hw = HardwareAdapter::new(
        sensors,
        FanDriver::new(fan_pwm, fan_dir),
        hw_init::ntc_millivolts,
    );

    // ── 5. Connectivity ───────────────────────────────────────
    let wifi = WifiAdapter::new(EspWifi::new(peripherals.modem, sysloop, Some(nvs_partition))?)?;
    let mut net = NetworkAdapter::new(wifi, TcpLinkAdapter::new());
    let _io_thread = io_task::spawn()?;

    let mut ble = BleAdapter::new(dev_hostname);
    if let Err(e) = ble.start() {
        error!("BLE unavailable: {}", e);
    }

    let mut remote = IrRemoteAdapter::new();
    if let Err(e) = ir_remote::spawn(peripherals.rmt.channel4, peripherals.pins.gpio2) {
        error!("IR receiver unavailable: {}", e);
    }

    let mut sys = SystemAdapter::new();
    let mut log_sink = LogEventSink::new();

    // ── 6. App service ────────────────────────────────────────
    let mut app = AppService::new(config.clone(), device);
    app.start(&mut log_sink);

    hw_timer::start_timers(CONTROL_TICK_MS);
    let watchdog = Watchdog::default();

    info!("System ready. Entering event loop.");

    // ── 7. Event loop ─────────────────────────────────────────
    let telemetry_every = u64::from(config.telemetry_interval_secs.max(1));
    let mut ticks: u64 = 0;

    loop {
        events::drain_events(|event| match event {
            Event::ControlTick => {
                app.tick(&mut hw, &mut log_sink);
                app.service_link(&mut net, &mut log_sink);
                ticks += 1;
                if ticks % telemetry_every == 0 {
                    log_sink.emit(&AppEvent::Telemetry(app.build_telemetry()));
                }
            }

            Event::LinkStatusChanged => {
                while let Some(status) = net.link.poll_status() {
                    match status {
                        LinkStatus::Up => app.on_link_up(&mut net, &mut log_sink),
                        LinkStatus::Down => app.on_link_down(&mut log_sink),
                    }
                }
            }

            Event::LinkDataReceived => {
                while let Some(chunk) = net.link.poll_rx() {
                    app.handle_link_bytes(&chunk.data, &mut net, &mut sys, &mut log_sink);
                }
            }

            Event::BleCommandReceived => {
                while let Some(cmd) = ble.take_command() {
                    if let Some(reply) =
                        app.handle_text_command(&cmd, &mut net, &mut sys, &mut log_sink)
                    {
                        ble.notify(&reply);
                    }
                }
            }

            Event::RemoteKeyReceived => {
                if app.handle_remote_keys(&mut remote, &mut net, &mut sys, &mut log_sink) {
                    ble.readvertise();
                }
            }
        });

        watchdog.feed();

        // Yield to the idle task between drains.
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}
