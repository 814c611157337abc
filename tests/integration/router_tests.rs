//! BLE text commands through the adapter and the service.

use airexchange::adapters::ble::{BleAdapter, BleState};
use airexchange::adapters::device_id;
use airexchange::app::events::AppEvent;
use airexchange::app::service::AppService;
use airexchange::app::state::DeviceState;
use airexchange::model::{Mode, ThresholdSetting};

use crate::mock_hw::{LogSink, MockHardware, MockNet, MockNvs, MockSystem, identity, make_app};

struct Phone {
    app: AppService,
    nvs: MockNvs,
    ble: BleAdapter,
    net: MockNet,
    sys: MockSystem,
    sink: LogSink,
}

impl Phone {
    fn new() -> Self {
        let (app, nvs) = make_app();
        let mut ble = BleAdapter::new(device_id::hostname(&identity().wifi_addr));
        ble.start().expect("sim BLE starts");
        ble.on_central_connected();
        Self {
            app,
            nvs,
            ble,
            net: MockNet::new(),
            sys: MockSystem::default(),
            sink: LogSink::new(),
        }
    }

    /// Write one blob and run it through the same path as the firmware loop.
    fn write(&mut self, cmd: &str) {
        self.ble.sim_write(cmd.as_bytes()).expect("command accepted");
        while let Some(buf) = self.ble.take_command() {
            if let Some(reply) =
                self.app
                    .handle_text_command(&buf, &mut self.net, &mut self.sys, &mut self.sink)
            {
                self.ble.notify(&reply);
            }
        }
    }

    fn provision(&mut self) {
        self.write("SSID:home");
        self.write("PWD:secret12");
        self.write("SERVER:cloud.local");
        self.write("PORT:5000");
    }
}

// ── Provisioning ──────────────────────────────────────────────

#[test]
fn provisioning_then_activation_connects() {
    let mut phone = Phone::new();
    assert_eq!(phone.ble.state(), BleState::Connected);
    phone.provision();
    phone.write("WIFIACT:1");

    let s = phone.app.device().settings();
    assert_eq!(s.ssid, "home");
    assert_eq!(s.password, "secret12");
    assert_eq!(s.server, "cloud.local");
    assert_eq!(s.port, 5000);
    assert!(s.active);
    assert_eq!(
        phone.net.credentials,
        Some(("home".to_owned(), "secret12".to_owned()))
    );
    assert!(phone.net.wifi);

    let reloaded = DeviceState::load(Box::new(phone.nvs.clone()), identity());
    assert!(reloaded.settings().active);
    assert_eq!(reloaded.settings().server, "cloud.local");
}

#[test]
fn activation_refused_without_credentials() {
    let mut phone = Phone::new();
    phone.write("SSID:home");
    phone.write("WIFIACT:1");
    assert!(!phone.app.device().settings().active);
    assert!(!phone.net.wifi);
}

#[test]
fn deactivation_closes_link() {
    let mut phone = Phone::new();
    phone.provision();
    phone.write("WIFIACT:1");
    phone.write("WIFIACT:0");
    assert!(!phone.app.device().settings().active);
    assert!(!phone.net.wifi);
    assert!(phone.net.closes >= 1);
}

#[test]
fn invalid_port_is_ignored() {
    let mut phone = Phone::new();
    phone.write("PORT:5000");
    phone.write("PORT:70000");
    phone.write("PORT:50a0");
    assert_eq!(phone.app.device().settings().port, 5000);
}

#[test]
fn activation_key_is_shadowed_by_wifiact() {
    let mut phone = Phone::new();
    phone.provision();
    let serial = identity().serial_text();
    phone.write(&format!("WIFIACTKEY:{serial}{serial}"));
    assert!(!phone.app.device().wifi_act_key_unlocked());
    assert!(!phone.app.device().settings().active);
}

// ── Replies and actions ───────────────────────────────────────

#[test]
fn version_is_notified() {
    let mut phone = Phone::new();
    phone.write("VERSION");
    let notified: Vec<&str> = phone.ble.sim_notified().iter().map(|s| s.as_str()).collect();
    assert_eq!(notified, vec!["142"]);
}

#[test]
fn ota_url_reaches_system() {
    let mut phone = Phone::new();
    phone.write("OTA:http://fw.local/airx.bin");
    assert_eq!(phone.sys.ota_urls, vec!["http://fw.local/airx.bin".to_owned()]);
}

#[test]
fn wps_starts_pairing() {
    let mut phone = Phone::new();
    phone.write("WPS");
    assert_eq!(phone.net.wps_starts, 1);
}

#[test]
fn reboot_command_reboots() {
    let mut phone = Phone::new();
    phone.write("REBOOT");
    assert_eq!(phone.sys.reboots, 1);
}

#[test]
fn factory_reset_clears_settings_and_reboots() {
    let mut phone = Phone::new();
    phone.provision();
    phone.write("TH_RH:2");
    phone.write("FACTORY");

    assert_eq!(phone.sys.reboots, 1);
    let reloaded = DeviceState::load(Box::new(phone.nvs.clone()), identity());
    assert_eq!(reloaded.settings().ssid, "");
    assert_eq!(reloaded.settings().mode_set, Mode::Off);
    assert_eq!(
        reloaded.settings().relative_humidity_set,
        ThresholdSetting::NotConfigured
    );
}

#[test]
fn filter_warning_clear_resets_counter() {
    let mut phone = Phone::new();
    phone.write("WRNFLTCLEAR");
    assert!(phone.sink.contains(&AppEvent::FilterCleared));
    assert_eq!(phone.app.filter_usage(), 0);
}

// ── Thresholds and offsets ────────────────────────────────────

#[test]
fn thresholds_are_stored() {
    let mut phone = Phone::new();
    phone.write("TH_RH:1");
    phone.write("TH_LUX:3");
    phone.write("TH_VOC:9");
    let s = phone.app.device().settings();
    assert_eq!(s.relative_humidity_set, ThresholdSetting::Low);
    assert_eq!(s.lux_set, ThresholdSetting::High);
    assert_eq!(s.voc_set, ThresholdSetting::NotConfigured);
}

#[test]
fn offsets_shift_reported_readings() {
    let mut phone = Phone::new();
    phone.write("OFFSET_T:-150");
    phone.write("OFFSET_RH:30");
    phone.write("OFFSET_T:900");

    let mut hw = MockHardware::new();
    phone.app.tick(&mut hw, &mut phone.sink);
    let t = phone.app.build_telemetry();
    assert_eq!(t.temperature, 1950);
    assert_eq!(t.relative_humidity, 480);
}
