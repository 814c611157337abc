//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`]: association with the configured access
//! point and push-button (WPS) provisioning.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi`, WPS through
//!   the raw `esp_wifi_wps_*` calls.
//! - **all other targets**: simulation backend for host-side tests.
//!
//! Retry pacing lives in the application service (`reconnect_delay_secs`);
//! this adapter only tracks where the station is.

use log::{info, warn};

use crate::app::ports::{ConnectivityError, ConnectivityPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    /// WPS running; `polls` counts control ticks since it started.
    Wps { polls: u32 },
}

/// WPS walk time: the AP button window is two minutes.
const WPS_TIMEOUT_POLLS: u32 = 120;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    /// Simulation: the access point answers association requests.
    #[cfg(not(target_os = "espidf"))]
    sim_ap_reachable: bool,
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(mut wifi: EspWifi<'static>) -> Result<Self, esp_idf_svc::sys::EspError> {
        wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        wifi.start()?;
        info!("WiFi: station started");
        Ok(Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            sim_ap_reachable: true,
        }
    }

    /// Simulation: make the access point (un)reachable.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_ap_reachable(&mut self, reachable: bool) {
        self.sim_ap_reachable = reachable;
        if !reachable && self.state == WifiState::Connected {
            self.state = WifiState::Connecting;
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        let config = ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if self.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Client(config))
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        self.wifi
            .connect()
            .map_err(|_| ConnectivityError::ConnectionFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        if !self.sim_ap_reachable {
            return Err(ConnectivityError::ConnectionFailed);
        }
        info!("WiFi(sim): associating with '{}'", self.ssid);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        info!("WiFi(sim): disconnected");
    }

    #[cfg(target_os = "espidf")]
    fn platform_associated(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_associated(&self) -> bool {
        self.sim_ap_reachable && !self.ssid.is_empty()
    }

    #[cfg(target_os = "espidf")]
    fn platform_start_wps(&mut self) -> Result<(), ConnectivityError> {
        use esp_idf_svc::sys::*;
        let cfg = esp_wps_config_t {
            wps_type: wps_type_WPS_TYPE_PBC,
            ..Default::default()
        };
        // SAFETY: the WiFi driver is started; cfg is copied by the call.
        let ret = unsafe { esp_wifi_wps_enable(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(ConnectivityError::WpsFailed);
        }
        let ret = unsafe { esp_wifi_wps_start(0) };
        if ret != ESP_OK as i32 {
            unsafe { esp_wifi_wps_disable() };
            return Err(ConnectivityError::WpsFailed);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start_wps(&mut self) -> Result<(), ConnectivityError> {
        if !self.sim_ap_reachable {
            return Err(ConnectivityError::WpsFailed);
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop_wps(&mut self) {
        // SAFETY: disabling an idle WPS session is a no-op.
        unsafe { esp_idf_svc::sys::esp_wifi_wps_disable() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop_wps(&mut self) {}

    /// Whether WPS handed over credentials.
    #[cfg(target_os = "espidf")]
    fn platform_wps_done(&self) -> bool {
        self.platform_associated()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_wps_done(&self) -> bool {
        self.sim_ap_reachable
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(ConnectivityError::AlreadyConnected);
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        match self.platform_connect() {
            Ok(()) => {
                self.state = WifiState::Connecting;
                self.poll();
                Ok(())
            }
            Err(e) => {
                warn!("WiFi: connection failed: {}", e);
                self.state = WifiState::Disconnected;
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        if let WifiState::Wps { .. } = self.state {
            self.platform_stop_wps();
        }
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    fn poll(&mut self) {
        match self.state {
            WifiState::Connecting => {
                if self.platform_associated() {
                    info!("WiFi: connected to '{}'", self.ssid);
                    self.state = WifiState::Connected;
                }
            }
            WifiState::Connected => {
                if !self.platform_associated() {
                    warn!("WiFi: connection lost");
                    self.state = WifiState::Disconnected;
                }
            }
            WifiState::Wps { polls } => {
                if self.platform_wps_done() {
                    info!("WiFi: WPS succeeded");
                    self.platform_stop_wps();
                    self.state = WifiState::Connected;
                } else if polls + 1 >= WPS_TIMEOUT_POLLS {
                    warn!("WiFi: WPS timed out");
                    self.platform_stop_wps();
                    self.state = WifiState::Disconnected;
                } else {
                    self.state = WifiState::Wps { polls: polls + 1 };
                }
            }
            WifiState::Disconnected => {}
        }
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        if self.ssid.as_str() == ssid && self.password.as_str() == password {
            return Ok(());
        }
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password.push_str(password).map_err(|_| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    fn start_wps(&mut self) -> Result<(), ConnectivityError> {
        if let WifiState::Wps { .. } = self.state {
            return Ok(());
        }
        if self.state == WifiState::Connected {
            self.platform_disconnect();
        }
        self.platform_start_wps()?;
        info!("WiFi: WPS started");
        self.state = WifiState::Wps { polls: 0 };
        Ok(())
    }

    fn wps_running(&self) -> bool {
        matches!(self.state, WifiState::Wps { .. })
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
