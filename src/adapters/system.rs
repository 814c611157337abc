//! System adapter: reboot and firmware update.
//!
//! Implements [`SystemPort`].  On ESP-IDF the OTA download runs on its
//! own thread (HTTP GET streamed into the inactive partition through
//! `esp-ota`) and reboots into the new image when the write completes;
//! the control loop keeps running meanwhile.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::SystemPort;
use crate::error::CommsError;

/// Longest OTA URL accepted by the text command.
pub const MAX_OTA_URL: usize = 256;

#[derive(Default)]
pub struct SystemAdapter {
    /// Simulation: number of reboot requests.
    #[cfg(not(target_os = "espidf"))]
    sim_reboots: u32,
    /// Simulation: URLs handed to the updater.
    #[cfg(not(target_os = "espidf"))]
    sim_ota_urls: Vec<String>,
}

impl SystemAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_reboots(&self) -> u32 {
        self.sim_reboots
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_ota_urls(&self) -> &[String] {
        &self.sim_ota_urls
    }
}

/// Mark the running image valid so the bootloader cancels rollback.
#[cfg(target_os = "espidf")]
pub fn confirm_running_image() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn confirm_running_image() {
    info!("OTA(sim): rollback check skipped");
}

#[cfg(target_os = "espidf")]
fn download_and_flash(url: &str) -> Result<(), CommsError> {
    use esp_idf_svc::http::Method;
    use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
    use esp_idf_svc::io::Read;

    let mut conn = EspHttpConnection::new(&Configuration {
        crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
        ..Default::default()
    })
    .map_err(|e| {
        warn!("OTA: HTTP client init failed: {}", e);
        CommsError::OtaFailed
    })?;
    conn.initiate_request(Method::Get, url, &[])
        .and_then(|_| conn.initiate_response())
        .map_err(|e| {
            warn!("OTA: request failed: {}", e);
            CommsError::OtaFailed
        })?;
    if conn.status() != 200 {
        warn!("OTA: server answered {}", conn.status());
        return Err(CommsError::OtaFailed);
    }

    let mut update = esp_ota::OtaUpdate::begin().map_err(|e| {
        warn!("OTA: begin failed: {:?}", e);
        CommsError::OtaFailed
    })?;
    let mut buf = [0u8; 1024];
    let mut total = 0usize;
    loop {
        let n = conn.read(&mut buf).map_err(|e| {
            warn!("OTA: read failed after {} bytes: {}", total, e);
            CommsError::OtaFailed
        })?;
        if n == 0 {
            break;
        }
        update.write(&buf[..n]).map_err(|e| {
            warn!("OTA: flash write failed: {:?}", e);
            CommsError::OtaFailed
        })?;
        total += n;
    }
    let mut completed = update.finalize().map_err(|e| {
        warn!("OTA: image rejected: {:?}", e);
        CommsError::OtaFailed
    })?;
    completed.set_as_boot_partition().map_err(|e| {
        warn!("OTA: set boot partition failed: {:?}", e);
        CommsError::OtaFailed
    })?;
    info!("OTA: {} bytes written, restarting", total);
    esp_ota::restart();
}

impl SystemPort for SystemAdapter {
    #[cfg(target_os = "espidf")]
    fn reboot(&mut self) {
        info!("System: restarting");
        crate::drivers::hw_timer::stop_timers();
        // SAFETY: esp_restart never returns.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn reboot(&mut self) {
        info!("System(sim): reboot requested");
        self.sim_reboots += 1;
    }

    #[cfg(target_os = "espidf")]
    fn start_ota(&mut self, url: &str) -> Result<(), CommsError> {
        if url.is_empty() || url.len() > MAX_OTA_URL {
            return Err(CommsError::OtaFailed);
        }
        let url = url.to_owned();
        info!("System: OTA from {}", url);
        std::thread::Builder::new()
            .name("ota".into())
            .stack_size(8 * 1024)
            .spawn(move || {
                if let Err(e) = download_and_flash(&url) {
                    warn!("System: OTA aborted: {}", e);
                }
            })
            .map(|_| ())
            .map_err(|e| {
                warn!("System: OTA thread spawn failed: {}", e);
                CommsError::OtaFailed
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn start_ota(&mut self, url: &str) -> Result<(), CommsError> {
        if url.is_empty() || url.len() > MAX_OTA_URL {
            return Err(CommsError::OtaFailed);
        }
        info!("System(sim): OTA from {}", url);
        self.sim_ota_urls.push(url.to_owned());
        Ok(())
    }
}
