//! One-shot ADC initialisation for the airflow NTC.
//!
//! The fan (LEDC + direction pin) and the I²C sensor bus are owned through
//! `esp-idf-hal` drivers built in `main()`; only the NTC channel still uses
//! the raw oneshot ADC API.  Called once before the event loop starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::error::SensorError;

/// Samples averaged per NTC reading.
pub const NTC_SAMPLES: u32 = 32;

/// Full-scale input of ADC1 at 12 dB attenuation, in millivolts.
const ADC_FULL_SCALE_MV: u32 = 3100;
const ADC_MAX: u32 = 4095;

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe {
        adc_oneshot_config_channel(adc1_handle(), crate::pins::NTC_ADC_CHANNEL, &chan_cfg)
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    info!("hw_init: ADC1 configured (CH{}=NTC)", crate::pins::NTC_ADC_CHANNEL);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

#[cfg(target_os = "espidf")]
fn adc1_read(channel: u32) -> Result<u16, SensorError> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract; single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return Err(SensorError::AdcReadFailed);
    }
    Ok(raw.max(0) as u16)
}

/// Averaged NTC divider voltage in millivolts.
#[cfg(target_os = "espidf")]
pub fn ntc_millivolts() -> Result<u32, SensorError> {
    let mut sum: u32 = 0;
    for _ in 0..NTC_SAMPLES {
        sum += u32::from(adc1_read(crate::pins::NTC_ADC_CHANNEL)?);
    }
    Ok(raw_to_millivolts(sum / NTC_SAMPLES))
}

pub fn raw_to_millivolts(raw: u32) -> u32 {
    raw.min(ADC_MAX) * ADC_FULL_SCALE_MV / ADC_MAX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millivolt_scaling() {
        assert_eq!(raw_to_millivolts(0), 0);
        assert_eq!(raw_to_millivolts(4095), ADC_FULL_SCALE_MV);
        assert_eq!(raw_to_millivolts(9999), ADC_FULL_SCALE_MV);
    }
}
