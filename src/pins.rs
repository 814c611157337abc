//! GPIO / peripheral pin assignments for the air-exchange main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Reversible fan
// ---------------------------------------------------------------------------

/// LEDC PWM output driving the fan speed input.
pub const FAN_PWM_GPIO: i32 = 7;
/// Digital output: LOW = air in, HIGH = air out.
pub const FAN_DIRECTION_GPIO: i32 = 6;
/// LEDC base frequency for the fan speed input.
pub const FAN_PWM_FREQ_HZ: u32 = 1_000;

// ---------------------------------------------------------------------------
// Environmental sensors (SHT4x, SGP40, LTR-303 on one I²C bus)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 4;
pub const I2C_SCL_GPIO: i32 = 5;
pub const I2C_FREQ_HZ: u32 = 400_000;

// ---------------------------------------------------------------------------
// Airflow NTC (ADC1)
// ---------------------------------------------------------------------------

/// NTC in the airflow, read on ADC1 channel 3 through a 66.5 kΩ leg.
pub const NTC_ADC_CHANNEL: u32 = 3;

// ---------------------------------------------------------------------------
// IR remote receiver (demodulated NEC, active low)
// ---------------------------------------------------------------------------

pub const IR_RX_GPIO: i32 = 2;
