//! Control tick timer on ESP-IDF's esp_timer API.
//!
//! One periodic timer pushes [`Event::ControlTick`] into the SPSC queue once
//! per second.  Callbacks run in the esp_timer task, not in an ISR, so
//! `push_event` is safe there.
//!
//! On simulation targets nothing is started; tests call `tick` directly.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicPtr, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::{
    ESP_OK, esp_timer_create, esp_timer_create_args_t, esp_timer_dispatch_t_ESP_TIMER_TASK,
    esp_timer_handle_t, esp_timer_start_periodic, esp_timer_stop,
};
#[cfg(target_os = "espidf")]
use log::{error, info};

#[cfg(target_os = "espidf")]
use crate::events::{Event, push_event};

/// Handle of the running control timer; null until `start_timers` succeeds.
#[cfg(target_os = "espidf")]
static CONTROL_TIMER: AtomicPtr<esp_idf_svc::sys::esp_timer> = AtomicPtr::new(core::ptr::null_mut());

#[cfg(target_os = "espidf")]
unsafe extern "C" fn control_tick_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::ControlTick);
}

/// Start the periodic control tick.  A failure is logged and the firmware
/// keeps running without ticks; the watchdog then restarts it.
#[cfg(target_os = "espidf")]
pub fn start_timers(control_interval_ms: u32) {
    let args = esp_timer_create_args_t {
        callback: Some(control_tick_cb),
        arg: core::ptr::null_mut(),
        dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
        name: c"control".as_ptr(),
        skip_unhandled_events: true,
    };
    let mut handle: esp_timer_handle_t = core::ptr::null_mut();

    // SAFETY: `args` outlives the call; `handle` receives a fresh timer.
    let rc = unsafe { esp_timer_create(&args, &mut handle) };
    if rc != ESP_OK as i32 {
        error!("hw_timer: control timer create failed (rc={})", rc);
        return;
    }
    // SAFETY: `handle` was just created and is not shared yet.
    let rc = unsafe { esp_timer_start_periodic(handle, u64::from(control_interval_ms) * 1_000) };
    if rc != ESP_OK as i32 {
        error!("hw_timer: control timer start failed (rc={})", rc);
        return;
    }

    CONTROL_TIMER.store(handle, Ordering::Release);
    info!("hw_timer: control tick every {} ms", control_interval_ms);
}

#[cfg(not(target_os = "espidf"))]
pub fn start_timers(control_interval_ms: u32) {
    log::info!("hw_timer(sim): control tick of {} ms not armed", control_interval_ms);
}

/// Stop the control tick, e.g. before a reboot.
#[cfg(target_os = "espidf")]
pub fn stop_timers() {
    let handle = CONTROL_TIMER.swap(core::ptr::null_mut(), Ordering::AcqRel);
    if !handle.is_null() {
        // SAFETY: non-null handles come only from a successful create.
        unsafe {
            esp_timer_stop(handle);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn stop_timers() {}
