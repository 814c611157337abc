//! BLE text command adapter.
//!
//! A phone writes an ASCII command (`SSID=MyNet`, `WIFIACT=1`, ...) to the
//! command characteristic; the adapter hands the blob to the control loop
//! and notifies the router's reply back on the same characteristic.
//!
//! ```text
//!   GATTS write ──► CMD_BUF ──► Event::BleCommandReceived
//!                                      │
//!            main loop: take_command() ─┴─► AppService::handle_text_command
//!                                                   │
//!                        notify(reply) ◄────────────┘
//! ```
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server via the raw
//!   `esp_ble_*` calls.
//! - **all other targets**: simulation backend for host-side tests.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                          | Perms              |
//! |----------------|-------------------------------|--------------------|
//! | Command        | `7a1e0002-…-c0ffee0a1e00`     | Write+Notify       |

use core::fmt;
use log::{info, warn};

#[cfg(target_os = "espidf")]
use log::error;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x7a1e0001_5d3c_4e21_9b07_c0ffee0a1e00;
pub const CHAR_COMMAND: u128 = 0x7a1e0002_5d3c_4e21_9b07_c0ffee0a1e00;

/// Longest accepted write: keyword, separator and a 256-byte OTA URL.
pub const MAX_COMMAND_LEN: usize = 300;

/// Longest reply the router produces.
const MAX_REPLY_LEN: usize = 20;

pub type CommandBuf = heapless::Vec<u8, MAX_COMMAND_LEN>;

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleError {
    StackInitFailed(i32),
    CommandTooLong,
    Empty,
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackInitFailed(code) => write!(f, "BLE stack initialisation failed ({})", code),
            Self::CommandTooLong => write!(f, "BLE command exceeds {} bytes", MAX_COMMAND_LEN),
            Self::Empty => write!(f, "BLE command is empty"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    Connected,
    Failed,
}

// ── ESP-IDF BLE static state ──────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. These statics bridge the callback context to the adapter.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
/// Connection id + 1; zero when no central is connected.
#[cfg(target_os = "espidf")]
static BLE_CONN: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CMD_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);

// GATTS callbacks run in the Bluedroid task (not ISR), so std Mutex is safe.
#[cfg(target_os = "espidf")]
static BLE_CMD_BUF: std::sync::Mutex<CommandBuf> = std::sync::Mutex::new(heapless::Vec::new());

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    // SAFETY: esp_bt_uuid_t is a plain C struct/union; all-zero is valid.
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    t.uuid.uuid128 = uuid.to_le_bytes();
    t
}

#[cfg(target_os = "espidf")]
unsafe fn start_advertising() {
    use esp_idf_svc::sys::*;
    let mut adv_params = esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        // SAFETY: remaining fields are plain integers / addresses.
        ..unsafe { core::mem::zeroed() }
    };
    // SAFETY: params outlive the call; the stack copies them.
    unsafe { esp_ble_gap_start_advertising(&mut adv_params) };
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    BLE_GATTS_IF.store(gatts_if as u32, AtomicOrdering::Relaxed);

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: uuid128_to_esp(SERVICE_UUID),
                    inst_id: 0,
                },
                is_primary: true,
            };
            // SAFETY: svc_id is copied by the stack.
            unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, 4) };
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            // SAFETY: `create` is the active member for this event.
            let svc_handle = unsafe { (*param).create.service_handle };
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            let mut char_uuid = uuid128_to_esp(CHAR_COMMAND);
            // SAFETY: handle comes from the stack; uuid is copied.
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
                esp_ble_gatts_add_char(
                    svc_handle,
                    &mut char_uuid,
                    ESP_GATT_PERM_WRITE as esp_gatt_perm_t,
                    (ESP_GATT_CHAR_PROP_BIT_WRITE | ESP_GATT_CHAR_PROP_BIT_NOTIFY)
                        as esp_gatt_char_prop_t,
                    core::ptr::null_mut(),
                    core::ptr::null_mut(),
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            // SAFETY: `add_char` is the active member for this event.
            let handle = unsafe { (*param).add_char.attr_handle };
            BLE_CMD_CHAR_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: command char (handle={})", handle);
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            // SAFETY: `connect` is the active member for this event.
            let conn_id = unsafe { (*param).connect.conn_id };
            BLE_CONN.store(conn_id as u32 + 1, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: client connected (conn_id={})", conn_id);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_CONN.store(0, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: client disconnected");
            // SAFETY: stack is up; advertising restarts after a disconnect.
            unsafe { start_advertising() };
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            // SAFETY: `write` is the active member; value/len describe the
            // written bytes for the duration of the callback.
            let (handle, data) = unsafe {
                let p = &(*param).write;
                (p.handle as u32, core::slice::from_raw_parts(p.value, p.len as usize))
            };
            if handle != BLE_CMD_CHAR_HANDLE.load(AtomicOrdering::Relaxed) {
                return;
            }
            if let Ok(mut buf) = BLE_CMD_BUF.lock() {
                buf.clear();
                if buf.extend_from_slice(data).is_err() {
                    log::warn!("BLE GATTS: command too long ({} bytes)", data.len());
                    return;
                }
            }
            crate::events::push_event(crate::events::Event::BleCommandReceived);
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    state: BleState,
    device_name: heapless::String<24>,
    /// Simulation: command written by the test central.
    #[cfg(not(target_os = "espidf"))]
    sim_pending: Option<CommandBuf>,
    /// Simulation: replies notified to the central.
    #[cfg(not(target_os = "espidf"))]
    sim_notified: Vec<heapless::String<MAX_REPLY_LEN>>,
}

impl BleAdapter {
    pub fn new(device_name: heapless::String<24>) -> Self {
        Self {
            state: BleState::Idle,
            device_name,
            #[cfg(not(target_os = "espidf"))]
            sim_pending: None,
            #[cfg(not(target_os = "espidf"))]
            sim_notified: Vec::new(),
        }
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    pub fn start(&mut self) -> Result<(), BleError> {
        info!("BLE: starting advertising as '{}'", self.device_name);
        match self.platform_start() {
            Ok(()) => {
                self.state = BleState::Advertising;
                Ok(())
            }
            Err(e) => {
                self.state = BleState::Failed;
                Err(e)
            }
        }
    }

    /// Make the device discoverable again for provisioning.  A failed or
    /// never started stack is brought up; a connected central is kept.
    pub fn readvertise(&mut self) {
        match self.state {
            BleState::Idle | BleState::Failed => {
                if let Err(e) = self.start() {
                    warn!("BLE: advertising restart failed: {}", e);
                }
            }
            BleState::Advertising => self.platform_readvertise(),
            BleState::Connected => info!("BLE: central connected, advertising not restarted"),
        }
    }

    pub fn on_central_connected(&mut self) {
        if self.state == BleState::Advertising {
            self.state = BleState::Connected;
        }
    }

    pub fn on_central_disconnected(&mut self) {
        if self.state == BleState::Connected {
            self.state = BleState::Advertising;
        }
    }

    /// Next command written by the central, if any.
    pub fn take_command(&mut self) -> Option<CommandBuf> {
        self.platform_take_command()
    }

    /// Send a router reply back to the central.
    pub fn notify(&mut self, reply: &str) {
        if reply.len() > MAX_REPLY_LEN {
            warn!("BLE: reply truncated ({} > {})", reply.len(), MAX_REPLY_LEN);
        }
        let end = reply
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .take_while(|&end| end <= MAX_REPLY_LEN)
            .last()
            .unwrap_or(0);
        self.platform_notify(&reply[..end]);
    }

    /// Simulation: a central writes `raw` to the command characteristic.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write(&mut self, raw: &[u8]) -> Result<(), BleError> {
        if raw.is_empty() {
            return Err(BleError::Empty);
        }
        let mut buf = CommandBuf::new();
        buf.extend_from_slice(raw).map_err(|_| BleError::CommandTooLong)?;
        self.sim_pending = Some(buf);
        Ok(())
    }

    /// Simulation: replies notified so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_notified(&self) -> &[heapless::String<MAX_REPLY_LEN>] {
        &self.sim_notified
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> Result<(), BleError> {
        use esp_idf_svc::sys::*;
        // SAFETY: called once from the main task before any BLE use.
        unsafe {
            // BLE-only: release classic BT memory.
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK as i32 {
                error!("BLE: bt_controller_init failed ({})", ret);
                return Err(BleError::StackInitFailed(ret));
            }
            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK as i32 {
                error!("BLE: bt_controller_enable failed ({})", ret);
                return Err(BleError::StackInitFailed(ret));
            }
            let ret = esp_bluedroid_init();
            if ret != ESP_OK as i32 {
                error!("BLE: bluedroid_init failed ({})", ret);
                return Err(BleError::StackInitFailed(ret));
            }
            let ret = esp_bluedroid_enable();
            if ret != ESP_OK as i32 {
                error!("BLE: bluedroid_enable failed ({})", ret);
                return Err(BleError::StackInitFailed(ret));
            }

            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
            esp_ble_gatts_app_register(0);

            let mut name = [0u8; 25];
            name[..self.device_name.len()].copy_from_slice(self.device_name.as_bytes());
            esp_ble_gap_set_device_name(name.as_ptr() as *const _);

            start_advertising();
        }
        info!("BLE(espidf): Bluedroid stack initialized");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), BleError> {
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            self.device_name, SERVICE_UUID
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_readvertise(&mut self) {
        // SAFETY: the stack is up in the Advertising state.
        unsafe { start_advertising() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_readvertise(&mut self) {
        info!("BLE(sim): advertising restarted");
    }

    #[cfg(target_os = "espidf")]
    fn platform_take_command(&mut self) -> Option<CommandBuf> {
        BLE_CMD_BUF.lock().ok().and_then(|mut buf| {
            if buf.is_empty() {
                return None;
            }
            let data = buf.clone();
            buf.clear();
            Some(data)
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_take_command(&mut self) -> Option<CommandBuf> {
        self.sim_pending.take()
    }

    #[cfg(target_os = "espidf")]
    fn platform_notify(&mut self, payload: &str) {
        use esp_idf_svc::sys::*;
        let handle = BLE_CMD_CHAR_HANDLE.load(AtomicOrdering::Relaxed);
        let conn = BLE_CONN.load(AtomicOrdering::Relaxed);
        if handle == 0 || conn == 0 {
            warn!("BLE: no central for reply '{}'", payload);
            return;
        }
        // SAFETY: payload outlives the call; the stack copies it.
        unsafe {
            esp_ble_gatts_send_indicate(
                BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as esp_gatt_if_t,
                (conn - 1) as u16,
                handle as u16,
                payload.len() as u16,
                payload.as_ptr() as *mut u8,
                false,
            );
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_notify(&mut self, payload: &str) {
        info!("BLE(sim): notify '{}'", payload);
        let mut reply = heapless::String::new();
        let _ = reply.push_str(payload);
        self.sim_notified.push(reply);
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
