//! IR remote adapter: implements [`RemotePort`].
//!
//! ```text
//!   RMT RX ──► ir_nec::decode ──► PressTracker ──► IR_CODES ──► Event::RemoteKeyReceived
//!                                                     │
//!              main loop: AppService::handle_remote_keys ─┘ (take_key)
//! ```
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: a receive thread on core 0 reads the RMT
//!   channel in 1 µs ticks and pushes finished key codes to a static
//!   `embassy-sync` channel.
//! - **all other targets**: simulation queue filled by tests.

use log::debug;

use crate::app::ports::RemotePort;
use crate::ux::KeyPress;

#[cfg(target_os = "espidf")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(target_os = "espidf")]
use embassy_sync::channel::Channel;

/// Finished key codes: receive thread → control loop.
#[cfg(target_os = "espidf")]
static IR_CODES: Channel<CriticalSectionRawMutex, u32, 8> = Channel::new();

#[derive(Default)]
pub struct IrRemoteAdapter {
    /// Simulation: codes "received" so far.
    #[cfg(not(target_os = "espidf"))]
    sim_codes: std::collections::VecDeque<u32>,
}

impl IrRemoteAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulation: the receiver classified `code` (key word, optionally
    /// with the long-press flag).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_receive(&mut self, code: u32) {
        self.sim_codes.push_back(code);
    }

    /// Simulation: a decoded press.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_press(&mut self, press: KeyPress) {
        self.sim_receive(press.code());
    }

    #[cfg(target_os = "espidf")]
    fn next_code(&mut self) -> Option<u32> {
        IR_CODES.try_receive().ok()
    }

    #[cfg(not(target_os = "espidf"))]
    fn next_code(&mut self) -> Option<u32> {
        self.sim_codes.pop_front()
    }
}

impl RemotePort for IrRemoteAdapter {
    fn take_key(&mut self) -> Option<KeyPress> {
        while let Some(code) = self.next_code() {
            match KeyPress::from_code(code) {
                Some(press) => return Some(press),
                None => debug!("IR: unknown code 0x{:08X}", code),
            }
        }
        None
    }
}

// ── ESP-IDF receive thread ────────────────────────────────────

/// Start the receive thread on `channel`/`pin`.
#[cfg(target_os = "espidf")]
pub fn spawn<C, P>(channel: C, pin: P) -> std::io::Result<std::thread::JoinHandle<()>>
where
    C: esp_idf_svc::hal::peripheral::Peripheral<P: esp_idf_svc::hal::rmt::RmtChannel>
        + Send
        + 'static,
    P: esp_idf_svc::hal::peripheral::Peripheral<P: esp_idf_svc::hal::gpio::InputPin>
        + Send
        + 'static,
{
    crate::drivers::task_pin::spawn_on_core(
        crate::drivers::task_pin::Core::Pro,
        5,
        4,
        "ir-rx\0",
        move || run_receiver(channel, pin),
    )
}

#[cfg(target_os = "espidf")]
fn run_receiver<C, P>(channel: C, pin: P)
where
    C: esp_idf_svc::hal::peripheral::Peripheral<P: esp_idf_svc::hal::rmt::RmtChannel>,
    P: esp_idf_svc::hal::peripheral::Peripheral<P: esp_idf_svc::hal::gpio::InputPin>,
{
    use esp_idf_svc::hal::rmt::config::ReceiveConfig;
    use esp_idf_svc::hal::rmt::{Pulse, Receive, RxRmtDriver};
    use log::{error, info, warn};

    use crate::drivers::ir_nec::{self, PressTracker};
    use crate::events::{Event, push_event};

    // 80 MHz APB / 80 = 1 µs per tick; 12 ms of silence ends a burst.
    let config = ReceiveConfig::new().clock_divider(80).idle_threshold(12_000);
    let mut rx = match RxRmtDriver::new(channel, pin, &config, 256) {
        Ok(rx) => rx,
        Err(e) => {
            error!("IR: RMT init failed: {}", e);
            return;
        }
    };
    if let Err(e) = rx.start() {
        error!("IR: RMT start failed: {}", e);
        return;
    }
    info!("IR: receiver on GPIO{}", crate::pins::IR_RX_GPIO);

    let now_ms = || {
        // SAFETY: esp_timer_get_time only reads the system timer.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1000) as u32
    };
    let publish = |code: u32| {
        if IR_CODES.try_send(code).is_err() {
            warn!("IR: key queue full, 0x{:08X} dropped", code);
        } else {
            push_event(Event::RemoteKeyReceived);
        }
    };

    let mut tracker = PressTracker::new();
    let mut items = [(Pulse::zero(), Pulse::zero()); 64];
    let mut pairs: heapless::Vec<(u32, u32), 64> = heapless::Vec::new();
    loop {
        match rx.receive(&mut items, 5) {
            Ok(Receive::Read(n)) => {
                pairs.clear();
                for (mark, space) in &items[..n] {
                    // cannot fail: n <= items.len() == capacity
                    let _ = pairs.push((
                        u32::from(mark.ticks.ticks()),
                        u32::from(space.ticks.ticks()),
                    ));
                }
                if let Some(symbol) = ir_nec::decode(&pairs) {
                    if let Some(code) = tracker.on_symbol(symbol, now_ms()) {
                        publish(code);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => warn!("IR: receive failed: {}", e),
        }
        if let Some(code) = tracker.poll(now_ms()) {
            publish(code);
        }
    }
}
