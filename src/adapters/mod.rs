//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to                    |
//! |-------------|--------------------|--------------------------------|
//! | `ble`       | (text commands)    | Bluedroid GATT server          |
//! | `device_id` |                    | eFuse MAC → serial, hostname   |
//! | `hardware`  | SensorPort         | SHT4x, SGP40, LTR-303, NTC     |
//! |             | FanPort            | LEDC PWM, direction GPIO       |
//! | `ir_remote` | RemotePort         | RMT NEC receiver               |
//! | `link`      | LinkPort           | TCP client I/O thread          |
//! |             | ConnectivityPort   | (WiFi + link composite)        |
//! | `log_sink`  | EventSink          | Serial log output              |
//! | `nvs`       | ConfigPort         | NVS / in-memory store          |
//! |             | StoragePort        |                                |
//! | `system`    | SystemPort         | esp_restart, esp-ota           |
//! | `wifi`      | ConnectivityPort   | ESP-IDF WiFi STA, WPS          |

pub mod ble;
pub mod device_id;
pub mod hardware;
pub mod ir_remote;
pub mod link;
pub mod log_sink;
pub mod nvs;
pub mod system;
pub mod wifi;
