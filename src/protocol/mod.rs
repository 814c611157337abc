//! Binary device protocol spoken with the remote server over TCP.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Protocol Stack                          │
//! │                                                            │
//! │  ┌──────────┐   ┌───────────┐   ┌───────────────────────┐  │
//! │  │ io_task  │──▶│  session  │──▶│  engine (dispatcher)  │  │
//! │  │ (TCP)    │   │ (framing) │   │  → DeviceState        │  │
//! │  └──────────┘   └───────────┘   └───────────────────────┘  │
//! │       ▲                                    │               │
//! │       │         ┌──────────┐               │               │
//! │       └─────────│  frame   │◀──────────────┘               │
//! │                 │ (encode) │   ACK / NACK / ANSWER         │
//! │                 └──────────┘                               │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod channels;
pub mod crc;
pub mod engine;
pub mod frame;
pub mod io_task;
pub mod records;
pub mod session;
