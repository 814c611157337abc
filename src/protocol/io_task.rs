//! Async link I/O task: one outbound TCP connection to the server.
//!
//! Runs in a dedicated thread using `edge-executor` for cooperative
//! multi-task scheduling and `async-io-mini` for reactor-driven timers.
//! Three concurrent futures share the socket:
//!
//! 1. **Control**: waits on `CONTROL_CHANNEL` for connect / close requests
//! 2. **Read**: polls the non-blocking socket every 5 ms via reactor timer
//!    and hands raw bytes to the control loop
//! 3. **Write**: wakes on `TX_CHANNEL.receive().await` and writes the frame
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  I/O Thread                                              │
//!  │  ┌────────────────────────────────────────────────────┐  │
//!  │  │  futures_lite::block_on                            │  │
//!  │  │  ┌──────────────────────────────────────────────┐  │  │
//!  │  │  │  edge_executor::LocalExecutor                │  │  │
//!  │  │  │  ┌─────────┐  ┌──────────┐  ┌─────────────┐  │  │  │
//!  │  │  │  │ Control │  │   Read   │  │    Write    │  │  │  │
//!  │  │  │  │ on recv │  │  5ms ⏱   │  │  on recv    │  │  │  │
//!  │  │  │  └─────────┘  └──────────┘  └─────────────┘  │  │  │
//!  │  │  └──────────────────────────────────────────────┘  │  │
//!  │  └────────────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Framing happens on the control loop; this task only moves bytes.

use core::cell::RefCell;
use core::time::Duration;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::rc::Rc;

use heapless::Vec;
use log::{info, warn};

use super::channels::{
    CONTROL_CHANNEL, LinkControl, LinkStatus, RX_CHANNEL, RX_CHUNK, RxChunk, STATUS_CHANNEL,
    TX_CHANNEL, TxFrame,
};
use crate::app::ports::LinkError;
use crate::events::{Event, push_event};

const READ_POLL: Duration = Duration::from_millis(5);
const WRITE_RETRY: Duration = Duration::from_millis(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

type SharedSocket = Rc<RefCell<Option<TcpStream>>>;

// ── Socket helpers ───────────────────────────────────────────

fn connect(host: &str, port: u16) -> io::Result<TcpStream> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address for host"))?;
    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

fn notify(status: LinkStatus) {
    if STATUS_CHANNEL.try_send(status).is_err() {
        warn!("Link: status channel full, dropping {:?}", status);
    }
    push_event(Event::LinkStatusChanged);
}

/// Drop the socket if there is one and report the link down.
fn drop_socket(sock: &SharedSocket) {
    if let Some(stream) = sock.borrow_mut().take() {
        let _ = stream.shutdown(std::net::Shutdown::Both);
        notify(LinkStatus::Down);
    }
}

// ── Async tasks ──────────────────────────────────────────────

async fn control_loop(sock: SharedSocket) {
    loop {
        match CONTROL_CHANNEL.receive().await {
            LinkControl::Connect { host, port } => {
                drop_socket(&sock);
                info!("Link: connecting to {}:{}", host.as_str(), port);
                match connect(host.as_str(), port) {
                    Ok(stream) => {
                        *sock.borrow_mut() = Some(stream);
                        info!("Link: connected");
                        notify(LinkStatus::Up);
                    }
                    Err(e) => {
                        warn!("Link: connect failed: {}", e);
                        notify(LinkStatus::Down);
                    }
                }
            }
            LinkControl::Close => {
                info!("Link: closing on request");
                drop_socket(&sock);
            }
        }
    }
}

async fn read_loop(sock: SharedSocket) {
    let mut buf = [0u8; RX_CHUNK];
    loop {
        let result = sock.borrow_mut().as_mut().map(|s| s.read(&mut buf));
        match result {
            Some(Ok(0)) => {
                info!("Link: server closed the connection");
                drop_socket(&sock);
            }
            Some(Ok(n)) => {
                let mut data = Vec::new();
                // cannot fail: n <= RX_CHUNK
                let _ = data.extend_from_slice(&buf[..n]);
                RX_CHANNEL.send(RxChunk { data }).await;
                push_event(Event::LinkDataReceived);
                continue;
            }
            Some(Err(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
            Some(Err(e)) => {
                warn!("Link: read error: {}", e);
                drop_socket(&sock);
            }
            None => {}
        }
        async_io_mini::Timer::after(READ_POLL).await;
    }
}

async fn write_frame(sock: &SharedSocket, data: &[u8]) -> io::Result<()> {
    let mut offset = 0;
    while offset < data.len() {
        let result = sock
            .borrow_mut()
            .as_mut()
            .map(|s| s.write(&data[offset..]));
        match result {
            None => return Err(io::Error::from(io::ErrorKind::NotConnected)),
            Some(Ok(0)) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Some(Ok(n)) => offset += n,
            Some(Err(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                async_io_mini::Timer::after(WRITE_RETRY).await;
            }
            Some(Err(e)) => return Err(e),
        }
    }
    Ok(())
}

async fn write_loop(sock: SharedSocket) {
    loop {
        let frame = TX_CHANNEL.receive().await;
        if sock.borrow().is_none() {
            continue;
        }
        if let Err(e) = write_frame(&sock, &frame.data).await {
            warn!("Link: write failed: {}", e);
            drop_socket(&sock);
        }
    }
}

/// Entry point for the I/O thread.
fn run_io_loop() {
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    let sock: SharedSocket = Rc::new(RefCell::new(None));

    executor.spawn(control_loop(sock.clone())).detach();
    executor.spawn(read_loop(sock.clone())).detach();
    executor.spawn(write_loop(sock)).detach();

    info!("Link IO task started (async, reactor-driven)");
    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
}

// ── Thread spawn ─────────────────────────────────────────────

/// Spawn the I/O task in a dedicated thread pinned to Core 0 (PRO_CPU),
/// next to lwIP.
pub fn spawn() -> std::io::Result<std::thread::JoinHandle<()>> {
    crate::drivers::task_pin::spawn_on_core(
        crate::drivers::task_pin::Core::Pro,
        10,
        12,
        "link-io\0",
        run_io_loop,
    )
}

// ── Channel accessors for the control loop ───────────────────

pub fn request_connect(host: &str, port: u16) -> Result<(), LinkError> {
    let host: heapless::String<32> =
        heapless::String::try_from(host).map_err(|_| LinkError::AddressInvalid)?;
    CONTROL_CHANNEL
        .try_send(LinkControl::Connect { host, port })
        .map_err(|_| LinkError::QueueFull)
}

pub fn request_close() {
    if CONTROL_CHANNEL.try_send(LinkControl::Close).is_err() {
        warn!("Link: control channel full, close dropped");
    }
}

/// Queue one encoded frame; the write task wakes immediately.
pub fn send_frame(frame: &[u8]) -> Result<(), LinkError> {
    let mut data = Vec::new();
    data.extend_from_slice(frame)
        .map_err(|_| LinkError::FrameTooLarge)?;
    TX_CHANNEL
        .try_send(TxFrame { data })
        .map_err(|_| LinkError::QueueFull)
}

pub fn try_recv_chunk() -> Option<RxChunk> {
    RX_CHANNEL.try_receive().ok()
}

pub fn try_recv_status() -> Option<LinkStatus> {
    STATUS_CHANNEL.try_receive().ok()
}

// ── Tests ────────────────────────────────────────────────────
