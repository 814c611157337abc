//! Server link adapter.
//!
//! [`TcpLinkAdapter`] implements [`LinkPort`] on top of the link I/O thread
//! (`protocol::io_task`): requests and frames go out through its channels,
//! status changes and raw bytes come back through [`TcpLinkAdapter::poll_status`]
//! and [`TcpLinkAdapter::poll_rx`].
//!
//! [`NetworkAdapter`] pairs the WiFi station with the link so the
//! application service sees one `ConnectivityPort + LinkPort` value.

use log::warn;

use crate::app::ports::{ConnectivityError, ConnectivityPort, LinkError, LinkPort};
use crate::protocol::channels::{LinkStatus, RxChunk};
use crate::protocol::io_task;

// ───────────────────────────────────────────────────────────────
// TCP link
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct TcpLinkAdapter {
    open: bool,
}

impl TcpLinkAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next status change reported by the I/O thread.
    pub fn poll_status(&mut self) -> Option<LinkStatus> {
        let status = io_task::try_recv_status()?;
        self.open = status == LinkStatus::Up;
        Some(status)
    }

    /// Next chunk of raw inbound bytes, in arrival order.
    pub fn poll_rx(&mut self) -> Option<RxChunk> {
        io_task::try_recv_chunk()
    }
}

impl LinkPort for TcpLinkAdapter {
    fn open(&mut self, server: &str, port: u16) -> Result<(), LinkError> {
        if server.is_empty() || port == 0 {
            return Err(LinkError::AddressInvalid);
        }
        io_task::request_connect(server, port)
    }

    fn close(&mut self) {
        if self.open {
            io_task::request_close();
        }
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        if !self.open {
            return Err(LinkError::NotConnected);
        }
        io_task::send_frame(frame)
    }
}

// ───────────────────────────────────────────────────────────────
// WiFi + link
// ───────────────────────────────────────────────────────────────

pub struct NetworkAdapter<W> {
    pub wifi: W,
    pub link: TcpLinkAdapter,
}

impl<W: ConnectivityPort> NetworkAdapter<W> {
    pub fn new(wifi: W, link: TcpLinkAdapter) -> Self {
        Self { wifi, link }
    }
}

impl<W: ConnectivityPort> ConnectivityPort for NetworkAdapter<W> {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        self.wifi.connect()
    }

    fn disconnect(&mut self) {
        self.wifi.disconnect();
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected()
    }

    fn poll(&mut self) {
        let was_connected = self.wifi.is_connected();
        self.wifi.poll();
        if was_connected && !self.wifi.is_connected() && self.link.is_open() {
            warn!("Network: WiFi lost, closing link");
            self.link.close();
        }
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        self.wifi.set_credentials(ssid, password)
    }

    fn start_wps(&mut self) -> Result<(), ConnectivityError> {
        self.wifi.start_wps()
    }

    fn wps_running(&self) -> bool {
        self.wifi.wps_running()
    }
}

impl<W: ConnectivityPort> LinkPort for NetworkAdapter<W> {
    fn open(&mut self, server: &str, port: u16) -> Result<(), LinkError> {
        self.link.open(server, port)
    }

    fn close(&mut self) {
        self.link.close();
    }

    fn is_open(&self) -> bool {
        self.link.is_open()
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        self.link.send(frame)
    }
}
