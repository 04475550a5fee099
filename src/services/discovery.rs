//! Alpaca UDP discovery responder.
//!
//! Clients broadcast `alpacadiscovery1` to port 32227; every server that
//! hears it answers the sender with `{"AlpacaPort": <http port>}`.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Token every discovery request carries.
pub const DISCOVERY_TOKEN: &str = "alpacadiscovery1";

/// Answers discovery broadcasts for one HTTP port.
#[derive(Debug, Clone)]
pub struct DiscoveryResponder {
    reply: Vec<u8>,
}

impl DiscoveryResponder {
    /// Responder advertising `http_port`.
    pub fn new(http_port: u16) -> Self {
        Self {
            reply: format!("{{\"AlpacaPort\": {http_port}}}").into_bytes(),
        }
    }

    /// Reply for a received datagram, if it is a discovery request.
    pub fn handle_datagram(&self, payload: &[u8]) -> Option<&[u8]> {
        let text = String::from_utf8_lossy(payload);
        if text.contains(DISCOVERY_TOKEN) {
            Some(self.reply.as_slice())
        } else {
            None
        }
    }

    /// Bind the discovery socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<UdpSocket> {
        let socket = UdpSocket::bind(addr).await?;
        socket.set_broadcast(true)?;
        Ok(socket)
    }

    /// Serve discovery requests on `socket` forever.
    ///
    /// Socket errors are logged and the loop carries on.
    pub async fn run(self, socket: UdpSocket) {
        if let Ok(addr) = socket.local_addr() {
            info!("Alpaca discovery listening on udp://{addr}");
        }
        let mut buf = [0u8; 1024];
        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("discovery receive failed: {e}");
                    continue;
                }
            };
            debug!("discovery datagram from {peer}: {}", String::from_utf8_lossy(&buf[..len]));

            let Some(reply) = self.handle_datagram(&buf[..len]) else {
                continue;
            };
            match socket.send_to(reply, peer).await {
                Ok(_) => info!("answered discovery from {peer}"),
                Err(e) => warn!("discovery reply to {peer} failed: {e}"),
            }
        }
    }
}
