//! The SSDP search seam and local-address detection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;
use url::Url;

use crate::error::Result;
use upnp_ssdp::{SSDP_MULTICAST_ADDR, SSDP_PORT};

/// Discovery transport: enumerate usable local addresses and run one
/// search round, returning the raw response datagrams.
///
/// This trait covers active searching only. Listening on the multicast
/// group for unsolicited NOTIFY traffic is the integrator's concern; those
/// datagrams must be fed into [`ControlPoint::process_ssdp_datagram`],
/// otherwise alive renewals and byebyes are never seen and devices linger
/// until their lease expires.
///
/// [`ControlPoint::process_ssdp_datagram`]: crate::ControlPoint::process_ssdp_datagram
#[async_trait]
pub trait SsdpTransport: Send + Sync {
    /// Local addresses a search task should be scheduled for.
    fn local_addresses(&self) -> Vec<IpAddr>;

    /// Send `payload` to the SSDP multicast group from `from`, then collect
    /// unicast responses for roughly `mx` seconds.
    async fn search(&self, from: IpAddr, payload: &str, mx: u32) -> Result<Vec<String>>;
}

/// Default UDP multicast implementation.
///
/// Searches from the default-route interface only; multi-homed hosts that
/// need a search task per interface should supply their own transport with
/// a fuller `local_addresses`.
pub struct UdpSsdpTransport;

#[async_trait]
impl SsdpTransport for UdpSsdpTransport {
    fn local_addresses(&self) -> Vec<IpAddr> {
        default_local_address().into_iter().collect()
    }

    async fn search(&self, from: IpAddr, payload: &str, mx: u32) -> Result<Vec<String>> {
        let socket = UdpSocket::bind(SocketAddr::new(from, 0)).await?;
        let group: SocketAddr = SocketAddr::new(
            SSDP_MULTICAST_ADDR
                .parse()
                .unwrap_or(IpAddr::V4(Ipv4Addr::new(239, 255, 255, 250))),
            SSDP_PORT,
        );
        socket.send_to(payload.as_bytes(), group).await?;

        let mut responses = Vec::new();
        let mut buf = [0u8; 4096];
        let deadline = tokio::time::Instant::now() + Duration::from_secs(u64::from(mx.max(1)) + 1);
        loop {
            let recv = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await;
            match recv {
                Ok(Ok((len, peer))) => {
                    match std::str::from_utf8(&buf[..len]) {
                        Ok(text) => responses.push(text.to_string()),
                        Err(_) => debug!(%peer, "discarding non-utf8 search response"),
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }
        Ok(responses)
    }
}

/// Address of the interface that routes toward `url`'s host.
///
/// Connecting a UDP socket performs route selection without sending
/// anything; the socket's local address is the interface the kernel picked.
pub fn local_address_towards(url: &Url) -> Option<IpAddr> {
    let host = url.host_str()?;
    let port = url.port_or_known_default().unwrap_or(80);
    let socket = StdUdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect((host, port)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// Address of the interface that routes toward the SSDP multicast group.
pub fn default_local_address() -> Option<IpAddr> {
    let socket = StdUdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect((SSDP_MULTICAST_ADDR, SSDP_PORT)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
