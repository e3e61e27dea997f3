//! Host network address discovery.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::debug;

/// Any routable address; connecting a UDP socket sends nothing.
const PROBE_TARGET: (Ipv4Addr, u16) = (Ipv4Addr::new(8, 8, 8, 8), 80);

/// Best-effort non-loopback IPv4 address of this device.
///
/// Asks the OS which local address it would route outbound traffic from.
/// `None` without a default route.
pub fn device_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .map_err(|e| debug!("UDP bind failed: {}", e))
        .ok()?;
    socket
        .connect(PROBE_TARGET)
        .map_err(|e| debug!("No route for address discovery: {}", e))
        .ok()?;

    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_ip_is_never_loopback() {
        if let Some(ip) = device_ip() {
            assert!(!ip.is_loopback());
            assert!(ip.is_ipv4());
        }
    }
}
