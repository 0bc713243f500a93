//! Bounded-timeout reachability and port probes over TCP connect.
//!
//! Every probe is a single connect-and-close attempt inside a timeout.
//! Failures, refusals, timeouts and resolution errors all fold into `false`
//! or an absent port; nothing here returns an error. All functions are
//! stateless and safe to call from many concurrent tasks.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Port used for the generic reachability probe when none is given.
pub const REACHABILITY_PORT: u16 = 80;

/// Short canonical list used as a liveness fallback for devices that
/// suppress the generic reachability probe (printers, phones, NAS boxes).
pub const QUICK_CHECK_PORTS: &[u16] = &[80, 443, 22, 445, 9100, 631, 515, 62078, 5000];

/// Per-port timeout for the quick liveness fallback.
pub const QUICK_CHECK_TIMEOUT: Duration = Duration::from_millis(200);

/// Full service-fingerprint catalog: servers, printers, Windows services,
/// mobile sync ports, multimedia (DLNA/AirPlay), databases and VNC.
pub const FINGERPRINT_PORTS: &[u16] = &[
    // servers
    21, 22, 23, 25, 53, 80, 110, 143, 443, 445, 3389, 8080, 8443,
    // printers
    515, 631, 9100, 9101, 9102, 9103, 9104, 9105, 9106, 9107, 9108, 9109,
    // windows / network services
    135, 139, 548, 993, 995,
    // mobile device services
    62078, 62079, 62080, 62081, 62082, 62083, 62084, 62085, 62086, 62087, 62088, 62089, 62090,
    // multimedia (DLNA, AirPlay)
    5000, 5001, 5002, 5003, 5004, 5005,
    // other common services
    1723, 3306, 5432, 5900, 5901, 5902, 5903, 5904, 5905,
];

/// Per-port timeout for the fingerprint catalog scan.
pub const FINGERPRINT_TIMEOUT: Duration = Duration::from_millis(300);

/// Resolve a host to a single IP, best-effort. Literal IPs short-circuit.
pub fn resolve_best_effort(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(mut it) = (host, 0u16).to_socket_addrs() {
        if let Some(sa) = it.next() {
            return Some(sa.ip());
        }
    }
    None
}

/// One connect-and-close attempt against `address:port` within `per_attempt`.
pub async fn probe_port(address: &str, port: u16, per_attempt: Duration) -> bool {
    let Some(ip) = resolve_best_effort(address) else {
        return false;
    };
    let addr = SocketAddr::new(ip, port);
    matches!(timeout(per_attempt, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

/// Generic reachability check: a single bounded connect attempt against the
/// conventional reachability port. `true` only on a confirmed response.
pub async fn probe_host(address: &str, per_attempt: Duration) -> bool {
    probe_port(address, REACHABILITY_PORT, per_attempt).await
}

/// Liveness fallback: returns as soon as any one port in `ports` accepts.
pub async fn any_port_open(address: &str, ports: &[u16], per_attempt: Duration) -> bool {
    let Some(ip) = resolve_best_effort(address) else {
        return false;
    };
    for &port in ports {
        let addr = SocketAddr::new(ip, port);
        if let Ok(Ok(_)) = timeout(per_attempt, TcpStream::connect(addr)).await {
            return true;
        }
    }
    false
}

/// Probe every port in `ports` independently and return the accepting subset
/// (sorted ascending). Closed, refused and timed-out ports are silently
/// excluded.
pub async fn scan_ports(address: &str, ports: &[u16], per_attempt: Duration) -> Vec<u16> {
    let Some(ip) = resolve_best_effort(address) else {
        return Vec::new();
    };
    let mut open = Vec::new();
    for &port in ports {
        let addr = SocketAddr::new(ip, port);
        if let Ok(Ok(_)) = timeout(per_attempt, TcpStream::connect(addr)).await {
            open.push(port);
        }
    }
    open.sort_unstable();
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, u16) {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = l.local_addr().unwrap().port();
        (l, port)
    }

    /// Bind and immediately drop a listener to get a port that is almost
    /// certainly closed.
    async fn closed_port() -> u16 {
        let (l, port) = listener().await;
        drop(l);
        port
    }

    #[tokio::test]
    async fn open_port_probes_true() {
        let (_l, port) = listener().await;
        assert!(probe_port("127.0.0.1", port, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn closed_port_probes_false() {
        let port = closed_port().await;
        assert!(!probe_port("127.0.0.1", port, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn unresolvable_host_probes_false() {
        assert!(!probe_port("definitely-not-a-real-host.invalid", 80, Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn scan_ports_returns_open_subset_sorted() {
        let (_a, pa) = listener().await;
        let (_b, pb) = listener().await;
        let closed = closed_port().await;
        let open = scan_ports("127.0.0.1", &[pb, closed, pa], Duration::from_millis(500)).await;
        let mut expected = vec![pa, pb];
        expected.sort_unstable();
        assert_eq!(open, expected);
    }

    #[tokio::test]
    async fn any_port_open_finds_one() {
        let closed = closed_port().await;
        let (_l, port) = listener().await;
        assert!(any_port_open("127.0.0.1", &[closed, port], Duration::from_millis(500)).await);
        assert!(!any_port_open("127.0.0.1", &[closed], Duration::from_millis(500)).await);
    }
}
