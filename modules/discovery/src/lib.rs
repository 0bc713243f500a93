//! Concurrent sweep of an address range with device fingerprinting.
//!
//! Two sweep modes share the same shape: spawn one task per address under a
//! bounded semaphore pool, append confirmed devices to a mutex-guarded list,
//! and await completion up to a soft wall-clock deadline. On deadline expiry
//! still-running probes are cancelled and whatever was collected is returned;
//! partial results are valid results.

use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Instant};

use netmon_core::NetmonError;

/// Worker pool for the plain reachability sweep.
pub const SWEEP_WORKERS: usize = 50;
/// Worker pool for the fingerprinting sweep, which issues far more socket
/// attempts per address.
pub const FINGERPRINT_WORKERS: usize = 100;
/// Soft deadline for the plain sweep.
pub const SWEEP_DEADLINE: Duration = Duration::from_secs(30);
/// Soft deadline for the fingerprinting sweep.
pub const FINGERPRINT_DEADLINE: Duration = Duration::from_secs(90);

/// Everything learned about one discovered address during a single scan.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: String,
    pub state: &'static str,
    pub mac_address: Option<String>,
    pub open_ports: Vec<u16>,
    pub manufacturer: String,
    pub device_type: String,
    pub os_guess: String,
    pub response_time_ms: u64,
    pub wifi_band_guess: String,
    pub connection_type_guess: String,
}

/// Expand `prefix.start ..= prefix.end` into dotted-quad addresses.
/// The prefix must be three dotted octets; the bounds must satisfy
/// `start <= end`. Violations fail fast.
pub fn expand_range(prefix: &str, start: u8, end: u8) -> Result<Vec<String>, NetmonError> {
    let octets: Vec<&str> = prefix.split('.').collect();
    if octets.len() != 3 || octets.iter().any(|o| o.parse::<u8>().is_err()) {
        return Err(NetmonError::InvalidPrefix(prefix.to_string()));
    }
    if start > end {
        return Err(NetmonError::InvalidRange { start, end });
    }
    Ok((start..=end).map(|i| format!("{prefix}.{i}")).collect())
}

/// Expand a CIDR into host addresses.
pub fn expand_cidr(cidr: &str) -> anyhow::Result<Vec<String>> {
    let net: ipnet::IpNet = cidr.parse()?;
    Ok(net.hosts().map(|ip| ip.to_string()).collect())
}

/// Derive the local /24 prefix from the default-route interface, falling back
/// to the most common home-network prefix. No packet is sent.
pub fn local_network_prefix() -> String {
    if let Ok(sock) = std::net::UdpSocket::bind("0.0.0.0:0") {
        if sock.connect("8.8.8.8:80").is_ok() {
            if let Ok(addr) = sock.local_addr() {
                if let IpAddr::V4(v4) = addr.ip() {
                    let o = v4.octets();
                    return format!("{}.{}.{}", o[0], o[1], o[2]);
                }
            }
        }
    }
    "192.168.1".to_string()
}

/// Reverse-resolve an address to a hostname. Failure yields the unresolved
/// sentinel, never an error. The lookup is synchronous, so it runs on the
/// blocking pool.
async fn resolve_name(address: &str) -> String {
    let Ok(ip) = address.parse::<IpAddr>() else {
        return classify::UNRESOLVED_NAME.to_string();
    };
    let resolved = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip).ok()).await;
    match resolved {
        Ok(Some(name)) if name != ip.to_string() => name,
        _ => classify::UNRESOLVED_NAME.to_string(),
    }
}

/// Best-effort MAC resolution from the system ARP table. Visibility depends
/// on the platform and on the target sharing a segment with this host.
async fn lookup_mac(address: &str) -> Option<String> {
    let output = tokio::process::Command::new("arp")
        .arg("-n")
        .arg(address)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    for line in text.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 3 && parts[0] == address && parts[2].contains(':') {
            return Some(parts[2].to_uppercase());
        }
    }
    None
}

/// Full per-address pipeline: reachability (with quick-port fallback),
/// latency, reverse name, MAC, service fingerprint, classification.
/// `None` means the address never answered, the expected majority case.
async fn fingerprint_address(address: String, per_probe: Duration) -> Option<DiscoveredDevice> {
    let started = Instant::now();
    let reachable = probe::probe_host(&address, per_probe).await;
    if !reachable
        && !probe::any_port_open(&address, probe::QUICK_CHECK_PORTS, probe::QUICK_CHECK_TIMEOUT).await
    {
        return None;
    }
    let response_time_ms = started.elapsed().as_millis() as u64;

    let name = resolve_name(&address).await;
    let mac = lookup_mac(&address).await;
    let open_ports =
        probe::scan_ports(&address, probe::FINGERPRINT_PORTS, probe::FINGERPRINT_TIMEOUT).await;

    let mut class = classify::classify_by_ports(&open_ports, true);
    if class == classify::Classification::UNKNOWN {
        if let Some(by_name) = classify::classify_by_name(&name) {
            class = by_name;
        }
    }

    Some(DiscoveredDevice {
        manufacturer: classify::manufacturer_from_mac(mac.as_deref()).to_string(),
        wifi_band_guess: classify::wifi_band_guess(mac.as_deref()).to_string(),
        connection_type_guess: "DHCP-IP".to_string(),
        device_type: class.device_type.to_string(),
        os_guess: class.os_guess.to_string(),
        state: "active",
        address,
        name,
        mac_address: mac,
        open_ports,
        response_time_ms,
    })
}

/// Sweep the range with full fingerprinting. Returns the devices confirmed
/// before the soft deadline; an entirely silent range yields an empty list.
pub async fn discover(
    prefix: &str,
    start: u8,
    end: u8,
    per_probe: Duration,
) -> Result<Vec<DiscoveredDevice>, NetmonError> {
    let addresses = expand_range(prefix, start, end)?;
    let found = Arc::new(Mutex::new(Vec::new()));
    let pool = Arc::new(Semaphore::new(FINGERPRINT_WORKERS));

    let mut handles = Vec::with_capacity(addresses.len());
    for address in addresses {
        let found = found.clone();
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let Ok(_permit) = pool.acquire_owned().await else { return };
            if let Some(device) = fingerprint_address(address, per_probe).await {
                found.lock().unwrap().push(device);
            }
        }));
    }

    let all_done = timeout(FINGERPRINT_DEADLINE, async {
        for h in handles.iter_mut() {
            let _ = h.await;
        }
    })
    .await
    .is_ok();
    if !all_done {
        tracing::warn!("fingerprint sweep hit its deadline; returning partial results");
        for h in &handles {
            h.abort();
        }
    }

    let mut devices = std::mem::take(&mut *found.lock().unwrap());
    devices.sort_by(|a, b| a.address.cmp(&b.address));
    tracing::info!(devices = devices.len(), "fingerprint sweep finished");
    Ok(devices)
}

/// Plain reachability sweep: just the addresses that answered, via the
/// lighter pool, for callers that do not need fingerprinting.
pub async fn discover_addresses_only(
    prefix: &str,
    start: u8,
    end: u8,
    per_probe: Duration,
) -> Result<Vec<String>, NetmonError> {
    let addresses = expand_range(prefix, start, end)?;
    Ok(sweep_reachable(addresses, per_probe).await)
}

/// Plain reachability sweep over an explicit CIDR block.
pub async fn discover_cidr(cidr: &str, per_probe: Duration) -> anyhow::Result<Vec<String>> {
    let addresses = expand_cidr(cidr)?;
    Ok(sweep_reachable(addresses, per_probe).await)
}

async fn sweep_reachable(addresses: Vec<String>, per_probe: Duration) -> Vec<String> {
    let found = Arc::new(Mutex::new(Vec::new()));
    let pool = Arc::new(Semaphore::new(SWEEP_WORKERS));

    let mut handles = Vec::with_capacity(addresses.len());
    for address in addresses {
        let found = found.clone();
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let Ok(_permit) = pool.acquire_owned().await else { return };
            if probe::probe_host(&address, per_probe).await {
                found.lock().unwrap().push(address);
            }
        }));
    }

    let all_done = timeout(SWEEP_DEADLINE, async {
        for h in handles.iter_mut() {
            let _ = h.await;
        }
    })
    .await
    .is_ok();
    if !all_done {
        tracing::warn!("reachability sweep hit its deadline; returning partial results");
        for h in &handles {
            h.abort();
        }
    }

    let mut live = std::mem::take(&mut *found.lock().unwrap());
    live.sort();
    live
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_expansion() {
        let v = expand_range("192.168.1", 10, 12).unwrap();
        assert_eq!(v, vec!["192.168.1.10", "192.168.1.11", "192.168.1.12"]);
    }

    #[test]
    fn inverted_range_fails_fast() {
        assert!(matches!(
            expand_range("192.168.1", 10, 5),
            Err(NetmonError::InvalidRange { start: 10, end: 5 })
        ));
    }

    #[test]
    fn bad_prefix_fails_fast() {
        assert!(matches!(
            expand_range("192.168", 1, 5),
            Err(NetmonError::InvalidPrefix(_))
        ));
        assert!(expand_range("192.168.999", 1, 5).is_err());
    }

    #[test]
    fn cidr_expansion() {
        let v = expand_cidr("192.168.5.0/30").unwrap();
        assert_eq!(v, vec!["192.168.5.1", "192.168.5.2"]);
    }

    #[tokio::test]
    async fn cidr_sweep_of_reserved_block_is_empty() {
        let live = discover_cidr("192.0.2.0/30", Duration::from_millis(50))
            .await
            .unwrap();
        assert!(live.is_empty());
    }

    #[test]
    fn local_prefix_has_three_octets() {
        let prefix = local_network_prefix();
        assert_eq!(prefix.split('.').count(), 3);
    }

    /// A host that rejects the generic reachability probe but accepts on the
    /// raw-print port must still be discovered, and classified as a printer.
    #[tokio::test]
    async fn jetdirect_only_host_discovered_as_printer() {
        let Ok(_listener) = tokio::net::TcpListener::bind("127.0.0.1:9100").await else {
            // Port already taken on this machine; nothing meaningful to assert.
            return;
        };

        let devices = discover("127.0.0", 1, 1, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(devices.len(), 1);
        let dev = &devices[0];
        assert_eq!(dev.address, "127.0.0.1");
        assert!(dev.open_ports.contains(&9100));
        assert_eq!(dev.device_type, "Printer");
        assert_eq!(dev.os_guess, "Network Printer");
        assert_eq!(dev.state, "active");
    }

    #[tokio::test]
    async fn silent_range_yields_empty_list() {
        // TEST-NET-1 is reserved; with a tiny timeout nothing answers.
        let devices = discover_addresses_only("192.0.2", 1, 3, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(devices.is_empty());
    }
}
