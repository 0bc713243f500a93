//! Heuristic device classification over already-collected evidence.
//!
//! Pure functions, no I/O. Rules are ordered and first match wins. The
//! manufacturer and WiFi-band guesses are acknowledged approximations: the
//! host has no authoritative signal (no OUI registry, no access-point query),
//! so treat their output as hints, never ground truth.

/// Sentinel for an address whose reverse lookup failed.
pub const UNRESOLVED_NAME: &str = "unknown";

/// Device-type label plus operating-system guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub device_type: &'static str,
    pub os_guess: &'static str,
}

impl Classification {
    pub const UNKNOWN: Classification = Classification {
        device_type: "Unknown",
        os_guess: "Unknown",
    };
}

fn contains_port(ports: &[u16], candidates: &[u16]) -> bool {
    candidates.iter().any(|c| ports.contains(c))
}

/// Classify by service fingerprint. Ordered rule list, first match wins;
/// printer and mobile ports are checked before the generic server rules so a
/// printer that also serves HTTP stays a printer.
///
/// `reachable` distinguishes a host with no open ports that still answered a
/// reachability probe (a router/switch/AP) from plain absence of evidence.
pub fn classify_by_ports(open_ports: &[u16], reachable: bool) -> Classification {
    if contains_port(open_ports, &[9100, 9101, 9102, 631, 515]) {
        return Classification { device_type: "Printer", os_guess: "Network Printer" };
    }
    if contains_port(open_ports, &[62078, 62079, 62080, 5000, 5001]) {
        return Classification { device_type: "Mobile Phone", os_guess: "iOS/Android" };
    }
    if contains_port(open_ports, &[80, 443, 8080]) {
        Classification { device_type: "Web Server", os_guess: "Linux/Windows Server" }
    } else if open_ports.contains(&22) {
        Classification { device_type: "Linux/Unix Server", os_guess: "Linux/Unix" }
    } else if open_ports.contains(&3389) {
        Classification { device_type: "Windows Server", os_guess: "Windows Server" }
    } else if contains_port(open_ports, &[445, 139]) {
        Classification { device_type: "Windows Computer", os_guess: "Windows" }
    } else if open_ports.contains(&21) {
        Classification { device_type: "FTP Server", os_guess: "Unknown" }
    } else if contains_port(open_ports, &[5000, 5001, 5002]) {
        Classification { device_type: "Media Device", os_guess: "DLNA/AirPlay" }
    } else if open_ports.is_empty() && reachable {
        Classification { device_type: "Network Device", os_guess: "Router/Switch/AP" }
    } else {
        Classification::UNKNOWN
    }
}

/// Keyword groups matched against the lowercased hostname, first group wins.
const NAME_RULES: &[(&[&str], Classification)] = &[
    (
        &["printer", "print", "hp", "canon", "epson", "brother", "xerox", "lexmark", "samsung", "konica"],
        Classification { device_type: "Printer", os_guess: "Network Printer" },
    ),
    (
        &["iphone", "android", "phone", "mobile", "samsung", "huawei", "xiaomi", "pixel"],
        Classification { device_type: "Mobile Phone", os_guess: "iOS/Android" },
    ),
    (
        &["pc", "laptop", "desktop", "computer", "notebook", "macbook"],
        Classification { device_type: "Computer", os_guess: "Windows/Linux/Mac" },
    ),
    (
        &["router", "gateway", "ap", "access-point", "tp-link", "netgear", "cisco", "d-link"],
        Classification { device_type: "Router/Access Point", os_guess: "Router OS" },
    ),
];

/// Fallback classification from the resolved hostname. Returns `None` for the
/// unresolved sentinel or when no keyword group matches. Case-insensitive.
pub fn classify_by_name(hostname: &str) -> Option<Classification> {
    if hostname.is_empty() || hostname == UNRESOLVED_NAME {
        return None;
    }
    let lower = hostname.to_lowercase();
    for (keywords, classification) in NAME_RULES {
        if keywords.iter().any(|k| lower.contains(k)) {
            return Some(*classification);
        }
    }
    None
}

/// Manufacturer guess from known virtualization-vendor MAC prefixes
/// (first three octets). Anything else is "Unknown".
pub fn manufacturer_from_mac(mac: Option<&str>) -> &'static str {
    let Some(mac) = mac else { return "Unknown" };
    if mac.len() < 8 {
        return "Unknown";
    }
    let prefix = mac[..8].to_uppercase();
    match prefix.as_str() {
        "00:50:56" | "00:0C:29" => "VMware",
        "00:1B:21" | "00:1C:42" => "Xen",
        "08:00:27" => "VirtualBox",
        _ => "Unknown",
    }
}

/// WiFi-band guess. A few prefixes common on modern radios lean "5GHz";
/// everything else is a generic "WiFi". There is no way to query the access
/// point from here, so this is a hint only.
pub fn wifi_band_guess(mac: Option<&str>) -> &'static str {
    if let Some(mac) = mac {
        let upper = mac.to_uppercase();
        if upper.starts_with("60:")
            || upper.starts_with("7C:")
            || upper.starts_with("DC:")
            || upper.starts_with("2E:")
        {
            return "5GHz";
        }
    }
    "WiFi"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printer_ports_win_over_web_ports() {
        let c = classify_by_ports(&[80, 443, 9100], true);
        assert_eq!(c.device_type, "Printer");
        assert_eq!(c.os_guess, "Network Printer");
    }

    #[test]
    fn mobile_ports_win_over_media_rule() {
        // 5000 appears in both the mobile and media groups; mobile is first.
        let c = classify_by_ports(&[5000], true);
        assert_eq!(c.device_type, "Mobile Phone");
    }

    #[test]
    fn media_rule_reachable_via_5002() {
        let c = classify_by_ports(&[5002], true);
        assert_eq!(c.device_type, "Media Device");
        assert_eq!(c.os_guess, "DLNA/AirPlay");
    }

    #[test]
    fn server_chain() {
        assert_eq!(classify_by_ports(&[8080], true).device_type, "Web Server");
        assert_eq!(classify_by_ports(&[22], true).device_type, "Linux/Unix Server");
        assert_eq!(classify_by_ports(&[3389], true).device_type, "Windows Server");
        assert_eq!(classify_by_ports(&[139], true).device_type, "Windows Computer");
        assert_eq!(classify_by_ports(&[21], true).device_type, "FTP Server");
    }

    #[test]
    fn reachable_with_no_ports_is_network_device() {
        let c = classify_by_ports(&[], true);
        assert_eq!(c.device_type, "Network Device");
        assert_eq!(c.os_guess, "Router/Switch/AP");
    }

    #[test]
    fn unmatched_ports_are_unknown() {
        assert_eq!(classify_by_ports(&[23], true), Classification::UNKNOWN);
        assert_eq!(classify_by_ports(&[], false), Classification::UNKNOWN);
    }

    #[test]
    fn name_rules_are_ordered_and_case_insensitive() {
        // "samsung" is in both the printer and phone groups; printers first.
        assert_eq!(classify_by_name("Samsung-device").unwrap().device_type, "Printer");
        assert_eq!(classify_by_name("Johns-iPhone").unwrap().device_type, "Mobile Phone");
        assert_eq!(classify_by_name("WORK-LAPTOP").unwrap().device_type, "Computer");
    }

    #[test]
    fn router_names_classify() {
        assert_eq!(classify_by_name("tp-link-gw").unwrap().device_type, "Router/Access Point");
        assert_eq!(classify_by_name("netgear-node").unwrap().device_type, "Router/Access Point");
    }

    #[test]
    fn unresolved_sentinel_yields_none() {
        assert!(classify_by_name(UNRESOLVED_NAME).is_none());
        assert!(classify_by_name("").is_none());
        assert!(classify_by_name("zzz-device").is_none());
    }

    #[test]
    fn manufacturer_prefix_table() {
        assert_eq!(manufacturer_from_mac(Some("00:50:56:AA:BB:CC")), "VMware");
        assert_eq!(manufacturer_from_mac(Some("08:00:27:01:02:03")), "VirtualBox");
        assert_eq!(manufacturer_from_mac(Some("00:1c:42:00:00:00")), "Xen");
        assert_eq!(manufacturer_from_mac(Some("AA:BB:CC:DD:EE:FF")), "Unknown");
        assert_eq!(manufacturer_from_mac(None), "Unknown");
        assert_eq!(manufacturer_from_mac(Some("short")), "Unknown");
    }

    #[test]
    fn wifi_band_heuristic() {
        assert_eq!(wifi_band_guess(Some("60:AB:00:00:00:00")), "5GHz");
        assert_eq!(wifi_band_guess(Some("dc:00:00:00:00:00")), "5GHz");
        assert_eq!(wifi_band_guess(Some("00:11:22:33:44:55")), "WiFi");
        assert_eq!(wifi_band_guess(None), "WiFi");
    }
}
