use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ScanConfig {
    pub prefix: Option<String>,
    pub start: Option<u8>,
    pub end: Option<u8>,
    pub timeout_ms: Option<u64>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct MonitorConfig {
    pub interval_secs: Option<u64>,
    pub availability_threshold: Option<f64>,
    pub max_response_ms: Option<u64>,
    pub probe_port: Option<u16>,
    pub webhook: Option<String>,
    pub report_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub scan: Option<ScanConfig>,
    pub monitor: Option<MonitorConfig>,
}

pub fn load_config(path: Option<&Path>) -> Option<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new("netmon.yaml");
            if p.exists() { p.to_path_buf() } else { return None; }
        }
    };
    let s = fs::read_to_string(path).ok()?;
    serde_yaml::from_str(&s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_yaml() {
        let cfg: Config = serde_yaml::from_str(
            "scan:\n  timeout_ms: 150\nmonitor:\n  interval_secs: 5\n  webhook: http://example.invalid/hook\n",
        )
        .unwrap();
        let scan = cfg.scan.unwrap();
        assert_eq!(scan.timeout_ms, Some(150));
        assert_eq!(scan.prefix, None);
        let mon = cfg.monitor.unwrap();
        assert_eq!(mon.interval_secs, Some(5));
        assert_eq!(mon.webhook.as_deref(), Some("http://example.invalid/hook"));
        assert_eq!(mon.probe_port, None);
    }
}
