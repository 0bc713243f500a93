use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use monitor::{AlertChannel, AlertPolicy, Monitor};

mod config;
mod report;

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json, Jsonl }

fn parse_format(f: &str) -> OutputFormat {
    match f {
        "json" => OutputFormat::Json,
        "jsonl" => OutputFormat::Jsonl,
        _ => OutputFormat::Text,
    }
}

#[derive(Debug, Parser)]
#[command(name = "netmon", version, about = "LAN device discovery and health monitoring")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./netmon.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Sweep an address range and fingerprint every responding device
    Scan {
        /// Three-octet prefix (e.g., 192.168.1). Autodetected if omitted.
        prefix: Option<String>,
        /// First host octet
        #[arg(long, default_value_t = 1)]
        start: u8,
        /// Last host octet
        #[arg(long, default_value_t = 254)]
        end: u8,
        /// Timeout per connection attempt in milliseconds
        #[arg(long, default_value_t = 300)]
        timeout_ms: u64,
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Output file (overwrites)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// List live addresses only, without fingerprinting
    Discover {
        /// CIDR (e.g., 192.168.1.0/24) or three-octet prefix
        target: String,
        /// First host octet (prefix targets only)
        #[arg(long, default_value_t = 1)]
        start: u8,
        /// Last host octet (prefix targets only)
        #[arg(long, default_value_t = 254)]
        end: u8,
        /// Timeout per connection attempt in milliseconds
        #[arg(long, default_value_t = 200)]
        timeout_ms: u64,
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Output file (overwrites)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Monitor devices until interrupted, with alerts and periodic CSV reports
    Monitor {
        /// Devices as id=address pairs (a bare address monitors itself)
        targets: Vec<String>,
        /// File with newline-delimited targets (comments with # and blanks ignored)
        #[arg(long, value_name = "FILE")]
        targets_file: Option<PathBuf>,
        /// Seconds between monitoring cycles
        #[arg(long, default_value_t = 10)]
        interval_secs: u64,
        /// Alert when availability drops below this percentage
        #[arg(long, default_value_t = 99.0)]
        availability_threshold: f64,
        /// Alert when a response takes longer than this many milliseconds
        #[arg(long, default_value_t = 2000)]
        max_response_ms: u64,
        /// Connect port for the per-cycle reachability probe
        #[arg(long, default_value_t = probe::REACHABILITY_PORT)]
        probe_port: u16,
        /// Also POST alerts to this webhook URL
        #[arg(long)]
        webhook: Option<String>,
        /// Directory for the periodic availability report
        #[arg(long, default_value = "./reports")]
        report_dir: PathBuf,
    },
}

/// `id=address` registers a named device; a bare address is its own id.
fn parse_target(spec: &str) -> (String, String) {
    match spec.split_once('=') {
        Some((id, addr)) if !id.is_empty() && !addr.is_empty() => (id.to_string(), addr.to_string()),
        _ => (spec.to_string(), spec.to_string()),
    }
}

fn device_json(d: &discovery::DiscoveredDevice) -> serde_json::Value {
    serde_json::json!({
        "address": d.address,
        "name": d.name,
        "state": d.state,
        "mac_address": d.mac_address,
        "open_ports": d.open_ports,
        "manufacturer": d.manufacturer,
        "device_type": d.device_type,
        "os_guess": d.os_guess,
        "response_time_ms": d.response_time_ms,
        "wifi_band": d.wifi_band_guess,
        "connection_type": d.connection_type_guess,
    })
}

fn emit_lines(lines: Vec<String>, out: Option<PathBuf>) -> Result<()> {
    if let Some(path) = out {
        let file = OpenOptions::new().create(true).truncate(true).write(true).open(&path)?;
        let mut w = BufWriter::new(file);
        for line in lines {
            writeln!(w, "{}", line)?;
        }
    } else {
        for line in lines {
            println!("{}", line);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let loaded_cfg = config::load_config(cli.config.as_deref());
    match cli.command {
        Commands::Version => {
            println!("netmon {} (core {})", env!("CARGO_PKG_VERSION"), netmon_core::version());
        }
        Commands::Scan { mut prefix, mut start, mut end, mut timeout_ms, mut format, out } => {
            if let Some(cfg) = &loaded_cfg { if let Some(s) = &cfg.scan {
                if prefix.is_none() { prefix = s.prefix.clone(); }
                if s.start.is_some() { start = s.start.unwrap(); }
                if s.end.is_some() { end = s.end.unwrap(); }
                if s.timeout_ms.is_some() { timeout_ms = s.timeout_ms.unwrap(); }
                if let Some(f) = &s.format { format = parse_format(f); }
            }}
            let prefix = prefix.unwrap_or_else(discovery::local_network_prefix);
            let rt = tokio::runtime::Runtime::new()?;
            let started = Instant::now();
            let started_at = now_rfc3339();
            let prefix_for_scan = prefix.clone();
            let devices = rt.block_on(async move {
                discovery::discover(&prefix_for_scan, start, end, Duration::from_millis(timeout_ms)).await
            })?;
            let duration_ms = started.elapsed().as_millis();
            let ended_at = now_rfc3339();

            let lines = match format {
                OutputFormat::Text => {
                    let mut lines = vec![format!("devices found ({}):", devices.len())];
                    for d in &devices {
                        let ports = d.open_ports.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(",");
                        let mac = d.mac_address.as_deref().unwrap_or("-");
                        lines.push(format!(
                            "{}  {}  {}  mac={}  ports=[{}]  {} ms",
                            d.address, d.name, d.device_type, mac, ports, d.response_time_ms
                        ));
                    }
                    lines.push(format!(
                        "(range {}.{}-{}, took {} ms)",
                        prefix, start, end, duration_ms
                    ));
                    lines
                }
                OutputFormat::Json => {
                    let obj = serde_json::json!({
                        "prefix": prefix,
                        "start": start,
                        "end": end,
                        "devices": devices.iter().map(device_json).collect::<Vec<_>>(),
                        "duration_ms": duration_ms,
                        "started_at": started_at,
                        "ended_at": ended_at,
                    });
                    vec![serde_json::to_string(&obj)?]
                }
                OutputFormat::Jsonl => {
                    let mut lines = Vec::with_capacity(devices.len());
                    for d in &devices {
                        lines.push(serde_json::to_string(&device_json(d))?);
                    }
                    lines
                }
            };
            emit_lines(lines, out)?;
        }
        Commands::Discover { target, start, end, timeout_ms, format, out } => {
            let rt = tokio::runtime::Runtime::new()?;
            let started = Instant::now();
            let target_for_sweep = target.clone();
            let live = rt.block_on(async move {
                let per_probe = Duration::from_millis(timeout_ms);
                if target_for_sweep.contains('/') {
                    discovery::discover_cidr(&target_for_sweep, per_probe).await
                } else {
                    Ok(discovery::discover_addresses_only(&target_for_sweep, start, end, per_probe).await?)
                }
            })?;
            let duration_ms = started.elapsed().as_millis();

            let lines = match format {
                OutputFormat::Text => {
                    let mut lines = vec![format!("live hosts ({}):", live.len())];
                    lines.extend(live.iter().cloned());
                    lines.push(format!("(took {} ms)", duration_ms));
                    lines
                }
                OutputFormat::Json => {
                    let obj = serde_json::json!({
                        "target": target,
                        "live": live,
                        "duration_ms": duration_ms,
                    });
                    vec![serde_json::to_string(&obj)?]
                }
                OutputFormat::Jsonl => live
                    .iter()
                    .map(|host| serde_json::json!({ "host": host }).to_string())
                    .collect(),
            };
            emit_lines(lines, out)?;
        }
        Commands::Monitor {
            targets,
            targets_file,
            mut interval_secs,
            mut availability_threshold,
            mut max_response_ms,
            mut probe_port,
            mut webhook,
            mut report_dir,
        } => {
            if let Some(cfg) = &loaded_cfg { if let Some(m) = &cfg.monitor {
                if m.interval_secs.is_some() { interval_secs = m.interval_secs.unwrap(); }
                if m.availability_threshold.is_some() { availability_threshold = m.availability_threshold.unwrap(); }
                if m.max_response_ms.is_some() { max_response_ms = m.max_response_ms.unwrap(); }
                if m.probe_port.is_some() { probe_port = m.probe_port.unwrap(); }
                if webhook.is_none() { webhook = m.webhook.clone(); }
                if let Some(dir) = &m.report_dir { report_dir = PathBuf::from(dir); }
            }}

            let mut specs = targets;
            if let Some(path) = targets_file {
                let fh = File::open(&path)?;
                let br = BufReader::new(fh);
                for line in br.lines() {
                    let line = line?;
                    let t = line.trim();
                    if t.is_empty() || t.starts_with('#') { continue; }
                    specs.push(t.to_string());
                }
            }
            if specs.is_empty() {
                return Err(anyhow!("provide at least one target or --targets-file <file>"));
            }

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async move {
                let mut builder = Monitor::builder(Duration::from_secs(interval_secs))
                    .probe_port(probe_port)
                    .policy(AlertPolicy {
                        availability_threshold_percent: availability_threshold,
                        max_response_time_ms: max_response_ms,
                    })
                    .channel(AlertChannel::Console)
                    .report_sink(Box::new(report::CsvReportSink::new(&report_dir)));
                if let Some(url) = webhook {
                    builder = builder.channel(AlertChannel::webhook(url));
                }
                let mon = builder.build();
                for spec in &specs {
                    let (id, address) = parse_target(spec);
                    mon.add_device(&id, &address);
                }
                mon.start();

                tokio::signal::ctrl_c().await?;
                tracing::info!("interrupt received, stopping monitor");
                mon.stop();
                while mon.is_running() {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }

                let (devices, stats) = mon.snapshot();
                for d in &devices {
                    if let Some(s) = stats.get(&d.id) {
                        println!("{}\n", s.summary());
                    }
                }
                anyhow::Ok(())
            })?;
        }
    }
    Ok(())
}
