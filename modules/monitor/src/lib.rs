//! Background health monitoring of a registered device set.
//!
//! A single loop task owns all probing: each cycle it snapshot-iterates the
//! registered devices, probes them sequentially (bounding cycle duration by
//! the sum of per-device timeouts and keeping each `HostStats` single-writer),
//! records statistics, evaluates alerts, and every tenth cycle hands a
//! snapshot to the report collaborator. Cancellation is cooperative and
//! checked both between devices and between cycles.

pub mod alerts;
pub mod report;
pub mod stats;

pub use alerts::{should_alert, AlertChannel, AlertPolicy, Notifier};
pub use report::{ReportSink, REPORT_EVERY_CYCLES};
pub use stats::{HostStats, WINDOW_CAPACITY};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use netmon_core::{Device, DeviceState};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Default per-device probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct MonitorBuilder {
    interval: Duration,
    probe_timeout: Duration,
    probe_port: u16,
    policy: AlertPolicy,
    notifier: Notifier,
    report_sink: Option<Box<dyn ReportSink>>,
}

impl MonitorBuilder {
    /// The connect port used for the reachability probe.
    pub fn probe_port(mut self, port: u16) -> Self {
        self.probe_port = port;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn policy(mut self, policy: AlertPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn channel(mut self, channel: AlertChannel) -> Self {
        self.notifier.register(channel);
        self
    }

    pub fn report_sink(mut self, sink: Box<dyn ReportSink>) -> Self {
        self.report_sink = Some(sink);
        self
    }

    pub fn build(self) -> Monitor {
        Monitor {
            inner: Arc::new(Inner {
                interval: self.interval,
                probe_timeout: self.probe_timeout,
                probe_port: self.probe_port,
                policy: self.policy,
                notifier: RwLock::new(self.notifier),
                report_sink: self.report_sink,
                devices: RwLock::new(Vec::new()),
                stats: RwLock::new(HashMap::new()),
                running: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                stop: Notify::new(),
                cycles: AtomicU64::new(0),
            }),
        }
    }
}

/// Owns the registered device set, their statistics, and the monitoring loop.
pub struct Monitor {
    inner: Arc<Inner>,
}

struct Inner {
    interval: Duration,
    probe_timeout: Duration,
    probe_port: u16,
    policy: AlertPolicy,
    notifier: RwLock<Notifier>,
    report_sink: Option<Box<dyn ReportSink>>,
    devices: RwLock<Vec<Device>>,
    stats: RwLock<HashMap<String, HostStats>>,
    running: AtomicBool,
    stop_requested: AtomicBool,
    stop: Notify,
    cycles: AtomicU64,
}

impl Monitor {
    pub fn builder(interval: Duration) -> MonitorBuilder {
        MonitorBuilder {
            interval,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            probe_port: probe::REACHABILITY_PORT,
            policy: AlertPolicy::default(),
            notifier: Notifier::new(),
            report_sink: None,
        }
    }

    /// Idempotent upsert: a duplicate id is a no-op, not a reset, so an
    /// already-monitored device keeps its accumulated statistics.
    pub fn add_device(&self, id: &str, address: &str) {
        let mut devices = self.inner.devices.write().unwrap();
        if devices.iter().any(|d| d.id == id) {
            return;
        }
        devices.push(Device::new(id, address));
        self.inner
            .stats
            .write()
            .unwrap()
            .insert(id.to_string(), HostStats::new(id));
        tracing::info!(device = id, address, "device registered");
    }

    /// Remove a device and its statistics. Effective for the next iteration;
    /// an in-flight probe result for it is discarded.
    pub fn remove_device(&self, id: &str) {
        self.inner.devices.write().unwrap().retain(|d| d.id != id);
        self.inner.stats.write().unwrap().remove(id);
        tracing::info!(device = id, "device removed");
    }

    /// Register an additional notification channel.
    pub fn register_channel(&self, channel: AlertChannel) {
        self.inner.notifier.write().unwrap().register(channel);
    }

    /// Start the monitoring loop. Calling while already running is a no-op.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.stop_requested.store(false, Ordering::SeqCst);
        let inner = self.inner.clone();
        tokio::spawn(run_loop(inner));
    }

    /// Request a cooperative stop. Calling while idle is a no-op. The loop
    /// observes the request between devices and between cycles, so
    /// `is_running` turns false within at most one sleep interval.
    pub fn stop(&self) {
        if !self.inner.running.load(Ordering::SeqCst) {
            return;
        }
        self.inner.stop_requested.store(true, Ordering::SeqCst);
        self.inner.stop.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn get_device(&self, id: &str) -> Option<Device> {
        self.inner
            .devices
            .read()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    /// Snapshot of one device's statistics (cloned, safe to read while the
    /// loop keeps writing).
    pub fn get_statistics(&self, id: &str) -> Option<HostStats> {
        self.inner.stats.read().unwrap().get(id).cloned()
    }

    pub fn list_device_ids(&self) -> Vec<String> {
        self.inner
            .devices
            .read()
            .unwrap()
            .iter()
            .map(|d| d.id.clone())
            .collect()
    }

    /// Read-only snapshot of the device list and all statistics, for report
    /// generation and presentation layers.
    pub fn snapshot(&self) -> (Vec<Device>, HashMap<String, HostStats>) {
        let devices = self.inner.devices.read().unwrap().clone();
        let stats = self.inner.stats.read().unwrap().clone();
        (devices, stats)
    }

    /// Completed monitoring cycles since construction.
    pub fn cycles(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }
}

async fn run_loop(inner: Arc<Inner>) {
    tracing::info!(interval_ms = inner.interval.as_millis() as u64, "monitoring loop started");
    'cycles: loop {
        let snapshot: Vec<Device> = inner.devices.read().unwrap().clone();
        for device in snapshot {
            if inner.stop_requested.load(Ordering::SeqCst) {
                break 'cycles;
            }
            let started = Instant::now();
            let up = probe::probe_port(&device.address, inner.probe_port, inner.probe_timeout).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            {
                let mut devices = inner.devices.write().unwrap();
                if let Some(d) = devices.iter_mut().find(|d| d.id == device.id) {
                    d.state = if up { DeviceState::Active } else { DeviceState::Inactive };
                }
            }

            let alert = {
                let mut stats = inner.stats.write().unwrap();
                match stats.get_mut(&device.id) {
                    Some(s) => {
                        s.record_check(up, elapsed_ms);
                        should_alert(s, &inner.policy).then(|| {
                            format!(
                                "performance alert for {} - availability: {:.2}%, response time: {}ms",
                                device.id,
                                s.availability_percent(),
                                elapsed_ms
                            )
                        })
                    }
                    // Removed while its probe was in flight; discard the result.
                    None => None,
                }
            };

            tracing::info!(device = %device.id, address = %device.address, up, elapsed_ms, "check recorded");
            if let Some(message) = alert {
                let notifier = inner.notifier.read().unwrap().clone();
                notifier.notify(&message).await;
            }
        }

        let cycle = inner.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        if cycle % REPORT_EVERY_CYCLES == 0 {
            if let Some(sink) = &inner.report_sink {
                let devices = inner.devices.read().unwrap().clone();
                let stats = inner.stats.read().unwrap().clone();
                if let Err(err) = sink.generate(&devices, &stats) {
                    tracing::warn!(error = %err, "report generation failed");
                }
            }
        }

        if inner.stop_requested.load(Ordering::SeqCst) {
            break;
        }
        tokio::select! {
            _ = inner.stop.notified() => break,
            _ = tokio::time::sleep(inner.interval) => {}
        }
    }
    inner.running.store(false, Ordering::SeqCst);
    tracing::info!("monitoring loop stopped");
}
