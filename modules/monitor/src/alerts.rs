//! Threshold evaluation and alert fan-out.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::stats::HostStats;

/// Alert thresholds, fixed at monitor construction.
#[derive(Debug, Clone, Copy)]
pub struct AlertPolicy {
    pub availability_threshold_percent: f64,
    pub max_response_time_ms: u64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        AlertPolicy {
            availability_threshold_percent: 99.0,
            max_response_time_ms: 2000,
        }
    }
}

/// Stateless threshold test. Both comparisons are strict: a host sitting
/// exactly on a threshold does not alert.
pub fn should_alert(stats: &HostStats, policy: &AlertPolicy) -> bool {
    stats.availability_percent() < policy.availability_threshold_percent
        || stats.last_response_time_ms() > policy.max_response_time_ms
}

/// The closed set of alert delivery channels.
#[derive(Debug, Clone)]
pub enum AlertChannel {
    /// Print to stdout.
    Console,
    /// Emit through the tracing subscriber.
    Log,
    /// POST a small JSON payload to an HTTP endpoint.
    Webhook { url: String, client: reqwest::Client },
    /// Append to an in-process buffer, in delivery order.
    Memory(Arc<Mutex<Vec<String>>>),
}

impl AlertChannel {
    pub fn webhook(url: impl Into<String>) -> Self {
        AlertChannel::Webhook {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// A memory channel plus the shared buffer it appends to.
    pub fn memory() -> (Self, Arc<Mutex<Vec<String>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        (AlertChannel::Memory(buffer.clone()), buffer)
    }

    fn kind(&self) -> &'static str {
        match self {
            AlertChannel::Console => "console",
            AlertChannel::Log => "log",
            AlertChannel::Webhook { .. } => "webhook",
            AlertChannel::Memory(_) => "memory",
        }
    }

    async fn deliver(&self, message: &str) -> Result<()> {
        match self {
            AlertChannel::Console => {
                println!("[ALERT] {message}");
                Ok(())
            }
            AlertChannel::Log => {
                tracing::warn!("[ALERT] {message}");
                Ok(())
            }
            AlertChannel::Webhook { url, client } => {
                let payload = serde_json::json!({ "text": message });
                client
                    .post(url)
                    .json(&payload)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(())
            }
            AlertChannel::Memory(buffer) => {
                buffer.lock().unwrap().push(message.to_string());
                Ok(())
            }
        }
    }
}

/// Fans a timestamped alert out to every registered channel in registration
/// order. A failing channel is logged and skipped; it never aborts delivery
/// to the remaining channels.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    channels: Vec<AlertChannel>,
}

impl Notifier {
    pub fn new() -> Self {
        Notifier::default()
    }

    pub fn register(&mut self, channel: AlertChannel) {
        self.channels.push(channel);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub async fn notify(&self, message: &str) {
        let stamped = format!("{} - {}", now_rfc3339(), message);
        for channel in &self.channels {
            if let Err(err) = channel.deliver(&stamped).await {
                tracing::warn!(channel = channel.kind(), error = %err, "alert delivery failed");
            }
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
