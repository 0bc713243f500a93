//! Rolling availability and latency statistics for one monitored host.

use std::collections::VecDeque;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Capacity of the response-time and recent-state windows.
pub const WINDOW_CAPACITY: usize = 100;

/// Bounded-history aggregation of check outcomes for a single device.
///
/// Mutated exclusively through [`HostStats::record_check`] by the monitor
/// loop; readers get cloned snapshots, never the live windows.
#[derive(Debug, Clone)]
pub struct HostStats {
    host: String,
    total_checks: u64,
    failures: u64,
    availability_percent: f64,
    last_check_at: Option<OffsetDateTime>,
    last_failure_at: Option<OffsetDateTime>,
    failure_history: Vec<OffsetDateTime>,
    response_times: VecDeque<u64>,
    recent_states: VecDeque<bool>,
    last_response_time_ms: u64,
}

impl HostStats {
    pub fn new(host: impl Into<String>) -> Self {
        HostStats {
            host: host.into(),
            total_checks: 0,
            failures: 0,
            availability_percent: 100.0,
            last_check_at: None,
            last_failure_at: None,
            failure_history: Vec::new(),
            response_times: VecDeque::with_capacity(WINDOW_CAPACITY),
            recent_states: VecDeque::with_capacity(WINDOW_CAPACITY),
            last_response_time_ms: 0,
        }
    }

    /// Record one check outcome. Counters first, then the bounded windows
    /// (oldest entry evicted on overflow), then the derived availability.
    pub fn record_check(&mut self, success: bool, response_time_ms: u64) {
        let now = OffsetDateTime::now_utc();
        self.total_checks += 1;
        self.last_check_at = Some(now);
        if !success {
            self.failures += 1;
            self.last_failure_at = Some(now);
            self.failure_history.push(now);
        }

        self.response_times.push_back(response_time_ms);
        if self.response_times.len() > WINDOW_CAPACITY {
            self.response_times.pop_front();
        }
        self.recent_states.push_back(success);
        if self.recent_states.len() > WINDOW_CAPACITY {
            self.recent_states.pop_front();
        }
        self.last_response_time_ms = response_time_ms;

        self.availability_percent = if self.total_checks > 0 {
            ((self.total_checks - self.failures) as f64 / self.total_checks as f64) * 100.0
        } else {
            100.0
        };
    }

    /// Arithmetic mean of the response-time window; `0.0` when empty.
    pub fn mean_response_time(&self) -> f64 {
        if self.response_times.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.response_times.iter().sum();
        sum as f64 / self.response_times.len() as f64
    }

    /// State-flapping score over the recent-state window: `100 * (1 -
    /// transitions / window_len)`, where transitions counts adjacent-pair
    /// changes in insertion order. `100.0` below two entries, since no
    /// instability can have been observed yet.
    pub fn stability(&self) -> f64 {
        let len = self.recent_states.len();
        if len < 2 {
            return 100.0;
        }
        let transitions = self
            .recent_states
            .iter()
            .zip(self.recent_states.iter().skip(1))
            .filter(|(a, b)| a != b)
            .count();
        100.0 * (1.0 - transitions as f64 / len as f64)
    }

    /// Human-readable snapshot of this host's health.
    pub fn summary(&self) -> String {
        format!(
            "host: {}\navailability: {:.2}%\ntotal checks: {}\nfailures: {}\nlast check: {}\nlast failure: {}",
            self.host,
            self.availability_percent,
            self.total_checks,
            self.failures,
            format_instant(self.last_check_at),
            format_instant(self.last_failure_at),
        )
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn total_checks(&self) -> u64 {
        self.total_checks
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn availability_percent(&self) -> f64 {
        self.availability_percent
    }

    pub fn last_check_at(&self) -> Option<OffsetDateTime> {
        self.last_check_at
    }

    pub fn last_failure_at(&self) -> Option<OffsetDateTime> {
        self.last_failure_at
    }

    /// Append-only audit trail of failure timestamps.
    pub fn failure_history(&self) -> &[OffsetDateTime] {
        &self.failure_history
    }

    pub fn response_times(&self) -> &VecDeque<u64> {
        &self.response_times
    }

    pub fn recent_states(&self) -> &VecDeque<bool> {
        &self.recent_states
    }

    pub fn last_response_time_ms(&self) -> u64 {
        self.last_response_time_ms
    }
}

fn format_instant(at: Option<OffsetDateTime>) -> String {
    at.and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stats_report_full_availability() {
        let s = HostStats::new("gw");
        assert_eq!(s.total_checks(), 0);
        assert_eq!(s.availability_percent(), 100.0);
        assert_eq!(s.mean_response_time(), 0.0);
        assert_eq!(s.stability(), 100.0);
    }

    #[test]
    fn availability_follows_the_formula() {
        let mut s = HostStats::new("gw");
        for i in 0..10 {
            s.record_check(i % 4 != 0, 10);
        }
        // 10 checks, failures at i = 0, 4, 8.
        assert_eq!(s.total_checks(), 10);
        assert_eq!(s.failures(), 3);
        assert!((s.availability_percent() - 70.0).abs() < 1e-9);
        assert_eq!(s.failure_history().len(), 3);
        assert!(s.failures() <= s.total_checks());
    }

    #[test]
    fn windows_evict_fifo_at_capacity() {
        let mut s = HostStats::new("gw");
        for i in 0..(WINDOW_CAPACITY as u64 + 1) {
            s.record_check(true, i);
        }
        assert_eq!(s.response_times().len(), WINDOW_CAPACITY);
        assert_eq!(s.recent_states().len(), WINDOW_CAPACITY);
        // Entry 0 evicted, window now starts at 1.
        assert_eq!(*s.response_times().front().unwrap(), 1);
        assert_eq!(*s.response_times().back().unwrap(), WINDOW_CAPACITY as u64);
        // Counters keep the full history.
        assert_eq!(s.total_checks(), WINDOW_CAPACITY as u64 + 1);
    }

    #[test]
    fn mean_over_window_only() {
        let mut s = HostStats::new("gw");
        s.record_check(true, 10);
        s.record_check(true, 30);
        assert!((s.mean_response_time() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn stability_all_identical_is_perfect() {
        let mut s = HostStats::new("gw");
        s.record_check(false, 5);
        assert_eq!(s.stability(), 100.0);
        for _ in 0..20 {
            s.record_check(false, 5);
        }
        assert_eq!(s.stability(), 100.0);
    }

    #[test]
    fn stability_decreases_with_alternation() {
        let mut steady = HostStats::new("a");
        let mut flappy = HostStats::new("b");
        for i in 0..8u64 {
            steady.record_check(i < 4, 5);
            flappy.record_check(i % 2 == 0, 5);
        }
        // One transition vs. strictly alternating: k - 1 = 7 transitions.
        assert!(steady.stability() > flappy.stability());
        assert!((flappy.stability() - 100.0 * (1.0 - 7.0 / 8.0)).abs() < 1e-9);
    }

    #[test]
    fn summary_mentions_host_and_counts() {
        let mut s = HostStats::new("edge-router");
        s.record_check(false, 42);
        let text = s.summary();
        assert!(text.contains("edge-router"));
        assert!(text.contains("failures: 1"));
        assert!(!text.contains("N/A"));
    }
}
