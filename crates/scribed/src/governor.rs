//! Dual sliding-window admission control.
//!
//! Each client carries a minute window and an hour window of request
//! timestamps. Stale timestamps are evicted from the front before every
//! count, so eviction is amortized O(1) per request. A request is admitted
//! only when both windows are under their ceilings, and admission records
//! the timestamp in both.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use scribe_common::PipelineError;

const MINUTE_WINDOW: Duration = Duration::from_secs(60);
const HOUR_WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug, Default)]
struct ClientWindows {
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
}

/// Read-only rate report for one client.
#[derive(Debug, Clone, Serialize)]
pub struct RateStatus {
    pub requests_this_minute: usize,
    pub requests_this_hour: usize,
    pub minute_limit: usize,
    pub hour_limit: usize,
    pub minute_remaining: usize,
    pub hour_remaining: usize,
}

pub struct RateGovernor {
    clients: Mutex<HashMap<String, ClientWindows>>,
    per_minute: usize,
    per_hour: usize,
    minute_window: Duration,
    hour_window: Duration,
}

impl RateGovernor {
    pub fn new(per_minute: usize, per_hour: usize) -> Self {
        Self::with_windows(per_minute, per_hour, MINUTE_WINDOW, HOUR_WINDOW)
    }

    /// Custom window durations; production uses 60s/3600s, tests shrink them.
    pub fn with_windows(
        per_minute: usize,
        per_hour: usize,
        minute_window: Duration,
        hour_window: Duration,
    ) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            per_minute,
            per_hour,
            minute_window,
            hour_window,
        }
    }

    /// Admit or reject one request. Rejections name the offending limit.
    pub fn is_allowed(&self, client_id: &str) -> Result<(), PipelineError> {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap();
        let windows = clients.entry(client_id.to_string()).or_default();
        evict_stale(windows, now, self.minute_window, self.hour_window);

        if windows.minute.len() >= self.per_minute {
            warn!(
                "Rate limit exceeded for {}: {}/{} per minute",
                client_id,
                windows.minute.len(),
                self.per_minute
            );
            return Err(PipelineError::RateLimitExceeded(format!(
                "{} requests per minute",
                self.per_minute
            )));
        }
        if windows.hour.len() >= self.per_hour {
            warn!(
                "Rate limit exceeded for {}: {}/{} per hour",
                client_id,
                windows.hour.len(),
                self.per_hour
            );
            return Err(PipelineError::RateLimitExceeded(format!(
                "{} requests per hour",
                self.per_hour
            )));
        }

        windows.minute.push_back(now);
        windows.hour.push_back(now);
        Ok(())
    }

    /// Current counts and remaining quota. Performs the same lazy eviction
    /// as `is_allowed`, but records nothing.
    pub fn get_status(&self, client_id: &str) -> RateStatus {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap();
        let windows = clients.entry(client_id.to_string()).or_default();
        evict_stale(windows, now, self.minute_window, self.hour_window);

        RateStatus {
            requests_this_minute: windows.minute.len(),
            requests_this_hour: windows.hour.len(),
            minute_limit: self.per_minute,
            hour_limit: self.per_hour,
            minute_remaining: self.per_minute.saturating_sub(windows.minute.len()),
            hour_remaining: self.per_hour.saturating_sub(windows.hour.len()),
        }
    }

    /// Drop clients whose windows have fully drained (call periodically).
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap();
        clients.retain(|_, windows| {
            evict_stale(windows, now, self.minute_window, self.hour_window);
            !windows.hour.is_empty()
        });
        debug!("Rate governor tracking {} active clients", clients.len());
    }
}

fn evict_stale(
    windows: &mut ClientWindows,
    now: Instant,
    minute_window: Duration,
    hour_window: Duration,
) {
    while windows
        .minute
        .front()
        .is_some_and(|t| now.duration_since(*t) >= minute_window)
    {
        windows.minute.pop_front();
    }
    while windows
        .hour
        .front()
        .is_some_and(|t| now.duration_since(*t) >= hour_window)
    {
        windows.hour.pop_front();
    }
}
