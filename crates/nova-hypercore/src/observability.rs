//! ObservabilityLogger (C9): a bounded ring buffer of events, per-type
//! counters, and a derived health summary — the metrics surface every other
//! component reports into.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub event_type: String,
    pub timestamp: u64,
    pub detail: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_events: u64,
    pub counts_by_type: HashMap<String, u64>,
    pub error_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: HealthStatus,
    pub error_rate: f64,
    pub stale_peers: Vec<String>,
    pub warnings: Vec<String>,
}

type Listener = Box<dyn Fn(&Event) + Send + Sync>;

pub struct ObservabilityLogger {
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
    metrics: Mutex<Metrics>,
    error_window: Mutex<VecDeque<bool>>,
    error_window_size: usize,
    stale_after_ms: u64,
    peer_last_seen: Mutex<HashMap<String, u64>>,
    listeners: Mutex<Vec<Listener>>,
}

impl ObservabilityLogger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            metrics: Mutex::new(Metrics::default()),
            error_window: Mutex::new(VecDeque::new()),
            error_window_size: 50,
            stale_after_ms: 60_000,
            peer_last_seen: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn on<F>(&self, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    /// Records an event, updates counters, and rings the buffer — the oldest
    /// event is dropped once `capacity` is exceeded.
    pub fn record(&self, event_type: &str, timestamp: u64, detail: Value) {
        let event = Event {
            event_type: event_type.to_string(),
            timestamp,
            detail,
        };

        {
            let mut events = self.events.lock().unwrap();
            if events.len() == self.capacity {
                events.pop_front();
            }
            events.push_back(event.clone());
        }

        {
            let mut metrics = self.metrics.lock().unwrap();
            metrics.total_events += 1;
            *metrics
                .counts_by_type
                .entry(event_type.to_string())
                .or_insert(0) += 1;
            let is_error = event_type.contains("error") || event_type.contains("failed");
            if is_error {
                metrics.error_count += 1;
            }
            let mut window = self.error_window.lock().unwrap();
            window.push_back(is_error);
            if window.len() > self.error_window_size {
                window.pop_front();
            }
        }

        if event_type == "peer_heartbeat" {
            if let Some(peer_id) = event.detail.get("peer_id").and_then(Value::as_str) {
                self.peer_last_seen
                    .lock()
                    .unwrap()
                    .insert(peer_id.to_string(), timestamp);
            }
        }

        tracing::debug!(event_type, timestamp, "observability event recorded");
        for l in self.listeners.lock().unwrap().iter() {
            l(&event);
        }
    }

    pub fn get_metrics(&self) -> Metrics {
        self.metrics.lock().unwrap().clone()
    }

    pub fn get_recent_events(&self, limit: usize) -> Vec<Event> {
        let events = self.events.lock().unwrap();
        events.iter().rev().take(limit).cloned().collect()
    }

    /// Health derived from the recent-error window plus any peer whose last
    /// heartbeat is older than `stale_after_ms` relative to `now_ms`.
    pub fn get_health(&self, now_ms: u64) -> Health {
        let window = self.error_window.lock().unwrap();
        let error_rate = if window.is_empty() {
            0.0
        } else {
            window.iter().filter(|e| **e).count() as f64 / window.len() as f64
        };
        drop(window);

        let stale_peers: Vec<String> = self
            .peer_last_seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, &seen)| now_ms.saturating_sub(seen) > self.stale_after_ms)
            .map(|(peer, _)| peer.clone())
            .collect();

        let mut warnings = Vec::new();
        if !stale_peers.is_empty() {
            warnings.push(format!("{} peer(s) have not reported recently", stale_peers.len()));
        }

        let status = if error_rate >= 0.5 {
            HealthStatus::Unhealthy
        } else if error_rate > 0.1 || !stale_peers.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Health {
            status,
            error_rate,
            stale_peers,
            warnings,
        }
    }

    pub fn reset(&self) {
        self.events.lock().unwrap().clear();
        *self.metrics.lock().unwrap() = Metrics::default();
        self.error_window.lock().unwrap().clear();
        self.peer_last_seen.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_updates_total_and_per_type_counts() {
        let logger = ObservabilityLogger::new(100);
        logger.record("replication.sync", 0, json!({}));
        logger.record("replication.sync", 1, json!({}));
        logger.record("discovery.lookup", 2, json!({}));
        let metrics = logger.get_metrics();
        assert_eq!(metrics.total_events, 3);
        assert_eq!(metrics.counts_by_type["replication.sync"], 2);
        assert_eq!(metrics.counts_by_type["discovery.lookup"], 1);
    }

    #[test]
    fn ring_buffer_drops_oldest_beyond_capacity() {
        let logger = ObservabilityLogger::new(2);
        logger.record("a", 0, json!(1));
        logger.record("b", 1, json!(2));
        logger.record("c", 2, json!(3));
        let recent = logger.get_recent_events(10);
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|e| e.event_type != "a"));
    }

    #[test]
    fn get_recent_events_returns_newest_first() {
        let logger = ObservabilityLogger::new(10);
        logger.record("a", 0, json!(1));
        logger.record("b", 1, json!(2));
        let recent = logger.get_recent_events(10);
        assert_eq!(recent[0].event_type, "b");
        assert_eq!(recent[1].event_type, "a");
    }

    #[test]
    fn high_error_rate_marks_unhealthy() {
        let logger = ObservabilityLogger::new(100);
        for _ in 0..10 {
            logger.record("sync_error", 0, json!({}));
        }
        let health = logger.get_health(0);
        assert!(matches!(health.status, HealthStatus::Unhealthy));
    }

    #[test]
    fn no_errors_is_healthy() {
        let logger = ObservabilityLogger::new(100);
        logger.record("sync_complete", 0, json!({}));
        let health = logger.get_health(0);
        assert!(matches!(health.status, HealthStatus::Healthy));
        assert_eq!(health.error_rate, 0.0);
    }

    #[test]
    fn stale_peer_heartbeat_triggers_degraded_and_warning() {
        let logger = ObservabilityLogger::new(100);
        logger.record("peer_heartbeat", 0, json!({"peer_id": "p1"}));
        let health = logger.get_health(120_000);
        assert!(matches!(health.status, HealthStatus::Degraded));
        assert_eq!(health.stale_peers, vec!["p1".to_string()]);
        assert_eq!(health.warnings.len(), 1);
    }

    #[test]
    fn recent_heartbeat_is_not_stale() {
        let logger = ObservabilityLogger::new(100);
        logger.record("peer_heartbeat", 100_000, json!({"peer_id": "p1"}));
        let health = logger.get_health(100_500);
        assert!(health.stale_peers.is_empty());
    }

    #[test]
    fn reset_clears_events_metrics_and_peers() {
        let logger = ObservabilityLogger::new(100);
        logger.record("peer_heartbeat", 0, json!({"peer_id": "p1"}));
        logger.reset();
        assert_eq!(logger.get_metrics().total_events, 0);
        assert!(logger.get_recent_events(10).is_empty());
        assert!(logger.get_health(100_000).stale_peers.is_empty());
    }
}
