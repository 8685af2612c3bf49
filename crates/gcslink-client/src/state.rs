use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Counters for one outbound telemetry stream
#[derive(Debug, Clone)]
pub struct OutputMetrics {
    /// Total bytes written
    bytes_sent: Arc<AtomicU64>,
    /// Total packets written
    packets_sent: Arc<AtomicU64>,
    /// Packets dropped because the socket would block
    packets_dropped: Arc<AtomicU64>,
    /// Total write errors
    errors: Arc<AtomicU64>,
    /// Last successful write
    last_activity: Arc<parking_lot::RwLock<Option<SystemTime>>>,
    /// When the stream was opened
    opened_at: SystemTime,
}

impl Default for OutputMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputMetrics {
    pub fn new() -> Self {
        Self {
            bytes_sent: Arc::new(AtomicU64::new(0)),
            packets_sent: Arc::new(AtomicU64::new(0)),
            packets_dropped: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(AtomicU64::new(0)),
            last_activity: Arc::new(parking_lot::RwLock::new(None)),
            opened_at: SystemTime::now(),
        }
    }

    /// Record one packet written
    pub fn record_packet_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        *self.last_activity.write() = Some(SystemTime::now());
    }

    /// Record one packet dropped
    pub fn record_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a write error
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }

    pub fn packets_dropped(&self) -> u64 {
        self.packets_dropped.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn last_activity(&self) -> Option<SystemTime> {
        *self.last_activity.read()
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_sent: self.bytes_sent(),
            packets_sent: self.packets_sent(),
            packets_dropped: self.packets_dropped(),
            errors: self.errors(),
            last_activity: self.last_activity(),
            opened_at: self.opened_at,
        }
    }
}

/// Snapshot of output metrics at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub packets_dropped: u64,
    pub errors: u64,
    pub last_activity: Option<SystemTime>,
    pub opened_at: SystemTime,
}
