//! Metrics collection for the MAP-Me control plane.
//!
//! All metric primitives are lock-free so they can be bumped from the packet
//! path and from the event manager without coordination.

use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Histogram
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<u64>,
    overflow: AtomicU64,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Buckets are upper bounds, in increasing order.
    pub fn new(boundaries: Vec<u64>) -> Self {
        let buckets = (0..boundaries.len()).map(|_| AtomicU64::new(0)).collect();

        Self {
            buckets,
            boundaries,
            overflow: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        match self.boundaries.iter().position(|&b| value <= b) {
            Some(idx) => {
                self.buckets[idx].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn average(&self) -> f64 {
        let c = self.count.load(Ordering::Relaxed);
        if c == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / c as f64
        }
    }

    pub fn counts(&self) -> Vec<(u64, u64)> {
        self.boundaries
            .iter()
            .zip(self.buckets.iter())
            .map(|(&b, bucket)| (b, bucket.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn overflow(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    /// Microsecond buckets from 100µs to 10s.
    fn default() -> Self {
        Self::new(vec![
            100, 1_000, 10_000, 50_000, 100_000, 500_000, 1_000_000, 10_000_000,
        ])
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for MAP-Me
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct MapMeMetrics {
    // Control message processing
    pub ctrl_received: Counter,
    pub ctrl_decode_errors: Counter,
    pub ctrl_prefix_not_found: Counter,
    pub ctrl_unsupported: Counter,
    pub ctrl_disabled: Counter,
    pub acks_forged: Counter,
    pub acks_received: Counter,

    // Decisions
    pub nh_set: Counter,
    pub nh_add: Counter,
    pub ph_add: Counter,
    pub stale_ignored: Counter,
    pub capacity_exceeded: Counter,

    // Event queue
    pub events_enqueued: Counter,
    pub events_dropped: Counter,

    // Interest Update transmission
    pub iu_sent: Counter,
    pub iu_retransmitted: Counter,
    pub iu_acked: Counter,
    pub iu_expired: Counter,
    pub iu_cancelled: Counter,
    pub iu_in_flight: Gauge,
    /// Time from first transmission to acknowledgment, in microseconds.
    pub ack_rtt: Histogram,
}

impl MapMeMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}
