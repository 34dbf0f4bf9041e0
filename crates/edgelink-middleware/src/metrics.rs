//! Per-adapter metric sink.
//!
//! Counters are plain atomics so they can be bumped from publish-completion
//! callbacks running on any thread.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Named counters an adapter can increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    SentMessages,
    SentMessageErrors,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::SentMessages => "sent_messages_total",
            Metric::SentMessageErrors => "sent_message_errors_total",
        }
    }
}

#[derive(Debug, Default)]
pub struct AdapterMetrics {
    sent_messages_total: AtomicU64,
    sent_message_errors_total: AtomicU64,
    payloads_in_flight: AtomicI64,
}

/// Point-in-time copy of an [`AdapterMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub sent_messages_total: u64,
    pub sent_message_errors_total: u64,
    pub payloads_in_flight: i64,
}

impl AdapterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, metric: Metric) {
        let counter = match metric {
            Metric::SentMessages => &self.sent_messages_total,
            Metric::SentMessageErrors => &self.sent_message_errors_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::SentMessages => self.sent_messages_total.load(Ordering::Relaxed),
            Metric::SentMessageErrors => self.sent_message_errors_total.load(Ordering::Relaxed),
        }
    }

    /// A payload buffer was allocated for an outbound message.
    pub fn payload_acquired(&self) {
        self.payloads_in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// A payload buffer was released.
    pub fn payload_released(&self) {
        self.payloads_in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn payloads_in_flight(&self) -> i64 {
        self.payloads_in_flight.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sent_messages_total: self.get(Metric::SentMessages),
            sent_message_errors_total: self.get(Metric::SentMessageErrors),
            payloads_in_flight: self.payloads_in_flight(),
        }
    }
}
