//! The one metric the AEAD layer exposes externally (spec §9 open question:
//! only `packet_mac_failures` is specified as user-visible for traffic).

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, thread-safe counter of AEAD tag failures.
///
/// Cloned cheaply via `Arc` by callers that need to read it from the admin
/// handler while packets are being opened on the transport thread.
#[derive(Debug, Default)]
pub struct Metrics {
    packet_mac_failures: AtomicU64,
}

impl Metrics {
    /// Increment the failure counter. Called by [`crate::open`] on total
    /// tag-verification failure.
    pub fn record_mac_failure(&self) {
        self.packet_mac_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current failure count.
    #[must_use]
    pub fn packet_mac_failures(&self) -> u64 {
        self.packet_mac_failures.load(Ordering::Relaxed)
    }
}
