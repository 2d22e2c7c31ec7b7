//! Explicit context shared by the components of one stream

use crate::transport::PubSub;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Connection flag and ingestion counters
#[derive(Debug, Default)]
pub struct LinkStatus {
    connected: AtomicBool,
    received: AtomicU64,
    malformed: AtomicU64,
    published: AtomicU64,
    late: AtomicU64,
    transform_batches: AtomicU64,
}

/// Point-in-time copy of [`LinkStatus`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub received: u64,
    pub malformed: u64,
    pub published: u64,
    /// Deliveries that arrived after their subscription was closed
    pub late: u64,
    pub transform_batches: u64,
}

impl LinkStatus {
    pub fn new(connected: bool) -> Self {
        Self { connected: AtomicBool::new(connected), ..Default::default() }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_late(&self) {
        self.late.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transform_batch(&self) {
        self.transform_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            connected: self.is_connected(),
            received: self.received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            late: self.late.load(Ordering::Relaxed),
            transform_batches: self.transform_batches.load(Ordering::Relaxed),
        }
    }
}

/// Transport handle plus shared status, built once by the assembly point
/// and passed to every component that needs either.
#[derive(Clone)]
pub struct StreamContext {
    transport: Arc<dyn PubSub>,
    status: Arc<LinkStatus>,
}

impl StreamContext {
    pub fn new(transport: Arc<dyn PubSub>) -> Self {
        let status = Arc::new(LinkStatus::new(transport.is_connected()));
        Self { transport, status }
    }

    pub fn transport(&self) -> &Arc<dyn PubSub> {
        &self.transport
    }

    pub fn status(&self) -> &Arc<LinkStatus> {
        &self.status
    }

    /// Refresh the connection flag from the transport
    pub fn poll_connection(&self) -> bool {
        let connected = self.transport.is_connected();
        self.status.set_connected(connected);
        connected
    }
}
