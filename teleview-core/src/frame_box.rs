//! Single-slot, latest-wins handoff between ingestion and rendering

use crate::frame::DecodedFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Mailbox holding at most one undelivered value.
///
/// `publish` replaces whatever is waiting, so a slow consumer only ever sees
/// the newest value and older ones are dropped without being queued. One
/// producer and one consumer may use the box concurrently; the value moves
/// in and out whole.
#[derive(Debug)]
pub struct FrameBox<T = DecodedFrame> {
    slot: Mutex<Option<T>>,
    published: AtomicU64,
    superseded: AtomicU64,
}

impl<T> FrameBox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            published: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
        }
    }

    /// Store `value`, discarding any value not yet taken.
    pub fn publish(&self, value: T) {
        let previous = self.lock().replace(value);
        self.published.fetch_add(1, Ordering::Relaxed);
        if previous.is_some() {
            self.superseded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take the pending value, leaving the box empty.
    pub fn take_if_present(&self) -> Option<T> {
        self.lock().take()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Total number of publishes
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Publishes that overwrote a value nobody took
    pub fn superseded(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        // The slot is a plain Option; a panic elsewhere cannot leave it torn.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Default for FrameBox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point3f;
    use std::sync::Arc;
    use std::thread;

    fn frame_at(z: f32) -> DecodedFrame {
        let mut frame = DecodedFrame::new();
        frame.push(Point3f::new(0.0, 0.0, z), [1.0, 1.0, 1.0]);
        frame
    }

    #[test]
    fn test_latest_publish_wins() {
        let mailbox = FrameBox::new();
        mailbox.publish(frame_at(1.0));
        mailbox.publish(frame_at(2.0));

        let taken = mailbox.take_if_present().unwrap();
        assert_eq!(taken.positions()[0].z, 2.0);
        assert!(mailbox.take_if_present().is_none());
        assert_eq!(mailbox.published(), 2);
        assert_eq!(mailbox.superseded(), 1);
    }

    #[test]
    fn test_empty_box_takes_nothing() {
        let mailbox: FrameBox = FrameBox::new();
        assert!(!mailbox.is_pending());
        assert!(mailbox.take_if_present().is_none());
    }

    #[test]
    fn test_concurrent_producer_and_consumer() {
        let mailbox = Arc::new(FrameBox::<u64>::new());
        let producer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || {
                for i in 1..=10_000u64 {
                    mailbox.publish(i);
                }
            })
        };

        let mut last_seen = 0;
        while !producer.is_finished() || mailbox.is_pending() {
            if let Some(v) = mailbox.take_if_present() {
                assert!(v > last_seen, "values must arrive in publish order");
                last_seen = v;
            }
        }
        producer.join().unwrap();
        if let Some(v) = mailbox.take_if_present() {
            last_seen = v;
        }
        assert_eq!(last_seen, 10_000);
    }
}
