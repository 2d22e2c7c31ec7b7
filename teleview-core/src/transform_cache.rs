//! Capture-once cache for the calibration transform

use crate::transform::{FramePair, TransformRecord};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Holds the first transform seen for one `(parent, child)` pair.
///
/// Capture is a one-way latch: once a record is stored every later batch is
/// ignored, including batches carrying a different value for the same pair.
#[derive(Debug)]
pub struct StaticTransformCache {
    target: FramePair,
    record: OnceLock<TransformRecord>,
}

impl StaticTransformCache {
    pub fn new(target: FramePair) -> Self {
        Self { target, record: OnceLock::new() }
    }

    pub fn target(&self) -> &FramePair {
        &self.target
    }

    /// Scan one batch; returns true if this call captured the transform.
    pub fn on_transform_batch(&self, batch: &[TransformRecord]) -> bool {
        if self.is_captured() {
            return false;
        }

        let Some(found) = batch
            .iter()
            .find(|t| self.target.matches(&t.parent_frame, &t.child_frame))
        else {
            debug!(
                "no {} -> {} transform among {} entries",
                self.target.parent,
                self.target.child,
                batch.len()
            );
            return false;
        };

        // A concurrent batch may have won the race; its value stands.
        let captured = self.record.set(found.clone()).is_ok();
        if captured {
            info!(
                "captured static transform {} -> {}: translation {:?}",
                found.parent_frame, found.child_frame, found.translation
            );
        }
        captured
    }

    pub fn is_captured(&self) -> bool {
        self.record.get().is_some()
    }

    /// Owned copy of the captured record
    pub fn get(&self) -> Option<TransformRecord> {
        self.record.get().cloned()
    }

    /// Borrow the captured record; it never changes once set
    pub fn get_ref(&self) -> Option<&TransformRecord> {
        self.record.get()
    }
}

impl Default for StaticTransformCache {
    fn default() -> Self {
        Self::new(FramePair::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{UnitQuaternion, Vector3};

    fn entry(parent: &str, child: &str, x: f64) -> TransformRecord {
        TransformRecord::new(parent, child, Vector3::new(x, 0.0, 0.0), UnitQuaternion::identity())
    }

    #[test]
    fn test_captures_first_matching_entry() {
        let cache = StaticTransformCache::default();
        let batch = vec![
            entry("base_link", "camera_link", 9.0),
            entry("camera_link", "camera_color_frame", 1.0),
            entry("camera_link", "camera_color_frame", 2.0),
        ];

        assert!(cache.on_transform_batch(&batch));
        assert_eq!(cache.get().unwrap().translation.x, 1.0);
    }

    #[test]
    fn test_later_batches_are_ignored() {
        let cache = StaticTransformCache::default();
        cache.on_transform_batch(&[entry("camera_link", "camera_color_frame", 1.0)]);

        assert!(!cache.on_transform_batch(&[entry("camera_link", "camera_color_frame", 5.0)]));
        assert_eq!(cache.get_ref().unwrap().translation.x, 1.0);
    }

    #[test]
    fn test_mismatch_leaves_cache_empty() {
        let cache = StaticTransformCache::new(FramePair::new("map", "odom"));
        assert!(!cache.on_transform_batch(&[entry("camera_link", "camera_color_frame", 1.0)]));
        assert!(!cache.is_captured());
        assert!(cache.get().is_none());

        // reversed pair is not a match either
        assert!(!cache.on_transform_batch(&[entry("odom", "map", 1.0)]));
        assert!(cache.on_transform_batch(&[entry("map", "odom", 3.0)]));
    }

    #[test]
    fn test_empty_batch_is_harmless() {
        let cache = StaticTransformCache::default();
        assert!(!cache.on_transform_batch(&[]));
        assert!(!cache.is_captured());
    }
}
