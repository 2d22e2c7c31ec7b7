//! Depth-window filtering and stride downsampling

use crate::config::RenderConfig;
use crate::frame::DecodedFrame;

/// Counters describing one filter pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Points visited by the stride
    pub sampled: usize,
    /// Points inside the depth window that made it into the output
    pub accepted: usize,
    /// True when the cap dropped at least one point the depth window accepted
    pub truncated: bool,
}

/// Select the renderable subset of `frame`.
///
/// Visits every `downsample_rate`-th point from index 0, keeps those whose Z
/// lies in `[min_depth, max_depth]` and stops at the first acceptable point
/// past `max_points_to_display`. The early exit favours points near the
/// start of the source array; it is not a uniform sample.
///
/// # Example
/// ```rust
/// use teleview_core::{filter_frame, DecodedFrame, Point3f, RenderConfig};
///
/// let mut frame = DecodedFrame::new();
/// frame.push(Point3f::new(0.0, 0.0, 5.0), [1.0, 0.0, 0.0]);
/// frame.push(Point3f::new(0.0, 0.0, 50.0), [0.0, 1.0, 0.0]);
///
/// let visible = filter_frame(&frame, &RenderConfig::default(), 10);
/// assert_eq!(visible.len(), 1);
/// ```
pub fn filter_frame(frame: &DecodedFrame, config: &RenderConfig, max_points_to_display: usize) -> DecodedFrame {
    filter_frame_with_stats(frame, config, max_points_to_display).0
}

/// [`filter_frame`] plus the counters of the pass
pub fn filter_frame_with_stats(
    frame: &DecodedFrame,
    config: &RenderConfig,
    max_points_to_display: usize,
) -> (DecodedFrame, FilterStats) {
    let mut stats = FilterStats::default();
    let stride = config.downsample_rate.max(1);
    let expected = frame.len().div_ceil(stride).min(max_points_to_display);
    let mut output = DecodedFrame::with_capacity(expected);

    for (position, color) in frame.iter().step_by(stride) {
        stats.sampled += 1;
        if !config.accepts_depth(position.z) {
            continue;
        }
        // full: the first point that would still have been kept ends the pass
        if output.len() >= max_points_to_display {
            stats.truncated = true;
            break;
        }
        output.push(*position, *color);
    }

    stats.accepted = output.len();
    (output, stats)
}
