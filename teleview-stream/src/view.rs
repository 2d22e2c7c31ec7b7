//! Tick-driven render step: frame box to filter to sink

use crate::controller::StreamHandles;
use std::time::Duration;
use teleview_core::{filter_frame_with_stats, Error, FilterStats, FrameCorrection, PointSink, RenderConfig, Result};
use tracing::debug;

/// What one [`PointCloudView::tick`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Set when a new frame was taken and uploaded this tick
    pub uploaded: Option<FilterStats>,
    /// Instances drawn, 0 when the stream is disabled
    pub drawn: u32,
}

/// Render-side owner of a [`PointSink`].
///
/// Each tick takes at most one pending frame, filters it under the display
/// budget, uploads it and then draws whatever was last uploaded.
pub struct PointCloudView<S: PointSink> {
    handles: StreamHandles,
    config: RenderConfig,
    correction: FrameCorrection,
    sink: S,
    uploaded: u32,
    elapsed: Duration,
}

impl<S: PointSink> PointCloudView<S> {
    pub fn new(handles: StreamHandles, config: RenderConfig, correction: FrameCorrection, sink: S) -> Result<Self> {
        let config = RenderConfig::new(config)?;
        if config.max_points > sink.capacity() {
            return Err(Error::InvalidConfig(format!(
                "max_points {} exceeds point buffer capacity {}",
                config.max_points,
                sink.capacity()
            )));
        }
        Ok(Self {
            handles,
            config,
            correction,
            sink,
            uploaded: 0,
            elapsed: Duration::ZERO,
        })
    }

    pub fn tick(&mut self, delta: Duration) -> Result<TickReport> {
        self.elapsed += delta;
        let mut report = TickReport::default();

        if let Some(frame) = self.handles.frame_box.take_if_present() {
            let cap = self.config.display_points.min(self.sink.capacity());
            let (filtered, stats) = filter_frame_with_stats(&frame, &self.config, cap);
            self.sink.upload(&filtered)?;
            self.uploaded = u32::try_from(filtered.len()).unwrap_or(u32::MAX);
            debug!(
                "uploaded {} of {} points (sampled {})",
                stats.accepted,
                frame.len(),
                stats.sampled
            );
            report.uploaded = Some(stats);
        }

        if self.handles.is_enabled() {
            let world = self.correction.world_matrix(self.handles.transform_cache.get_ref());
            self.sink.draw(self.uploaded, self.config.point_size, &world)?;
            report.drawn = self.uploaded;
        }

        Ok(report)
    }

    pub fn set_density(&mut self, density: f32) {
        self.config.set_density(density);
    }

    pub fn set_point_size(&mut self, size: f32) -> Result<()> {
        self.config.set_point_size(size)
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn correction(&self) -> &FrameCorrection {
        &self.correction
    }

    /// Number of points in the last upload
    pub fn uploaded(&self) -> u32 {
        self.uploaded
    }

    /// Sum of all tick deltas so far
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
