//! Core traits for teleview

use crate::frame::DecodedFrame;
use crate::Result;
use nalgebra::Matrix4;

/// Fixed-capacity point storage that can draw what was last uploaded.
///
/// Implemented by the GPU point buffer; tests use in-memory sinks.
pub trait PointSink {
    /// Maximum number of points one upload may carry
    fn capacity(&self) -> usize;

    /// Replace the stored points, starting at offset 0
    fn upload(&mut self, frame: &DecodedFrame) -> Result<()>;

    /// Draw `instance_count` stored points with the given size and placement
    fn draw(&mut self, instance_count: u32, point_size: f32, world: &Matrix4<f32>) -> Result<()>;
}

impl<S: PointSink + ?Sized> PointSink for Box<S> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn upload(&mut self, frame: &DecodedFrame) -> Result<()> {
        (**self).upload(frame)
    }

    fn draw(&mut self, instance_count: u32, point_size: f32, world: &Matrix4<f32>) -> Result<()> {
        (**self).draw(instance_count, point_size, world)
    }
}
