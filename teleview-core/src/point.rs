//! Point and color types shared by every pipeline stage

use bytemuck::{Pod, Zeroable};
use nalgebra::Point3;

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// Normalized RGB color, each channel in `[0, 1]`
pub type Color3f = [f32; 3];

/// Convert an 8-bit channel triple to a normalized color.
pub fn color_from_rgb8(r: u8, g: u8, b: u8) -> Color3f {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
}

/// GPU-side layout of one point: position and color padded to vec4.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointInstance {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

impl PointInstance {
    pub fn new(position: &Point3f, color: &Color3f) -> Self {
        Self {
            position: [position.x, position.y, position.z, 1.0],
            color: [color[0], color[1], color[2], 1.0],
        }
    }
}
