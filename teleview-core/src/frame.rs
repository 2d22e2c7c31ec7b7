//! Decoded point-cloud frames

use crate::point::*;

/// One decoded point cloud as parallel position/color arrays.
///
/// The two arrays always have the same length; the only way to grow a frame
/// is [`DecodedFrame::push`]. A frame is owned by whichever stage produced it
/// last and is handed off whole, never shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFrame {
    positions: Vec<Point3f>,
    colors: Vec<Color3f>,
}

impl DecodedFrame {
    /// Create a new empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new frame with room for `capacity` points
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
        }
    }

    /// Build a frame from parallel arrays, or `None` if their lengths differ.
    pub fn from_parts(positions: Vec<Point3f>, colors: Vec<Color3f>) -> Option<Self> {
        if positions.len() != colors.len() {
            return None;
        }
        Some(Self { positions, colors })
    }

    /// Number of points in the frame
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append one point and its color
    pub fn push(&mut self, position: Point3f, color: Color3f) {
        self.positions.push(position);
        self.colors.push(color);
    }

    pub fn positions(&self) -> &[Point3f] {
        &self.positions
    }

    pub fn colors(&self) -> &[Color3f] {
        &self.colors
    }

    /// Iterate over `(position, color)` pairs in source order
    pub fn iter(&self) -> impl Iterator<Item = (&Point3f, &Color3f)> + '_ {
        self.positions.iter().zip(self.colors.iter())
    }

    /// Pack the frame into the GPU instance layout
    pub fn to_instances(&self) -> Vec<PointInstance> {
        self.iter().map(|(p, c)| PointInstance::new(p, c)).collect()
    }

    /// Split the frame back into its arrays
    pub fn into_parts(self) -> (Vec<Point3f>, Vec<Color3f>) {
        (self.positions, self.colors)
    }
}

impl FromIterator<(Point3f, Color3f)> for DecodedFrame {
    fn from_iter<I: IntoIterator<Item = (Point3f, Color3f)>>(iter: I) -> Self {
        let mut frame = DecodedFrame::new();
        for (position, color) in iter {
            frame.push(position, color);
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_rejects_mismatched_lengths() {
        let positions = vec![Point3f::origin(), Point3f::new(1.0, 0.0, 0.0)];
        let colors = vec![[1.0, 1.0, 1.0]];
        assert!(DecodedFrame::from_parts(positions, colors).is_none());
    }

    #[test]
    fn test_push_keeps_arrays_parallel() {
        let mut frame = DecodedFrame::with_capacity(2);
        frame.push(Point3f::new(0.0, 0.0, 1.0), [1.0, 0.0, 0.0]);
        frame.push(Point3f::new(0.0, 0.0, 2.0), [0.0, 1.0, 0.0]);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.positions().len(), frame.colors().len());
        assert_eq!(frame.colors()[1], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_to_instances_preserves_order() {
        let frame: DecodedFrame = vec![
            (Point3f::new(1.0, 0.0, 0.0), [1.0, 0.0, 0.0]),
            (Point3f::new(2.0, 0.0, 0.0), [0.0, 0.0, 1.0]),
        ]
        .into_iter()
        .collect();
        let instances = frame.to_instances();
        assert_eq!(instances[0].position[0], 1.0);
        assert_eq!(instances[1].color, [0.0, 0.0, 1.0, 1.0]);
    }
}
