//! Static transforms and the world placement derived from them

use crate::message::TransformStamped;
use nalgebra::{Matrix3, Matrix4, Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A named `(parent, child)` coordinate-frame pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramePair {
    pub parent: String,
    pub child: String,
}

impl FramePair {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self { parent: parent.into(), child: child.into() }
    }

    pub fn matches(&self, parent: &str, child: &str) -> bool {
        self.parent == parent && self.child == child
    }
}

impl Default for FramePair {
    fn default() -> Self {
        Self::new("camera_link", "camera_color_frame")
    }
}

/// A rigid transform relating two named frames
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRecord {
    pub parent_frame: String,
    pub child_frame: String,
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl TransformRecord {
    pub fn new(
        parent_frame: impl Into<String>,
        child_frame: impl Into<String>,
        translation: Vector3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self {
            parent_frame: parent_frame.into(),
            child_frame: child_frame.into(),
            translation,
            rotation,
        }
    }

    pub fn frame_pair(&self) -> FramePair {
        FramePair::new(self.parent_frame.clone(), self.child_frame.clone())
    }
}

impl From<&TransformStamped> for TransformRecord {
    fn from(msg: &TransformStamped) -> Self {
        let t = &msg.transform.translation;
        let q = &msg.transform.rotation;
        Self {
            parent_frame: msg.header.frame_id.clone(),
            child_frame: msg.child_frame_id.clone(),
            translation: Vector3::new(t.x, t.y, t.z),
            // a zero quaternion carries no orientation
            rotation: UnitQuaternion::try_new(Quaternion::new(q.w, q.x, q.y, q.z), 1e-9)
                .unwrap_or_else(UnitQuaternion::identity),
        }
    }
}

/// Axis convention applied to a captured transform before display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisRemap {
    /// Use the transform as published
    #[default]
    Identity,
    /// Right-handed Z-up (x forward, y left) to Y-up display axes:
    /// `(x, y, z) -> (-y, z, x)`
    RosToYUp,
}

impl AxisRemap {
    fn matrix(&self) -> Matrix3<f32> {
        match self {
            AxisRemap::Identity => Matrix3::identity(),
            AxisRemap::RosToYUp => Matrix3::new(
                0.0, -1.0, 0.0,
                0.0, 0.0, 1.0,
                1.0, 0.0, 0.0,
            ),
        }
    }
}

/// How the captured calibration transform becomes the point set's
/// object-to-world matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameCorrection {
    pub axis_remap: AxisRemap,
    /// Manual calibration added after remapping
    pub offset: [f32; 3],
    /// Roll, pitch, yaw in degrees applied before the captured rotation
    pub base_rotation_deg: [f32; 3],
    pub use_captured_rotation: bool,
    /// Flip the X axis of the point set
    pub mirror_x: bool,
}

impl Default for FrameCorrection {
    fn default() -> Self {
        Self {
            axis_remap: AxisRemap::Identity,
            offset: [0.0; 3],
            base_rotation_deg: [0.0; 3],
            use_captured_rotation: true,
            mirror_x: false,
        }
    }
}

impl FrameCorrection {
    /// Preset for a Y-up display of a camera publishing in ROS axes:
    /// remapped translation, a half turn about Z, mirrored X and the
    /// captured rotation left out.
    pub fn ros_display() -> Self {
        Self {
            axis_remap: AxisRemap::RosToYUp,
            offset: [0.0; 3],
            base_rotation_deg: [0.0, 0.0, 180.0],
            use_captured_rotation: false,
            mirror_x: true,
        }
    }

    fn base_rotation(&self) -> UnitQuaternion<f32> {
        let [roll, pitch, yaw] = self.base_rotation_deg;
        UnitQuaternion::from_euler_angles(roll.to_radians(), pitch.to_radians(), yaw.to_radians())
    }

    /// Object-to-world matrix for the point set.
    ///
    /// Without a captured transform the point set stays at the identity.
    pub fn world_matrix(&self, captured: Option<&TransformRecord>) -> Matrix4<f32> {
        let Some(record) = captured else {
            return Matrix4::identity();
        };

        let remap = self.axis_remap.matrix();
        let translation = remap * record.translation.cast::<f32>() + Vector3::from(self.offset);

        let mut rotation = self.base_rotation().to_homogeneous();
        if self.use_captured_rotation {
            let captured_rot = record.rotation.to_rotation_matrix().into_inner().cast::<f32>();
            // conjugating by the remap keeps the result a proper rotation
            rotation *= (remap * captured_rot * remap.transpose()).to_homogeneous();
        }

        let scale = if self.mirror_x {
            Matrix4::new_nonuniform_scaling(&Vector3::new(-1.0, 1.0, 1.0))
        } else {
            Matrix4::identity()
        };

        Matrix4::new_translation(&translation) * rotation * scale
    }
}
