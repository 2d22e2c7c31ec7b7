//! Wire messages received from the pub/sub transport
//!
//! The structs mirror the ROS 2 `sensor_msgs/PointCloud2` and
//! `tf2_msgs/TFMessage` layouts field for field so that they can be
//! (de)serialized with a CDR codec in declaration order.

use crate::decoder::{BLUE_OFFSET, GREEN_OFFSET, MIN_POINT_STEP, RED_OFFSET, X_OFFSET, Y_OFFSET, Z_OFFSET};
use crate::frame::DecodedFrame;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// PointField datatype tag for 8-bit unsigned integers
pub const DATATYPE_UINT8: u8 = 2;
/// PointField datatype tag for 32-bit floats
pub const DATATYPE_FLOAT32: u8 = 7;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

/// Description of one field inside a point record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointField {
    pub name: String,
    pub offset: u32,
    pub datatype: u8,
    pub count: u32,
}

/// Structured binary point cloud, one per network delivery
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPointMessage {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub fields: Vec<PointField>,
    pub is_bigendian: bool,
    /// Bytes between the starts of consecutive point records
    pub point_step: u32,
    pub row_step: u32,
    pub data: Vec<u8>,
    pub is_dense: bool,
}

impl RawPointMessage {
    /// Number of whole point records in the payload
    pub fn point_count(&self) -> usize {
        match self.point_step {
            0 => 0,
            step => self.data.len() / step as usize,
        }
    }

    /// Payload length implied by `row_step * height`
    pub fn expected_len(&self) -> usize {
        self.row_step as usize * self.height as usize
    }

    /// Whether the header dimensions agree with the payload length
    pub fn is_consistent(&self) -> bool {
        self.expected_len() == self.data.len()
    }

    /// Encode a frame using the sensor driver's record layout.
    ///
    /// X/Y/Z land at offsets 0/4/8 as little-endian f32 and the color is
    /// packed as blue, green, red bytes starting at offset 16. The rest of
    /// each record is zero padding.
    pub fn encode_points(frame: &DecodedFrame, point_step: u32) -> Result<Self> {
        let step = point_step as usize;
        if step < MIN_POINT_STEP {
            return Err(Error::PointStepTooSmall { point_step: step, required: MIN_POINT_STEP });
        }
        let too_large = || {
            Error::InvalidConfig(format!(
                "{} points of {} bytes do not fit a single point-cloud row",
                frame.len(),
                point_step
            ))
        };
        let width = u32::try_from(frame.len()).map_err(|_| too_large())?;
        let row_step = point_step.checked_mul(width).ok_or_else(too_large)?;

        let mut data = vec![0u8; row_step as usize];
        for (n, (position, color)) in frame.iter().enumerate() {
            let base = n * step;
            data[base + X_OFFSET..base + X_OFFSET + 4].copy_from_slice(&position.x.to_le_bytes());
            data[base + Y_OFFSET..base + Y_OFFSET + 4].copy_from_slice(&position.y.to_le_bytes());
            data[base + Z_OFFSET..base + Z_OFFSET + 4].copy_from_slice(&position.z.to_le_bytes());
            data[base + BLUE_OFFSET] = channel_to_u8(color[2]);
            data[base + GREEN_OFFSET] = channel_to_u8(color[1]);
            data[base + RED_OFFSET] = channel_to_u8(color[0]);
        }

        Ok(Self {
            header: Header::default(),
            height: 1,
            width,
            fields: standard_fields(),
            is_bigendian: false,
            point_step,
            row_step,
            data,
            is_dense: true,
        })
    }
}

fn channel_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Field table advertised alongside encoded payloads
pub fn standard_fields() -> Vec<PointField> {
    let float = |name: &str, offset: usize| PointField {
        name: name.to_string(),
        offset: offset as u32,
        datatype: DATATYPE_FLOAT32,
        count: 1,
    };
    vec![
        float("x", X_OFFSET),
        float("y", Y_OFFSET),
        float("z", Z_OFFSET),
        PointField {
            name: "rgb".to_string(),
            offset: BLUE_OFFSET as u32,
            datatype: DATATYPE_UINT8,
            count: 3,
        },
    ]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3Msg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuaternionMsg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for QuaternionMsg {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformMsg {
    pub translation: Vector3Msg,
    pub rotation: QuaternionMsg,
}

/// One parent to child transform; the parent frame is `header.frame_id`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: TransformMsg,
}

/// A batch of transforms as delivered on the static transform topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfMessage {
    pub transforms: Vec<TransformStamped>,
}
