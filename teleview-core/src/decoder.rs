//! Decoding of point-cloud payloads into [`DecodedFrame`]s
//!
//! The producing sensor driver packs each point as:
//!
//! ```text
//! offset  0      4      8      12     16  17  18
//!         | x f32 | y f32 | z f32 | pad | B | G | R | pad ... point_step
//! ```
//!
//! Floats are little-endian. The color is three bytes in blue, green, red
//! order at a fixed offset of 16, independent of the advertised field table.

use crate::frame::DecodedFrame;
use crate::message::RawPointMessage;
use crate::point::{color_from_rgb8, Point3f};
use crate::{Error, Result};

pub const X_OFFSET: usize = 0;
pub const Y_OFFSET: usize = 4;
pub const Z_OFFSET: usize = 8;
pub const BLUE_OFFSET: usize = 16;
pub const GREEN_OFFSET: usize = 17;
pub const RED_OFFSET: usize = 18;

/// Smallest record that still contains every field the decoder reads
pub const MIN_POINT_STEP: usize = RED_OFFSET + 1;

/// Decode one point-cloud message.
///
/// Fails without side effects when `point_step` cannot hold a record or the
/// payload is not a whole number of records; callers keep their previous
/// frame in that case. An empty payload decodes to an empty frame.
pub fn decode_frame(raw: &RawPointMessage) -> Result<DecodedFrame> {
    let step = raw.point_step as usize;
    if step < MIN_POINT_STEP {
        return Err(Error::PointStepTooSmall { point_step: step, required: MIN_POINT_STEP });
    }
    if raw.data.len() % step != 0 {
        return Err(Error::PayloadNotAligned { len: raw.data.len(), point_step: step });
    }

    let mut frame = DecodedFrame::with_capacity(raw.data.len() / step);
    for record in raw.data.chunks_exact(step) {
        let position = Point3f::new(
            read_f32_le(record, X_OFFSET),
            read_f32_le(record, Y_OFFSET),
            read_f32_le(record, Z_OFFSET),
        );
        let color = color_from_rgb8(record[RED_OFFSET], record[GREEN_OFFSET], record[BLUE_OFFSET]);
        frame.push(position, color);
    }

    Ok(frame)
}

fn read_f32_le(record: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn synthetic_frame(n: usize) -> DecodedFrame {
        (0..n)
            .map(|i| {
                let f = i as f32;
                let position = Point3f::new(f * 0.5, -f, 1.0 + f * 0.25);
                let color = color_from_rgb8((i * 7 % 256) as u8, (i * 13 % 256) as u8, (i * 29 % 256) as u8);
                (position, color)
            })
            .collect()
    }

    #[test]
    fn test_decode_synthetic_payload() {
        let source = synthetic_frame(64);
        let msg = RawPointMessage::encode_points(&source, 32).unwrap();
        let decoded = decode_frame(&msg).unwrap();

        assert_eq!(decoded.len(), 64);
        for ((p, c), (sp, sc)) in decoded.iter().zip(source.iter()) {
            assert_relative_eq!(p.x, sp.x);
            assert_relative_eq!(p.y, sp.y);
            assert_relative_eq!(p.z, sp.z);
            for ch in 0..3 {
                assert_relative_eq!(c[ch], sc[ch], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_decode_is_deterministic() {
        let msg = RawPointMessage::encode_points(&synthetic_frame(100), 20).unwrap();
        let a = decode_frame(&msg).unwrap();
        let b = decode_frame(&msg).unwrap();
        let bits = |f: &DecodedFrame| -> Vec<u32> {
            f.iter()
                .flat_map(|(p, c)| [p.x, p.y, p.z, c[0], c[1], c[2]])
                .map(f32::to_bits)
                .collect()
        };
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_color_bytes_are_blue_green_red() {
        let mut data = vec![0u8; 20];
        data[16] = 10; // blue
        data[17] = 20; // green
        data[18] = 255; // red
        let msg = RawPointMessage { point_step: 20, width: 1, height: 1, row_step: 20, data, ..Default::default() };

        let frame = decode_frame(&msg).unwrap();
        assert_eq!(frame.colors()[0], [1.0, 20.0 / 255.0, 10.0 / 255.0]);
    }

    #[test]
    fn test_count_matches_payload_over_step() {
        for n in [0usize, 1, 3, 17] {
            let msg = RawPointMessage::encode_points(&synthetic_frame(n), 24).unwrap();
            assert_eq!(decode_frame(&msg).unwrap().len(), msg.data.len() / 24);
        }
    }

    #[test]
    fn test_misaligned_payload_is_rejected() {
        let msg = RawPointMessage { point_step: 20, data: vec![0; 41], ..Default::default() };
        assert!(matches!(
            decode_frame(&msg),
            Err(Error::PayloadNotAligned { len: 41, point_step: 20 })
        ));
    }

    #[test]
    fn test_short_point_step_is_rejected() {
        let msg = RawPointMessage { point_step: 16, data: vec![0; 17], ..Default::default() };
        assert!(matches!(decode_frame(&msg), Err(Error::PointStepTooSmall { point_step: 16, .. })));

        let msg = RawPointMessage { point_step: 0, data: vec![], ..Default::default() };
        assert!(decode_frame(&msg).is_err());
    }

    #[test]
    fn test_empty_payload_decodes_to_empty_frame() {
        let msg = RawPointMessage { point_step: 20, ..Default::default() };
        assert!(decode_frame(&msg).unwrap().is_empty());
    }
}
