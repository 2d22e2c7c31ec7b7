//! CDR encoding of the wire messages

use teleview_core::{Error, RawPointMessage, Result, TfMessage};

/// Decode a little- or big-endian CDR `PointCloud2` payload
pub fn decode_point_cloud(payload: &[u8]) -> Result<RawPointMessage> {
    cdr::deserialize::<RawPointMessage>(payload).map_err(|e| Error::Codec(e.to_string()))
}

pub fn encode_point_cloud(msg: &RawPointMessage) -> Result<Vec<u8>> {
    cdr::serialize::<_, _, cdr::CdrLe>(msg, cdr::Infinite).map_err(|e| Error::Codec(e.to_string()))
}

/// Decode a CDR `TFMessage` payload
pub fn decode_transforms(payload: &[u8]) -> Result<TfMessage> {
    cdr::deserialize::<TfMessage>(payload).map_err(|e| Error::Codec(e.to_string()))
}

pub fn encode_transforms(msg: &TfMessage) -> Result<Vec<u8>> {
    cdr::serialize::<_, _, cdr::CdrLe>(msg, cdr::Infinite).map_err(|e| Error::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use teleview_core::{DecodedFrame, Point3f, TransformStamped};

    #[test]
    fn test_point_cloud_survives_cdr() {
        let mut frame = DecodedFrame::new();
        frame.push(Point3f::new(0.0, 1.0, 2.0), [0.0, 1.0, 0.0]);
        let mut msg = RawPointMessage::encode_points(&frame, 20).unwrap();
        msg.header.frame_id = "camera_color_frame".to_string();

        let decoded = decode_point_cloud(&encode_point_cloud(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_truncated_payload_is_a_codec_error() {
        let msg = RawPointMessage::encode_points(&DecodedFrame::new(), 20).unwrap();
        let bytes = encode_point_cloud(&msg).unwrap();
        let err = decode_point_cloud(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
        assert!(err.is_malformed_frame());
    }

    #[test]
    fn test_transform_batch_survives_cdr() {
        let mut stamped = TransformStamped::default();
        stamped.header.frame_id = "camera_link".to_string();
        stamped.child_frame_id = "camera_color_frame".to_string();
        stamped.transform.translation.y = -0.015;
        let msg = TfMessage { transforms: vec![stamped] };

        let decoded = decode_transforms(&encode_transforms(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }
}
