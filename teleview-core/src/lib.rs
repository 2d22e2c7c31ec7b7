//! Core data structures and pipeline stages for teleview
//!
//! This crate holds everything on the CPU side of the point-cloud pipeline:
//! the wire messages, the frame decoder, the latest-wins frame handoff, the
//! capture-once static transform cache and the depth/stride filter.

pub mod point;
pub mod frame;
pub mod message;
pub mod decoder;
pub mod frame_box;
pub mod transform;
pub mod transform_cache;
pub mod config;
pub mod filter;
pub mod traits;
pub mod error;

pub use point::*;
pub use frame::*;
pub use message::*;
pub use decoder::*;
pub use frame_box::*;
pub use transform::*;
pub use transform_cache::*;
pub use config::*;
pub use filter::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
