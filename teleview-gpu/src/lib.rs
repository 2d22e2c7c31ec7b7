//! # teleview GPU
//!
//! Device-resident point storage and the instanced point-quad draw path.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use teleview_core::{DecodedFrame, Matrix4, PointSink};
//! use teleview_gpu::GpuPointRenderer;
//!
//! async fn example() -> teleview_core::Result<()> {
//!     let mut renderer = GpuPointRenderer::new_headless(640, 480, 10_000).await?;
//!
//!     let frame = DecodedFrame::new();
//!     renderer.upload(&frame)?;
//!     renderer.draw(frame.len() as u32, 1.0, &Matrix4::identity())?;
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod buffer;
pub mod renderer;

// Re-export commonly used items
pub use device::GpuContext;
pub use buffer::{GpuPointBuffer, PointUniforms, QUAD_CORNERS, QUAD_INDICES};
pub use renderer::{default_view_proj, GpuPointRenderer, OffscreenTarget};
