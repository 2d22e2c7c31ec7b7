//! # teleview stream
//!
//! Everything between the pub/sub transport and the point sink: topic
//! subscription lifecycle, CDR decoding on the delivery context, the
//! tick-driven render step and the runtime controls exposed to a UI.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use teleview_stream::{LocalBus, Pipeline, StreamContext, ViewerConfig};
//! # use teleview_core::{DecodedFrame, Matrix4, PointSink};
//! # struct NullSink;
//! # impl PointSink for NullSink {
//! #     fn capacity(&self) -> usize { 10_000 }
//! #     fn upload(&mut self, _: &DecodedFrame) -> teleview_core::Result<()> { Ok(()) }
//! #     fn draw(&mut self, _: u32, _: f32, _: &Matrix4<f32>) -> teleview_core::Result<()> { Ok(()) }
//! # }
//!
//! fn example() -> teleview_core::Result<()> {
//!     let bus = Arc::new(LocalBus::new());
//!     let context = StreamContext::new(bus.clone());
//!     let mut pipeline = Pipeline::new(context, &ViewerConfig::default(), NullSink)?;
//!
//!     pipeline.set_topic(Some("/rgbd/point_cloud"))?;
//!     loop {
//!         pipeline.tick(Duration::from_millis(16))?;
//!     }
//! }
//! ```

pub mod transport;
pub mod codec;
pub mod context;
pub mod controller;
pub mod view;
pub mod pipeline;
pub mod persist;
pub mod config;

#[cfg(feature = "zenoh")]
pub mod zenoh_transport;

pub use transport::{LocalBus, MessageHandler, PubSub, SubscriptionId};
pub use context::{LinkStatus, StatusSnapshot, StreamContext};
pub use controller::{StreamController, StreamHandles};
pub use view::{PointCloudView, TickReport};
pub use pipeline::Pipeline;
pub use persist::TopicStore;
pub use config::ViewerConfig;

#[cfg(feature = "zenoh")]
pub use zenoh_transport::ZenohTransport;
