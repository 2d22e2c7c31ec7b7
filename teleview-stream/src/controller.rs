//! Topic subscription lifecycle and frame ingestion

use crate::codec;
use crate::context::{LinkStatus, StreamContext};
use crate::transport::{MessageHandler, SubscriptionId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use teleview_core::{decode_frame, DecodedFrame, FrameBox, FramePair, Result, StaticTransformCache, TransformRecord};
use tracing::{debug, info, warn};

/// Default topic carrying the static transform batches
pub const DEFAULT_TRANSFORM_TOPIC: &str = "/tf_static";

/// Ingestion state shared with delivery callbacks.
///
/// `gate` holds the generation of the live subscription (0 when closed).
/// Generations are never reused. A callback publishes only while holding the
/// gate and only if its own generation is still current, so nothing lands
/// in the frame box after `close_gate` returns.
#[derive(Debug)]
struct Ingest {
    frame_box: Arc<FrameBox>,
    enabled: Arc<AtomicBool>,
    gate: Mutex<u64>,
    issued: AtomicU64,
}

impl Ingest {
    fn gate(&self) -> MutexGuard<'_, u64> {
        self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open_gate(&self) -> u64 {
        let generation = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        *self.gate() = generation;
        generation
    }

    fn close_gate(&self) {
        let mut gate = self.gate();
        *gate = 0;
        // anything published before the gate closed belongs to the old topic
        self.frame_box.take_if_present();
    }

    fn is_open_for(&self, generation: u64) -> bool {
        *self.gate() == generation
    }

    fn publish_if_current(&self, generation: u64, frame: DecodedFrame) -> bool {
        let gate = self.gate();
        if *gate != generation {
            return false;
        }
        self.frame_box.publish(frame);
        true
    }
}

/// Handles the render side needs from a controller
#[derive(Debug, Clone)]
pub struct StreamHandles {
    pub frame_box: Arc<FrameBox>,
    pub transform_cache: Arc<StaticTransformCache>,
    enabled: Arc<AtomicBool>,
}

impl StreamHandles {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

/// Owns the point-cloud subscription and feeds decoded frames into a
/// [`FrameBox`].
///
/// Payloads are CDR-decoded and converted to frames on the transport's
/// delivery context; the render loop only ever sees finished frames.
pub struct StreamController {
    context: StreamContext,
    ingest: Arc<Ingest>,
    transform_cache: Arc<StaticTransformCache>,
    topic: Option<String>,
    subscription: Option<SubscriptionId>,
    transform_topic: String,
    transform_subscription: Option<SubscriptionId>,
}

impl StreamController {
    pub fn new(context: StreamContext, transform_target: FramePair, transform_topic: impl Into<String>) -> Self {
        Self {
            context,
            ingest: Arc::new(Ingest {
                frame_box: Arc::new(FrameBox::new()),
                enabled: Arc::new(AtomicBool::new(true)),
                gate: Mutex::new(0),
                issued: AtomicU64::new(0),
            }),
            transform_cache: Arc::new(StaticTransformCache::new(transform_target)),
            topic: None,
            subscription: None,
            transform_topic: transform_topic.into(),
            transform_subscription: None,
        }
    }

    /// Subscribe to the static transform topic. Idempotent; the subscription
    /// stays up for the controller's lifetime even after capture.
    pub fn start_transform_capture(&mut self) -> Result<()> {
        if self.transform_subscription.is_some() {
            return Ok(());
        }

        let cache = Arc::clone(&self.transform_cache);
        let status = Arc::clone(self.context.status());
        let handler: MessageHandler = Arc::new(move |payload: &[u8]| {
            if cache.is_captured() {
                return;
            }
            match codec::decode_transforms(payload) {
                Ok(msg) => {
                    status.record_transform_batch();
                    let batch: Vec<TransformRecord> = msg.transforms.iter().map(TransformRecord::from).collect();
                    cache.on_transform_batch(&batch);
                }
                Err(e) => warn!("dropping transform batch: {}", e),
            }
        });

        let id = self.context.transport().subscribe(&self.transform_topic, handler)?;
        self.transform_subscription = Some(id);
        info!(
            "waiting for {} -> {} on {}",
            self.transform_cache.target().parent,
            self.transform_cache.target().child,
            self.transform_topic
        );
        Ok(())
    }

    /// Subscribe to `topic`.
    ///
    /// Returns `Ok(false)` without doing anything when the stream is
    /// disabled, when `topic` is empty or when it is already the live
    /// subscription. A different live topic is dropped first.
    pub fn subscribe(&mut self, topic: &str) -> Result<bool> {
        if !self.is_enabled() {
            debug!("stream disabled, not subscribing to {}", topic);
            return Ok(false);
        }
        if topic.is_empty() {
            return Ok(false);
        }
        if self.subscription.is_some() && self.topic.as_deref() == Some(topic) {
            return Ok(false);
        }
        self.unsubscribe()?;

        let generation = self.ingest.open_gate();
        let handler = point_cloud_handler(
            Arc::clone(&self.ingest),
            Arc::clone(self.context.status()),
            topic.to_string(),
            generation,
        );

        match self.context.transport().subscribe(topic, handler) {
            Ok(id) => {
                self.subscription = Some(id);
                self.topic = Some(topic.to_string());
                info!("subscribed to {}", topic);
                Ok(true)
            }
            Err(e) => {
                self.ingest.close_gate();
                Err(e)
            }
        }
    }

    /// Drop the live subscription, if any. The topic is remembered so that
    /// re-enabling resubscribes it.
    pub fn unsubscribe(&mut self) -> Result<()> {
        self.ingest.close_gate();
        if let Some(id) = self.subscription.take() {
            self.context.transport().unsubscribe(id)?;
            if let Some(topic) = &self.topic {
                info!("unsubscribed from {}", topic);
            }
        }
        Ok(())
    }

    /// Switch to `topic`. `None` or an empty name unsubscribes and disables
    /// the stream; any other name re-enables it and subscribes.
    pub fn set_topic(&mut self, topic: Option<&str>) -> Result<()> {
        self.unsubscribe()?;
        match topic.filter(|t| !t.is_empty()) {
            None => {
                self.topic = None;
                self.ingest.enabled.store(false, Ordering::Release);
                info!("point cloud display disabled");
                Ok(())
            }
            Some(topic) => {
                self.topic = Some(topic.to_string());
                self.ingest.enabled.store(true, Ordering::Release);
                self.subscribe(topic).map(|_| ())
            }
        }
    }

    /// Flip the enabled flag; disabling unsubscribes, enabling resubscribes
    /// the remembered topic. Returns the new state.
    pub fn toggle_enabled(&mut self) -> Result<bool> {
        let enabled = !self.is_enabled();
        self.ingest.enabled.store(enabled, Ordering::Release);
        if enabled {
            if let Some(topic) = self.topic.clone() {
                self.subscribe(&topic)?;
            }
        } else {
            self.unsubscribe()?;
        }
        Ok(enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.ingest.enabled.load(Ordering::Acquire)
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Current (or remembered) point-cloud topic
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn transform_topic(&self) -> &str {
        &self.transform_topic
    }

    pub fn transform_cache(&self) -> &Arc<StaticTransformCache> {
        &self.transform_cache
    }

    pub fn frame_box(&self) -> &Arc<FrameBox> {
        &self.ingest.frame_box
    }

    pub fn context(&self) -> &StreamContext {
        &self.context
    }

    pub fn handles(&self) -> StreamHandles {
        StreamHandles {
            frame_box: Arc::clone(&self.ingest.frame_box),
            transform_cache: Arc::clone(&self.transform_cache),
            enabled: Arc::clone(&self.ingest.enabled),
        }
    }
}

fn point_cloud_handler(ingest: Arc<Ingest>, status: Arc<LinkStatus>, topic: String, generation: u64) -> MessageHandler {
    Arc::new(move |payload: &[u8]| {
        if !ingest.is_open_for(generation) {
            status.record_late();
            return;
        }
        status.record_received();

        match ingest_payload(payload) {
            Ok(Some(frame)) => {
                let points = frame.len();
                if ingest.publish_if_current(generation, frame) {
                    status.record_published();
                    debug!("{}: published {} points", topic, points);
                } else {
                    status.record_late();
                }
            }
            Ok(None) => debug!("{}: empty point cloud", topic),
            Err(e) => {
                status.record_malformed();
                warn!("{}: dropping point cloud: {}", topic, e);
            }
        }
    })
}

/// CDR payload to frame; `None` for an empty cloud.
fn ingest_payload(payload: &[u8]) -> Result<Option<DecodedFrame>> {
    let raw = codec::decode_point_cloud(payload)?;
    if raw.data.is_empty() {
        return Ok(None);
    }
    if !raw.is_consistent() {
        debug!(
            "row_step {} x height {} disagrees with {} payload bytes",
            raw.row_step,
            raw.height,
            raw.data.len()
        );
    }
    decode_frame(&raw).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LocalBus, PubSub};
    use teleview_core::{Point3f, RawPointMessage};

    fn setup() -> (Arc<LocalBus>, StreamController) {
        let bus = Arc::new(LocalBus::new());
        let controller = StreamController::new(
            StreamContext::new(bus.clone()),
            FramePair::default(),
            DEFAULT_TRANSFORM_TOPIC,
        );
        (bus, controller)
    }

    fn cloud_payload(z: f32) -> Vec<u8> {
        let mut frame = DecodedFrame::new();
        frame.push(Point3f::new(0.0, 0.0, z), [1.0, 0.0, 0.0]);
        codec::encode_point_cloud(&RawPointMessage::encode_points(&frame, 20).unwrap()).unwrap()
    }

    #[test]
    fn test_same_topic_resubscribe_is_noop() {
        let (bus, mut controller) = setup();
        assert!(controller.subscribe("/cloud").unwrap());
        assert!(!controller.subscribe("/cloud").unwrap());
        assert_eq!(bus.subscriber_count("/cloud"), 1);
    }

    #[test]
    fn test_subscribe_switches_topics() {
        let (bus, mut controller) = setup();
        controller.subscribe("/a").unwrap();
        controller.subscribe("/b").unwrap();
        assert_eq!(bus.subscriber_count("/a"), 0);
        assert_eq!(bus.subscriber_count("/b"), 1);
        assert_eq!(controller.topic(), Some("/b"));
    }

    #[test]
    fn test_subscribe_while_disabled_is_rejected() {
        let (bus, mut controller) = setup();
        controller.toggle_enabled().unwrap();
        assert!(!controller.subscribe("/cloud").unwrap());
        assert_eq!(bus.subscriber_count("/cloud"), 0);
    }

    #[test]
    fn test_set_topic_none_disables() {
        let (bus, mut controller) = setup();
        controller.set_topic(Some("/cloud")).unwrap();
        controller.set_topic(None).unwrap();
        assert!(!controller.is_enabled());
        assert!(controller.topic().is_none());
        assert_eq!(bus.subscriber_count("/cloud"), 0);

        controller.set_topic(Some("")).unwrap();
        assert!(!controller.is_subscribed());
    }

    #[test]
    fn test_set_topic_reenables() {
        let (bus, mut controller) = setup();
        controller.set_topic(None).unwrap();
        controller.set_topic(Some("/cloud")).unwrap();
        assert!(controller.is_enabled());
        assert_eq!(bus.subscriber_count("/cloud"), 1);
    }

    #[test]
    fn test_toggle_round_trip_resubscribes() {
        let (bus, mut controller) = setup();
        controller.set_topic(Some("/cloud")).unwrap();

        assert!(!controller.toggle_enabled().unwrap());
        assert_eq!(bus.subscriber_count("/cloud"), 0);
        assert_eq!(controller.topic(), Some("/cloud"));

        assert!(controller.toggle_enabled().unwrap());
        assert_eq!(bus.subscriber_count("/cloud"), 1);
    }

    #[test]
    fn test_delivery_publishes_decoded_frame() {
        let (bus, mut controller) = setup();
        controller.subscribe("/cloud").unwrap();
        bus.publish("/cloud", &cloud_payload(2.5));

        let frame = controller.frame_box().take_if_present().unwrap();
        assert_eq!(frame.positions()[0].z, 2.5);
        assert_eq!(controller.context().status().snapshot().published, 1);
    }

    #[test]
    fn test_malformed_delivery_keeps_previous_frame_state() {
        let (bus, mut controller) = setup();
        controller.subscribe("/cloud").unwrap();
        bus.publish("/cloud", &cloud_payload(1.0));

        let bad = RawPointMessage { point_step: 20, data: vec![0; 30], ..Default::default() };
        bus.publish("/cloud", &codec::encode_point_cloud(&bad).unwrap());
        bus.publish("/cloud", &[0xde, 0xad]);

        let frame = controller.frame_box().take_if_present().unwrap();
        assert_eq!(frame.positions()[0].z, 1.0);
        assert_eq!(controller.context().status().snapshot().malformed, 2);
    }

    #[test]
    fn test_handler_kept_past_unsubscribe_cannot_publish() {
        let (_bus, mut controller) = setup();
        let bus = Arc::new(LocalBus::new());
        // a transport that still holds the handler after unsubscribe
        let generation = controller.ingest.open_gate();
        let handler = point_cloud_handler(
            Arc::clone(&controller.ingest),
            Arc::clone(controller.context().status()),
            "/cloud".to_string(),
            generation,
        );
        bus.subscribe("/cloud", handler).unwrap();

        controller.unsubscribe().unwrap();
        bus.publish("/cloud", &cloud_payload(1.0));

        assert!(controller.frame_box().take_if_present().is_none());
        assert_eq!(controller.context().status().snapshot().late, 1);
    }

    #[test]
    fn test_stale_handler_stays_closed_after_resubscribe() {
        let (bus, mut controller) = setup();
        controller.subscribe("/a").unwrap();
        let stale_generation = *controller.ingest.gate();
        let stale = point_cloud_handler(
            Arc::clone(&controller.ingest),
            Arc::clone(controller.context().status()),
            "/a".to_string(),
            stale_generation,
        );

        controller.unsubscribe().unwrap();
        controller.subscribe("/a").unwrap();
        stale(&cloud_payload(3.0));
        assert!(controller.frame_box().take_if_present().is_none());

        bus.publish("/a", &cloud_payload(4.0));
        assert_eq!(controller.frame_box().take_if_present().unwrap().positions()[0].z, 4.0);
    }

    #[test]
    fn test_transform_capture_ignores_later_batches() {
        use teleview_core::{TfMessage, TransformStamped};

        let (bus, mut controller) = setup();
        controller.start_transform_capture().unwrap();
        controller.start_transform_capture().unwrap();
        assert_eq!(bus.subscriber_count(DEFAULT_TRANSFORM_TOPIC), 1);

        let stamped = |parent: &str, child: &str, x: f64| {
            let mut t = TransformStamped::default();
            t.header.frame_id = parent.to_string();
            t.child_frame_id = child.to_string();
            t.transform.translation.x = x;
            t
        };
        let first = TfMessage {
            transforms: vec![stamped("base_link", "camera_link", 7.0), stamped("camera_link", "camera_color_frame", 0.1)],
        };
        let second = TfMessage { transforms: vec![stamped("camera_link", "camera_color_frame", 0.9)] };

        bus.publish(DEFAULT_TRANSFORM_TOPIC, &codec::encode_transforms(&first).unwrap());
        bus.publish(DEFAULT_TRANSFORM_TOPIC, &codec::encode_transforms(&second).unwrap());

        let captured = controller.transform_cache().get().unwrap();
        assert_eq!(captured.translation.x, 0.1);
        // still subscribed after capture
        assert_eq!(bus.subscriber_count(DEFAULT_TRANSFORM_TOPIC), 1);
    }
}
