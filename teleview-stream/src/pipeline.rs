//! Assembled controller plus view with the runtime controls a UI drives

use crate::config::ViewerConfig;
use crate::context::{StatusSnapshot, StreamContext};
use crate::controller::StreamController;
use crate::persist::TopicStore;
use crate::view::{PointCloudView, TickReport};
use std::time::Duration;
use teleview_core::{PointSink, RenderConfig, Result};
use tracing::{info, warn};

pub struct Pipeline<S: PointSink> {
    controller: StreamController,
    view: PointCloudView<S>,
    store: Option<TopicStore>,
}

impl<S: PointSink> Pipeline<S> {
    /// Build the controller and view and start transform capture.
    ///
    /// No point-cloud topic is subscribed until [`Pipeline::set_topic`] or
    /// [`Pipeline::restore_topic`] is called.
    pub fn new(context: StreamContext, config: &ViewerConfig, sink: S) -> Result<Self> {
        let mut controller =
            StreamController::new(context, config.frame_pair.clone(), config.transform_topic.clone());
        let view = PointCloudView::new(controller.handles(), config.render.clone(), config.correction.clone(), sink)?;
        controller.start_transform_capture()?;

        Ok(Self {
            controller,
            view,
            store: config.state_file.as_ref().map(TopicStore::new),
        })
    }

    /// Subscribe the persisted topic, falling back to the configured one
    pub fn restore_topic(&mut self, configured: Option<&str>) -> Result<Option<String>> {
        let stored = match &self.store {
            Some(store) => store.load().unwrap_or_else(|e| {
                warn!("ignoring unreadable topic state {}: {}", store.path().display(), e);
                None
            }),
            None => None,
        };
        let topic = stored.or_else(|| configured.map(str::to_string));
        if let Some(topic) = &topic {
            info!("restoring point topic {}", topic);
            self.controller.set_topic(Some(topic))?;
        }
        Ok(topic)
    }

    /// Switch topic and persist the choice; `None` disables the stream
    pub fn set_topic(&mut self, topic: Option<&str>) -> Result<()> {
        self.controller.set_topic(topic)?;
        if let Some(store) = &self.store {
            store.save(self.controller.topic())?;
        }
        Ok(())
    }

    pub fn toggle_enabled(&mut self) -> Result<bool> {
        self.controller.toggle_enabled()
    }

    pub fn set_density(&mut self, density: f32) {
        self.view.set_density(density);
    }

    pub fn set_point_size(&mut self, size: f32) -> Result<()> {
        self.view.set_point_size(size)
    }

    pub fn tick(&mut self, delta: Duration) -> Result<TickReport> {
        self.view.tick(delta)
    }

    pub fn is_enabled(&self) -> bool {
        self.controller.is_enabled()
    }

    pub fn topic(&self) -> Option<&str> {
        self.controller.topic()
    }

    pub fn render_config(&self) -> &RenderConfig {
        self.view.config()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.controller.context().poll_connection();
        self.controller.context().status().snapshot()
    }

    pub fn controller(&self) -> &StreamController {
        &self.controller
    }

    pub fn view(&self) -> &PointCloudView<S> {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut PointCloudView<S> {
        &mut self.view
    }
}
