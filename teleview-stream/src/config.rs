//! Viewer configuration loaded from JSON

use crate::controller::DEFAULT_TRANSFORM_TOPIC;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use teleview_core::{FrameCorrection, FramePair, RenderConfig, Result};

/// Everything needed to assemble a [`Pipeline`](crate::Pipeline).
///
/// Missing keys fall back to their defaults, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Point-cloud topic to subscribe at startup; overridden by the topic store
    pub point_topic: Option<String>,
    pub transform_topic: String,
    pub frame_pair: FramePair,
    pub render: RenderConfig,
    pub correction: FrameCorrection,
    /// Where the last selected topic is persisted
    pub state_file: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            point_topic: None,
            transform_topic: DEFAULT_TRANSFORM_TOPIC.to_string(),
            frame_pair: FramePair::default(),
            render: RenderConfig::default(),
            correction: FrameCorrection::ros_display(),
            state_file: None,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ViewerConfig = serde_json::from_str(json)?;
        config.render.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
