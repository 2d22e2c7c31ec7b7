//! Last selected point-cloud topic, persisted across runs

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use teleview_core::Result;
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TopicState {
    point_topic: Option<String>,
}

/// JSON file holding `{"point_topic": "..."}`
#[derive(Debug, Clone)]
pub struct TopicStore {
    path: PathBuf,
}

impl TopicStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored topic, or `None` when the file is missing or holds no topic
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let state: TopicState = serde_json::from_str(&std::fs::read_to_string(&self.path)?)?;
        Ok(state.point_topic.filter(|t| !t.is_empty()))
    }

    /// Write the topic to a sibling temp file, then rename it into place
    pub fn save(&self, topic: Option<&str>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let state = TopicState { point_topic: topic.map(str::to_string) };
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("saved point topic {:?} to {}", topic, self.path.display());
        Ok(())
    }
}
