//! zenoh-backed [`PubSub`] using the ROS 2 bridge key convention

use crate::transport::{MessageHandler, PubSub, SubscriptionId};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use teleview_core::{Error, Result};
use tracing::{debug, info};
use zenoh::pubsub::Subscriber;
use zenoh::{Config, Session, Wait};

/// Map a ROS topic to its zenoh key: `/a/b` becomes `rt/a/b`
pub fn topic_to_key(topic: &str) -> String {
    format!("rt/{}", topic.trim_start_matches('/'))
}

/// Build a session config from a mode (`peer` or `client`) and endpoint lists
pub fn session_config(mode: &str, connect: &[String], listen: &[String]) -> Result<Config> {
    let mut config = Config::default();
    insert(&mut config, "mode", json!(mode))?;
    if !connect.is_empty() {
        insert(&mut config, "connect/endpoints", json!(connect))?;
    }
    if !listen.is_empty() {
        insert(&mut config, "listen/endpoints", json!(listen))?;
    }
    Ok(config)
}

fn insert(config: &mut Config, key: &str, value: serde_json::Value) -> Result<()> {
    config
        .insert_json5(key, &value.to_string())
        .map_err(|e| Error::Transport(format!("zenoh config {}: {}", key, e)))
}

/// Handlers run on zenoh's callback threads
pub struct ZenohTransport {
    session: Session,
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber<()>>>,
    next_id: AtomicU64,
}

impl ZenohTransport {
    pub fn open(config: Config) -> Result<Self> {
        let session = zenoh::open(config)
            .wait()
            .map_err(|e| Error::Transport(format!("failed to open zenoh session: {}", e)))?;
        info!("zenoh session {} open", session.zid());
        Ok(Self {
            session,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Put a raw payload on `topic`
    pub fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.session
            .put(topic_to_key(topic), payload)
            .wait()
            .map_err(|e| Error::Transport(e.to_string()))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Subscriber<()>>> {
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PubSub for ZenohTransport {
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<SubscriptionId> {
        if topic.is_empty() {
            return Err(Error::Transport("cannot subscribe to an empty topic".to_string()));
        }
        let key = topic_to_key(topic);
        let subscriber = self
            .session
            .declare_subscriber(key.as_str())
            .callback(move |sample| handler(&sample.payload().to_bytes()))
            .wait()
            .map_err(|e| Error::Transport(format!("subscribe {}: {}", key, e)))?;

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, subscriber);
        debug!("declared subscriber on {}", key);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let Some(subscriber) = self.lock().remove(&id) else {
            return Ok(());
        };
        subscriber.undeclare().wait().map_err(|e| Error::Transport(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        !self.session.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_to_key() {
        assert_eq!(topic_to_key("/rgbd/point_cloud"), "rt/rgbd/point_cloud");
        assert_eq!(topic_to_key("tf_static"), "rt/tf_static");
    }

    #[test]
    fn test_session_config_accepts_endpoints() {
        let config = session_config("client", &["tcp/127.0.0.1:7447".to_string()], &[]);
        assert!(config.is_ok());
    }
}
