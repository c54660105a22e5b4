//! Progress events for publish runs
//!
//! The orchestrator emits events on a `tokio::sync::broadcast` channel so
//! the CLI, the daemon, or tests can follow a run without coupling to it.
//! If nobody is subscribed, events are dropped immediately; lagging
//! subscribers miss the oldest events rather than blocking the run.
//!
//! # Example
//!
//! ```no_run
//! use libfanout::events::{Event, EventBus};
//!
//! # async fn example() {
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(Event::RunStarted {
//!     post_id: "abc123".to_string(),
//!     links: 2,
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::PostStatus;

pub type EventReceiver = broadcast::Receiver<Event>;

/// Default per-subscriber buffer
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Events emitted while a post is being fanned out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Run began; `links` is the number of links that will be attempted
    RunStarted { post_id: String, links: usize },

    LinkPublished {
        post_id: String,
        link_id: String,
        platform: String,
        platform_post_id: String,
    },

    LinkFailed {
        post_id: String,
        link_id: String,
        platform: String,
        reason: String,
    },

    /// All attempts joined and the post status was derived
    RunCompleted {
        post_id: String,
        status: PostStatus,
        published: usize,
        failed: usize,
    },
}
