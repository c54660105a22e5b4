//! Mock platform adapter for testing
//!
//! Simulates successes, failures, slow platforms and crashing adapters
//! without network access. Call counters are shared between clones of a
//! [`MockConfig`], so a test can register a factory with the registry and
//! still observe how many times the orchestrator called `publish`.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::PlatformAdapter;
use crate::registry::AdapterFactory;
use crate::types::{Credential, Metrics, PublishOutcome};

/// What `publish` does when called
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Return `Success` with this platform post id
    Succeed(String),
    /// Return `Failure` with this reason
    Fail(String),
    /// Panic inside `publish`, simulating an adapter bug
    Panic(String),
}

/// Configuration for mock adapter behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name (e.g., "mock-a")
    pub name: String,

    pub behavior: MockBehavior,

    /// Whether authentication should succeed
    pub auth_succeeds: bool,

    /// Media reference required to publish
    pub requires_media: bool,

    /// Delay before completing publish (simulates network latency)
    pub delay: Duration,

    /// Returned from `fetch_analytics`; `None` makes it fail
    pub metrics: Option<Metrics>,

    /// Number of times publish has been called
    pub publish_call_count: Arc<Mutex<usize>>,

    /// Content of every publish call (for verification)
    pub published_content: Arc<Mutex<Vec<String>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            behavior: MockBehavior::Succeed("mock-post-1".to_string()),
            auth_succeeds: true,
            requires_media: false,
            delay: Duration::from_millis(0),
            metrics: Some(Metrics::new()),
            publish_call_count: Arc::new(Mutex::new(0)),
            published_content: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockConfig {
    /// Mock that always succeeds with `platform_post_id`
    pub fn success(name: &str, platform_post_id: &str) -> Self {
        Self {
            name: name.to_string(),
            behavior: MockBehavior::Succeed(platform_post_id.to_string()),
            ..Default::default()
        }
    }

    /// Mock that always reports a failure
    pub fn failure(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            behavior: MockBehavior::Fail(reason.to_string()),
            ..Default::default()
        }
    }

    /// Mock whose publish panics
    pub fn panicking(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            behavior: MockBehavior::Panic(message.to_string()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requiring_media(mut self) -> Self {
        self.requires_media = true;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Number of publish calls made so far across every adapter built from this config
    pub fn publish_calls(&self) -> usize {
        *self.publish_call_count.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn published(&self) -> Vec<String> {
        self.published_content
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Registry factory producing adapters that share this config's counters
    pub fn factory(&self) -> AdapterFactory {
        let config = self.clone();
        Arc::new(move |_credential: &Credential| {
            Box::new(MockAdapter::new(config.clone())) as Box<dyn PlatformAdapter>
        })
    }
}

/// Mock adapter for testing
pub struct MockAdapter {
    config: MockConfig,
}

impl MockAdapter {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn authenticate(&self) -> bool {
        self.config.auth_succeeds
    }

    async fn publish(&self, content: &str, media_url: Option<&str>) -> PublishOutcome {
        if self.config.requires_media && media_url.is_none() {
            // Rejected before anything resembling a network call
            return PublishOutcome::failure(format!("{} requires a media_url", self.config.name));
        }

        {
            let mut count = self
                .config
                .publish_call_count
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            *count += 1;
        }
        self.config
            .published_content
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(content.to_string());

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        match &self.config.behavior {
            MockBehavior::Succeed(id) => PublishOutcome::success(id.clone()),
            MockBehavior::Fail(reason) => PublishOutcome::failure(reason.clone()),
            MockBehavior::Panic(message) => panic!("{}", message),
        }
    }

    async fn fetch_analytics(&self) -> Result<Metrics> {
        self.config.metrics.clone().ok_or_else(|| {
            PlatformError::Network(format!("{} analytics unavailable", self.config.name)).into()
        })
    }
}
