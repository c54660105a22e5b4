//! Fanout - publish one post to many social platforms
//!
//! This library fans a single authored post out to every platform account
//! linked to it, records each platform's outcome on its own link, and derives
//! one post-level status from the collected results.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestrator;
pub mod platforms;
pub mod registry;
pub mod scheduling;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{FanoutError, Result};
pub use orchestrator::{PublishOrchestrator, RunReport};
pub use registry::AdapterRegistry;
pub use store::PostStore;
pub use types::{Credential, PlatformAccount, PlatformLink, Post, PostStatus, PublishOutcome};
