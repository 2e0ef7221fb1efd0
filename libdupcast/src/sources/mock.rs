//! Mock post source for testing
//!
//! This module provides a configurable in-memory source that can simulate
//! account timelines, lookup and fetch failures, and per-post publish
//! failures. It's designed for integration tests of the duplication
//! pipeline without credentials or network access.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Result, SourceError};
use crate::sources::PostSource;
use crate::types::{Post, PublishedPost, TimelineQuery};

/// Configuration for mock source behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Timelines keyed by account handle, newest first
    pub timelines: HashMap<String, Vec<Post>>,

    /// Handles whose lookup fails
    pub lookup_failures: HashSet<String>,

    /// Handles whose timeline fetch fails
    pub fetch_failures: HashSet<String>,

    /// Texts whose publish fails
    pub publish_failures: HashSet<String>,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    /// Number of times fetch_timeline has been called
    pub fetch_call_count: Arc<Mutex<usize>>,

    /// Queries passed to fetch_timeline, in call order
    pub fetch_queries: Arc<Mutex<Vec<(String, TimelineQuery)>>>,

    /// Texts that have been published (for verification)
    pub published_content: Arc<Mutex<Vec<String>>>,
}

/// Mock source for testing
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    config: MockConfig,
}

impl MockSource {
    /// Create a new mock source with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Add a timeline for `handle`
    pub fn with_timeline(mut self, handle: &str, posts: Vec<Post>) -> Self {
        self.config.timelines.insert(handle.to_string(), posts);
        self
    }

    /// Make account lookup fail for `handle`
    pub fn with_lookup_failure(mut self, handle: &str) -> Self {
        self.config.lookup_failures.insert(handle.to_string());
        self
    }

    /// Make timeline fetches fail for `handle`
    pub fn with_fetch_failure(mut self, handle: &str) -> Self {
        self.config.fetch_failures.insert(handle.to_string());
        self
    }

    /// Make publishing `text` fail
    pub fn with_publish_failure(mut self, text: &str) -> Self {
        self.config.publish_failures.insert(text.to_string());
        self
    }

    /// Delay every operation by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    /// Get the number of times fetch_timeline was called
    pub fn fetch_call_count(&self) -> usize {
        *self.config.fetch_call_count.lock().unwrap()
    }

    /// Get the queries passed to fetch_timeline
    pub fn fetch_queries(&self) -> Vec<(String, TimelineQuery)> {
        self.config.fetch_queries.lock().unwrap().clone()
    }

    /// Get all content that was published
    pub fn published_content(&self) -> Vec<String> {
        self.config.published_content.lock().unwrap().clone()
    }

    async fn simulate_latency(&self) {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
    }
}

/// Account ids handed out by the mock are the handle behind an `id:` prefix
fn account_id(handle: &str) -> String {
    format!("id:{}", handle)
}

#[async_trait]
impl PostSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn lookup_account_id(&self, handle: &str) -> Result<String> {
        self.simulate_latency().await;

        if self.config.lookup_failures.contains(handle)
            || !self.config.timelines.contains_key(handle)
        {
            return Err(SourceError::Lookup(format!("No account named {}", handle)).into());
        }

        Ok(account_id(handle))
    }

    async fn fetch_timeline(&self, account_id: &str, query: &TimelineQuery) -> Result<Vec<Post>> {
        *self.config.fetch_call_count.lock().unwrap() += 1;
        self.simulate_latency().await;

        let handle = account_id.strip_prefix("id:").unwrap_or(account_id);
        self.config
            .fetch_queries
            .lock()
            .unwrap()
            .push((handle.to_string(), query.clone()));

        if self.config.fetch_failures.contains(handle) {
            return Err(SourceError::Fetch(format!("Mock fetch failed for {}", handle)).into());
        }

        let posts = self
            .config
            .timelines
            .get(handle)
            .ok_or_else(|| SourceError::Fetch(format!("Unknown account id {}", account_id)))?;

        Ok(posts
            .iter()
            .filter(|post| !(query.exclude_replies && post.is_reply()))
            .take(query.count as usize)
            .cloned()
            .collect())
    }

    async fn publish_post(&self, text: &str) -> Result<PublishedPost> {
        self.simulate_latency().await;

        if self.config.publish_failures.contains(text) {
            return Err(SourceError::Publish(format!("Mock publish rejected: {}", text)).into());
        }

        self.config
            .published_content
            .lock()
            .unwrap()
            .push(text.to_string());

        Ok(PublishedPost {
            id: format!("mock-{}", uuid::Uuid::new_v4()),
            text: text.to_string(),
            created_at: Utc::now(),
            url: None,
        })
    }
}
