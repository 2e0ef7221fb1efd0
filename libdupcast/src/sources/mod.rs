//! Post source abstraction and implementations
//!
//! A [`PostSource`] is the capability the duplication pipeline depends on:
//! resolving account handles, reading timelines, and publishing posts.
//! Authentication, transport, and rate limiting live behind this trait.
//!
//! # Examples
//!
//! ```no_run
//! use libdupcast::sources::{PostSource, mastodon::MastodonSource};
//! use libdupcast::types::TimelineQuery;
//!
//! # async fn example() -> libdupcast::error::Result<()> {
//! let source = MastodonSource::new(
//!     "https://mastodon.social".to_string(),
//!     "your-access-token".to_string(),
//! )?;
//!
//! let id = source.lookup_account_id("paceaux").await?;
//! let posts = source.fetch_timeline(&id, &TimelineQuery::recent(20)).await?;
//! println!("Fetched {} posts from {}", posts.len(), source.name());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Post, PublishedPost, TimelineQuery};

pub mod mastodon;

// Mock source is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Capability boundary for reading and writing posts on a platform
///
/// One instance is constructed per process and shared between runs.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Lowercase identifier for the platform (e.g., "mastodon")
    fn name(&self) -> &str;

    /// Resolve an account handle to the platform's opaque account id
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Lookup` if no such account exists, or a
    /// transport-level `SourceError` if the request fails.
    async fn lookup_account_id(&self, handle: &str) -> Result<String>;

    /// Fetch the most recent posts of an account, newest first
    ///
    /// `query.count` bounds the request; fewer posts may come back.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Fetch` (or a transport-level `SourceError`)
    /// if the timeline cannot be retrieved.
    async fn fetch_timeline(&self, account_id: &str, query: &TimelineQuery) -> Result<Vec<Post>>;

    /// Publish `text` as a new post from the authenticated account
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Publish` (or a transport-level `SourceError`)
    /// if the platform rejects the post.
    async fn publish_post(&self, text: &str) -> Result<PublishedPost>;
}
