//! The duplication pipeline
//!
//! Copies posts from a source account to a target account:
//!
//! ```text
//! fetch source ─┐
//!               ├─► age filter ─► duplicate filter ─► publish ─► Vec<Outcome>
//! fetch target ─┘       (source only)   (against target)
//! ```
//!
//! Every stage is fail-open: a failed fetch yields no posts, a failed
//! publish becomes an [`Outcome::Failed`], and anything else that goes
//! wrong yields an empty result. [`Duplicator::duplicate`] never returns an
//! error.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::DuplicateConfig;
use crate::error::Result;
use crate::logging::RunLog;
use crate::sources::PostSource;
use crate::time::n_days_ago;
use crate::types::{Outcome, Post, TimelineQuery};

/// Runs the pipeline against one [`PostSource`]
#[derive(Clone)]
pub struct Duplicator {
    source: Arc<dyn PostSource>,
    log: RunLog,
}

impl Duplicator {
    pub fn new(source: Arc<dyn PostSource>, log: RunLog) -> Self {
        Self { source, log }
    }

    /// Copy eligible posts from `source_account` to `target_account`
    ///
    /// Fetches up to `limit` posts from each account, keeps source posts at
    /// least `delay_days` old that the target has not already posted, and
    /// publishes them in order. Returns one outcome per publish attempt.
    pub async fn duplicate(
        &self,
        source_account: &str,
        target_account: &str,
        limit: u32,
        delay_days: f64,
    ) -> Vec<Outcome> {
        let request = DuplicateConfig {
            source_account: source_account.to_string(),
            target_account: target_account.to_string(),
            limit,
            delay_days,
        };

        match self.try_duplicate(&request).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!("Duplication from {} failed: {}", source_account, e);
                self.log.error(&e).await;
                Vec::new()
            }
        }
    }

    async fn try_duplicate(&self, request: &DuplicateConfig) -> Result<Vec<Outcome>> {
        request.validate()?;

        let (source_posts, target_posts) = futures::join!(
            self.fetch_recent_posts(&request.source_account, request.limit),
            self.fetch_recent_posts(&request.target_account, request.limit),
        );

        let old_enough = eligible_by_age(source_posts, request.delay_days);
        let to_publish = remove_already_published(old_enough, &target_posts);

        if to_publish.is_empty() {
            info!("Nothing new to duplicate from {}", request.source_account);
            return Ok(Vec::new());
        }

        info!(
            "Duplicating {} post(s) from {} to {}",
            to_publish.len(),
            request.source_account,
            request.target_account
        );
        Ok(self.publish(to_publish).await)
    }

    /// Fetch the most recent posts of `account`, excluding replies
    ///
    /// Lookup and fetch failures are logged and produce an empty vector.
    pub async fn fetch_recent_posts(&self, account: &str, limit: u32) -> Vec<Post> {
        let result = async {
            let account_id = self.source.lookup_account_id(account).await?;
            self.source
                .fetch_timeline(&account_id, &TimelineQuery::recent(limit))
                .await
        }
        .await;

        match result {
            Ok(posts) => {
                let posts: Vec<Post> = posts.into_iter().filter(|p| !p.is_reply()).collect();
                debug!("Fetched {} post(s) from {}", posts.len(), account);
                posts
            }
            Err(e) => {
                warn!("Failed to fetch posts from {}: {}", account, e);
                self.log.error(&e).await;
                Vec::new()
            }
        }
    }

    /// Publish each post's display text in order
    ///
    /// A failure is recorded as [`Outcome::Failed`] and does not stop the
    /// remaining posts.
    pub async fn publish(&self, posts: Vec<Post>) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(posts.len());

        for post in posts {
            match self.source.publish_post(post.display_text()).await {
                Ok(published) => {
                    info!("Published {} as {}", post.id, published.id);
                    outcomes.push(Outcome::Published { post: published });
                }
                Err(e) => {
                    warn!("Failed to publish {}: {}", post.id, e);
                    self.log.error(&e).await;
                    outcomes.push(Outcome::Failed {
                        source_post: post,
                        error: e.to_string(),
                    });
                }
            }
        }

        outcomes
    }
}

/// Keep posts created at least `delay_days` ago
///
/// The cutoff is computed once, at call time.
pub fn eligible_by_age(posts: Vec<Post>, delay_days: f64) -> Vec<Post> {
    eligible_before(posts, n_days_ago(delay_days))
}

/// Keep posts created at or before `cutoff`
pub fn eligible_before(posts: Vec<Post>, cutoff: DateTime<Utc>) -> Vec<Post> {
    posts
        .into_iter()
        .filter(|post| post.created_at <= cutoff)
        .collect()
}

/// Drop candidates whose comparable text already appears on the target
///
/// A candidate is a duplicate when its comparable text is a substring of
/// any target post's display text. Surviving candidates keep their order.
pub fn remove_already_published(candidates: Vec<Post>, targets: &[Post]) -> Vec<Post> {
    candidates
        .into_iter()
        .filter(|candidate| {
            let needle = candidate.comparable_text();
            !targets
                .iter()
                .any(|target| target.display_text().contains(needle))
        })
        .collect()
}
