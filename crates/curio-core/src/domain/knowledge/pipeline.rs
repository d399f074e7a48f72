//! Extraction pipeline orchestration
//!
//! Runs the per-post flow: extract candidates, merge them into the entity
//! table, link evidence, bump co-occurrence edges, record status. Also
//! exposes the backfill operation that scans a user's posts and processes
//! only those not yet completed.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::post::{Post, PostFilters, PostRepository};
use crate::error::Result;

use super::extractor::EntityExtractor;
use super::repository::{DEFAULT_LINK_CONFIDENCE, ExtractionOutcome, KnowledgeRepository};

/// Orchestrates entity extraction for posts
///
/// There is no in-progress state and no per-post lock: re-running
/// extraction for the same post is safe because every store operation is
/// an idempotent upsert. Concurrent runs for one post may double-count
/// mention and weight increments, which is accepted.
pub struct ExtractionPipeline<K, P> {
    extractor: EntityExtractor,
    knowledge: Arc<K>,
    posts: Arc<P>,
}

impl<K, P> Clone for ExtractionPipeline<K, P> {
    fn clone(&self) -> Self {
        Self {
            extractor: self.extractor.clone(),
            knowledge: Arc::clone(&self.knowledge),
            posts: Arc::clone(&self.posts),
        }
    }
}

impl<K, P> ExtractionPipeline<K, P>
where
    K: KnowledgeRepository,
    P: PostRepository,
{
    /// Create a new extraction pipeline
    pub fn new(extractor: EntityExtractor, knowledge: Arc<K>, posts: Arc<P>) -> Self {
        Self {
            extractor,
            knowledge,
            posts,
        }
    }

    /// Process a single post, recording completed or failed status
    ///
    /// Never returns an error and never panics the calling task: any
    /// failure inside the pipeline is recorded on the post's status row
    /// and swallowed, so a fire-and-forget caller cannot crash.
    pub async fn process_post(&self, post: &Post) {
        if let Err(err) = self.run_extraction(post).await {
            warn!(post_id = %post.id, error = %err, "Entity extraction failed");
            if let Err(status_err) = self
                .knowledge
                .record_status(&post.id, ExtractionOutcome::Failed, Some(&err.to_string()))
                .await
            {
                error!(
                    post_id = %post.id,
                    error = %status_err,
                    "Failed to record extraction status"
                );
            }
        }
    }

    /// The fallible extraction flow for one post
    async fn run_extraction(&self, post: &Post) -> Result<()> {
        let candidates = self
            .extractor
            .extract(&post.content, post.author_name.as_deref())
            .await?;

        if candidates.is_empty() {
            // Zero entities is a valid, successful outcome
            self.knowledge
                .record_status(&post.id, ExtractionOutcome::Completed, None)
                .await?;
            return Ok(());
        }

        // Order preserved; candidates canonicalizing identically resolve to
        // the same id and both stay in the list
        let mut entity_ids = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let entity_id = self
                .knowledge
                .upsert_entity(
                    &post.user_id,
                    &candidate.name,
                    candidate.entity_type,
                    candidate.description.as_deref(),
                )
                .await?;

            self.knowledge
                .link_post_to_entity(&entity_id, &post.id, DEFAULT_LINK_CONFIDENCE)
                .await?;

            entity_ids.push(entity_id);
        }

        // One bump per unordered pair occurrence, self-pairs excluded
        for i in 0..entity_ids.len() {
            for j in (i + 1)..entity_ids.len() {
                if entity_ids[i] != entity_ids[j] {
                    self.knowledge
                        .bump_edge(&post.user_id, &entity_ids[i], &entity_ids[j])
                        .await?;
                }
            }
        }

        self.knowledge
            .record_status(&post.id, ExtractionOutcome::Completed, None)
            .await?;

        info!(
            post_id = %post.id,
            entity_count = entity_ids.len(),
            "Post entities processed"
        );

        Ok(())
    }

    /// Process all of a user's posts that have not completed extraction
    ///
    /// Posts whose last attempt failed, and posts never attempted, are
    /// both retried; only `completed` posts are skipped.
    pub async fn backfill(&self, user_id: &str) -> Result<BackfillReport> {
        let posts = self.posts.list(user_id, &PostFilters::default()).await?;
        let completed = self.knowledge.completed_post_ids(user_id).await?;

        let mut report = BackfillReport::default();

        for post in &posts {
            if completed.contains(&post.id) {
                report.skipped += 1;
                continue;
            }

            self.process_post(post).await;
            report.processed += 1;
        }

        info!(
            user_id = %user_id,
            processed = report.processed,
            failed = report.failed,
            skipped = report.skipped,
            "Backfill finished"
        );

        Ok(report)
    }
}

impl<K, P> ExtractionPipeline<K, P>
where
    K: KnowledgeRepository + 'static,
    P: PostRepository + 'static,
{
    /// Dispatch processing of a post as a detached background task
    ///
    /// Used by the post-creation path so saving a post returns immediately
    /// while extraction proceeds with its own error handling.
    pub fn spawn_process_post(&self, post: Post) {
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.process_post(&post).await;
        });
    }
}

/// Counters returned by a backfill run
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BackfillReport {
    /// Posts passed to extraction during this run
    pub processed: u64,
    /// Posts whose processing itself returned an error to the backfill loop
    pub failed: u64,
    /// Posts skipped because extraction already completed
    pub skipped: u64,
}
