//! Repository trait for knowledge graph persistence
//!
//! Defines the storage operations the extraction pipeline and the graph
//! query service depend on. All mutations are single-row upserts that stay
//! race-safe through the table uniqueness constraints; mention counts and
//! edge weights are incremented database-side, never read-modify-write in
//! application code.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::entity::{CountsByType, Entity, EntityType};

/// Confidence recorded on post-entity links (currently always full)
pub const DEFAULT_LINK_CONFIDENCE: f64 = 1.0;

/// Relation type recorded on co-occurrence edges
pub const CO_OCCURRENCE: &str = "co-occurrence";

/// Repository trait for knowledge graph persistence
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    // ========== Write Operations ==========

    /// Create or merge an entity, returning its id
    ///
    /// Canonicalizes `name` and upserts on (user, canonical name, type):
    /// a new row starts with mention count 1; an existing row has its
    /// mention count incremented and its description replaced only when the
    /// new one is non-empty and strictly longer.
    async fn upsert_entity(
        &self,
        user_id: &str,
        name: &str,
        entity_type: EntityType,
        description: Option<&str>,
    ) -> Result<String>;

    /// Record that an entity was mentioned in a post
    ///
    /// Idempotent: a duplicate (entity, post) pair is silently ignored.
    async fn link_post_to_entity(
        &self,
        entity_id: &str,
        post_id: &str,
        confidence: f64,
    ) -> Result<()>;

    /// Increment the co-occurrence edge between two entities
    ///
    /// The pair is ordered (min, max) before writing so both argument
    /// orders hit the same row. Creates the edge with weight 1 on first
    /// co-occurrence, increments by 1 afterwards.
    async fn bump_edge(&self, user_id: &str, entity_a: &str, entity_b: &str) -> Result<()>;

    /// Upsert the extraction status row for a post
    async fn record_status(
        &self,
        post_id: &str,
        outcome: ExtractionOutcome,
        error: Option<&str>,
    ) -> Result<()>;

    // ========== Read Operations ==========

    /// Get an entity owned by a user
    async fn entity(&self, user_id: &str, entity_id: &str) -> Result<Option<Entity>>;

    /// List all entities owned by a user
    async fn entities_for_user(&self, user_id: &str) -> Result<Vec<Entity>>;

    /// List all edges owned by a user
    async fn edges_for_user(&self, user_id: &str) -> Result<Vec<EntityEdge>>;

    /// List edges with the given entity at either end
    async fn edges_touching_entity(
        &self,
        user_id: &str,
        entity_id: &str,
    ) -> Result<Vec<EntityEdge>>;

    /// List ids of posts linked to an entity
    async fn post_ids_for_entity(&self, entity_id: &str) -> Result<Vec<String>>;

    /// Get the extraction status row for a post, if any
    async fn extraction_status(&self, post_id: &str) -> Result<Option<ExtractionStatus>>;

    /// Ids of a user's posts whose extraction completed
    async fn completed_post_ids(&self, user_id: &str) -> Result<HashSet<String>>;

    /// Number of a user's posts whose extraction completed
    async fn completed_post_count(&self, user_id: &str) -> Result<u64>;

    /// Count entities owned by a user
    async fn count_entities(&self, user_id: &str) -> Result<u64>;

    /// Count edges owned by a user
    async fn count_edges(&self, user_id: &str) -> Result<u64>;

    /// Count a user's entities grouped by type
    async fn count_entities_by_type(&self, user_id: &str) -> Result<CountsByType>;
}

/// Undirected co-occurrence edge between two entities
///
/// Stored with `source_entity_id < target_entity_id` so each unordered
/// pair has exactly one row per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEdge {
    /// Unique identifier for the edge
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Lesser entity id of the pair
    pub source_entity_id: String,
    /// Greater entity id of the pair
    pub target_entity_id: String,
    /// Relation type (currently always co-occurrence)
    pub relation_type: String,
    /// Number of posts in which the pair co-occurred
    pub weight: i64,
}

/// Outcome of an extraction attempt for a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionOutcome {
    /// Extraction ran to completion (zero entities is still completed)
    Completed,
    /// Extraction raised an error; eligible for backfill retry
    Failed,
}

impl ExtractionOutcome {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExtractionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-post record of the last extraction attempt
///
/// A post with no row has never been attempted and is eligible for
/// backfill, as is a post whose last attempt failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionStatus {
    /// The post this status belongs to
    pub post_id: String,
    /// Outcome of the last attempt
    pub outcome: ExtractionOutcome,
    /// When the last attempt finished
    pub processed_at: DateTime<Utc>,
    /// Stringified error from a failed attempt
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_round_trip() {
        assert_eq!(
            ExtractionOutcome::parse("completed"),
            Some(ExtractionOutcome::Completed)
        );
        assert_eq!(
            ExtractionOutcome::parse("failed"),
            Some(ExtractionOutcome::Failed)
        );
        assert_eq!(ExtractionOutcome::parse("pending"), None);
        assert_eq!(ExtractionOutcome::Completed.as_str(), "completed");
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(ExtractionOutcome::Failed.to_string(), "failed");
    }
}
