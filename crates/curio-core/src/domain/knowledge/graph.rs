//! Read-only projections over the knowledge graph
//!
//! Shapes the entity and edge tables into the payloads the display layer
//! renders: the full per-user graph, a single entity with its evidence and
//! neighbors, and aggregate counts.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::post::{Post, PostRepository};
use crate::error::Result;

use super::entity::{CountsByType, Entity, EntityType};
use super::repository::KnowledgeRepository;

/// Read-only query service over the knowledge graph tables
pub struct GraphQueryService<K, P> {
    knowledge: Arc<K>,
    posts: Arc<P>,
}

impl<K, P> GraphQueryService<K, P>
where
    K: KnowledgeRepository,
    P: PostRepository,
{
    /// Create a new graph query service
    pub fn new(knowledge: Arc<K>, posts: Arc<P>) -> Self {
        Self { knowledge, posts }
    }

    /// Get a user's full graph: every entity as a node, every edge as a link
    ///
    /// Full scan per call; no filtering or pagination.
    pub async fn get_graph(&self, user_id: &str) -> Result<KnowledgeGraph> {
        let entities = self.knowledge.entities_for_user(user_id).await?;
        let edges = self.knowledge.edges_for_user(user_id).await?;

        let nodes = entities
            .into_iter()
            .map(|entity| GraphNode {
                id: entity.id,
                name: entity.name,
                entity_type: entity.entity_type,
                description: entity.description,
                mention_count: entity.mention_count,
            })
            .collect();

        let links = edges
            .into_iter()
            .map(|edge| GraphLink {
                source: edge.source_entity_id,
                target: edge.target_entity_id,
                weight: edge.weight,
                relation_type: edge.relation_type,
            })
            .collect();

        Ok(KnowledgeGraph { nodes, links })
    }

    /// Get one entity with its originating posts and connected entities
    ///
    /// Returns `None` when the entity is missing or owned by another user.
    pub async fn get_entity_detail(
        &self,
        user_id: &str,
        entity_id: &str,
    ) -> Result<Option<EntityDetail>> {
        let Some(entity) = self.knowledge.entity(user_id, entity_id).await? else {
            return Ok(None);
        };

        let post_ids = self.knowledge.post_ids_for_entity(entity_id).await?;
        let posts = self.posts.get_many(&post_ids).await?;

        let edges = self
            .knowledge
            .edges_touching_entity(user_id, entity_id)
            .await?;

        let mut connected = Vec::with_capacity(edges.len());
        for edge in &edges {
            let other_id = if edge.source_entity_id == entity_id {
                &edge.target_entity_id
            } else {
                &edge.source_entity_id
            };

            if let Some(other) = self.knowledge.entity(user_id, other_id).await? {
                connected.push(ConnectedEntity {
                    id: other.id,
                    name: other.name,
                    entity_type: other.entity_type,
                    weight: edge.weight,
                });
            }
        }

        Ok(Some(EntityDetail {
            entity,
            posts,
            connected,
        }))
    }

    /// Get aggregate counts for a user's graph
    ///
    /// A post that failed extraction counts as pending, consistent with
    /// backfill retrying it.
    pub async fn get_stats(&self, user_id: &str) -> Result<GraphStats> {
        let total_entities = self.knowledge.count_entities(user_id).await?;
        let total_edges = self.knowledge.count_edges(user_id).await?;
        let completed = self.knowledge.completed_post_count(user_id).await?;
        let total_posts = self.posts.count_for_user(user_id).await?;
        let by_type = self.knowledge.count_entities_by_type(user_id).await?;

        Ok(GraphStats {
            total_entities,
            total_edges,
            total_posts_processed: completed,
            total_posts_pending: total_posts.saturating_sub(completed),
            by_type,
        })
    }
}

/// A user's full knowledge graph
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeGraph {
    /// Every entity owned by the user
    pub nodes: Vec<GraphNode>,
    /// Every co-occurrence edge owned by the user
    pub links: Vec<GraphLink>,
}

/// An entity projected for graph display
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    /// Entity id
    pub id: String,
    /// Display name
    pub name: String,
    /// Entity type
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Optional description
    pub description: Option<String>,
    /// Number of mentions across posts
    pub mention_count: i64,
}

/// An edge projected for graph display
#[derive(Debug, Clone, Serialize)]
pub struct GraphLink {
    /// Source entity id
    pub source: String,
    /// Target entity id
    pub target: String,
    /// Co-occurrence count
    pub weight: i64,
    /// Relation type
    pub relation_type: String,
}

/// An entity with its evidence posts and direct neighbors
#[derive(Debug, Clone, Serialize)]
pub struct EntityDetail {
    /// The entity itself
    pub entity: Entity,
    /// Posts the entity was extracted from
    pub posts: Vec<Post>,
    /// Directly connected entities with their edge weights
    pub connected: Vec<ConnectedEntity>,
}

/// A neighbor entity and the weight of the connecting edge
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedEntity {
    /// Entity id
    pub id: String,
    /// Display name
    pub name: String,
    /// Entity type
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Weight of the edge to the queried entity
    pub weight: i64,
}

/// Aggregate counts over a user's graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    /// Entities owned by the user
    pub total_entities: u64,
    /// Edges owned by the user
    pub total_edges: u64,
    /// Posts whose extraction completed
    pub total_posts_processed: u64,
    /// Posts not yet completed (never attempted or failed)
    pub total_posts_pending: u64,
    /// Entity counts grouped by type
    pub by_type: CountsByType,
}
