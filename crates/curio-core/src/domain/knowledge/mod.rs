//! Knowledge graph domain module
//!
//! Builds a per-user graph of people, companies, topics, and technologies
//! mentioned across saved posts:
//!
//! - **Entity extraction**: an LLM pulls typed entities out of post text
//! - **Canonical dedup**: normalized names merge repeat mentions into one
//!   entity per (user, canonical name, type)
//! - **Co-occurrence edges**: entities mentioned in the same post are
//!   connected by weighted undirected edges
//! - **Status tracking**: a per-post status row makes backfill idempotent
//!
//! ## Data flow
//!
//! ```text
//! Post saved → ExtractionPipeline::process_post
//!            → EntityExtractor::extract (LLM)
//!            → KnowledgeRepository::upsert_entity / link_post_to_entity
//!            → KnowledgeRepository::bump_edge (pairwise)
//!            → KnowledgeRepository::record_status
//! ```
//!
//! The `GraphQueryService` reads the same tables for display. Correctness
//! under concurrent extraction rests on the unique indexes over
//! (user, canonical name, type), (entity, post), and (user, source, target),
//! plus database-side increments for mention counts and edge weights.

mod entity;
mod extractor;
mod graph;
mod pipeline;
mod repository;

pub use entity::{CandidateEntity, CountsByType, Entity, EntityType, canonicalize};
pub use extractor::EntityExtractor;
pub use graph::{
    ConnectedEntity, EntityDetail, GraphLink, GraphNode, GraphQueryService, GraphStats,
    KnowledgeGraph,
};
pub use pipeline::{BackfillReport, ExtractionPipeline};
pub use repository::{
    CO_OCCURRENCE, DEFAULT_LINK_CONFIDENCE, EntityEdge, ExtractionOutcome, ExtractionStatus,
    KnowledgeRepository,
};
