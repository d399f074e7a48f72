//! Knowledge entity types
//!
//! Entities are nodes in the per-user knowledge graph, extracted from saved
//! posts through LLM-based entity extraction. Each entity carries a canonical
//! name used as its deduplication key.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A deduplicated named entity scoped to one user
///
/// At most one entity exists per (user, canonical name, type). The display
/// name keeps the casing of the first mention; the mention count grows by
/// one for every extraction that resolves to the same canonical key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for the entity
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Human-readable name (first-seen spelling)
    pub name: String,
    /// Normalized name used for deduplication
    pub canonical_name: String,
    /// Type of entity
    pub entity_type: EntityType,
    /// Optional one-sentence description
    pub description: Option<String>,
    /// Number of extractions that resolved to this entity
    pub mention_count: i64,
    /// When the entity was created
    pub created_at: DateTime<Utc>,
    /// When the entity was last updated
    pub updated_at: DateTime<Utc>,
}

/// Types of extracted entities
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Named individual (including post authors)
    Person,
    /// Company, organization, or startup
    Company,
    /// Business concept, strategy, or theme
    Topic,
    /// Specific technology, tool, framework, or platform
    Technology,
}

impl EntityType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Company => "company",
            Self::Topic => "topic",
            Self::Technology => "technology",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "person" => Some(Self::Person),
            "company" => Some(Self::Company),
            "topic" => Some(Self::Topic),
            "technology" => Some(Self::Technology),
            _ => None,
        }
    }

    /// Get all entity types
    pub fn all() -> &'static [EntityType] {
        &[Self::Person, Self::Company, Self::Topic, Self::Technology]
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counts of entities grouped by type
pub type CountsByType = BTreeMap<EntityType, u64>;

/// A candidate entity produced by extraction, before dedup against the store
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEntity {
    /// Entity name as extracted
    pub name: String,
    /// Type of entity
    pub entity_type: EntityType,
    /// Optional one-sentence description
    pub description: Option<String>,
}

/// Trailing legal-entity suffixes stripped during canonicalization,
/// longest first so "corp" wins over "co"
const ENTITY_SUFFIXES: [&str; 5] = ["corp", "inc", "llc", "ltd", "co"];

/// Canonicalize an entity name for deduplication
///
/// Lowercases, trims, normalizes curly apostrophes, collapses whitespace
/// runs, then strips a leading "the " and a trailing legal-entity suffix
/// (", Inc", " Corp.", etc.). Stripping can expose another prefix or
/// suffix, so it repeats until the value is stable; the result is
/// idempotent for every input, including the degenerate empty string.
pub fn canonicalize(name: &str) -> String {
    let mut current = normalize(name);

    loop {
        let mut next = match current.strip_prefix("the ") {
            Some(rest) => rest.to_string(),
            None => current.clone(),
        };

        if let Some(stripped) = strip_entity_suffix(&next) {
            next = stripped;
        }

        if next == current {
            return current;
        }
        current = next;
    }
}

/// Lowercase, straighten apostrophes, and collapse whitespace
fn normalize(name: &str) -> String {
    name.to_lowercase()
        .replace(['\u{2018}', '\u{2019}'], "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip one trailing legal-entity suffix, with its optional leading comma
/// and optional trailing period; returns `None` when nothing matched
fn strip_entity_suffix(name: &str) -> Option<String> {
    let base = name.strip_suffix('.').unwrap_or(name);

    for suffix in ENTITY_SUFFIXES {
        if let Some(rest) = base.strip_suffix(suffix) {
            let rest = rest.trim_end();
            let rest = rest.strip_suffix(',').unwrap_or(rest);
            return Some(rest.trim_end().to_string());
        }
    }
    None
}
