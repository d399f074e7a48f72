//! SQLite implementation of the KnowledgeRepository
//!
//! Every mutation is a single-statement upsert so concurrent extraction
//! runs cannot observe partial state for one row: the unique indexes on
//! entities, links, and edges turn duplicate inserts into merges, and
//! mention counts / edge weights increment inside the database.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::knowledge::{
    CO_OCCURRENCE, CountsByType, Entity, EntityEdge, EntityType, ExtractionOutcome,
    ExtractionStatus, KnowledgeRepository, canonicalize,
};
use crate::error::{Error, Result};

/// SQLite implementation of the knowledge graph repository
#[derive(Clone)]
pub struct SqliteKnowledgeRepository {
    pool: SqlitePool,
}

impl SqliteKnowledgeRepository {
    /// Create a new SQLite knowledge repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeRepository for SqliteKnowledgeRepository {
    // ========== Write Operations ==========

    async fn upsert_entity(
        &self,
        user_id: &str,
        name: &str,
        entity_type: EntityType,
        description: Option<&str>,
    ) -> Result<String> {
        let canonical = canonicalize(name);
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let description = description.map(str::trim).filter(|d| !d.is_empty());

        // On conflict the increment and the longer-description rule run
        // inside the database, and RETURNING yields the surviving row's id
        let entity_id: String = sqlx::query_scalar(
            r#"
            INSERT INTO entities (
                id, user_id, name, canonical_name, entity_type,
                description, mention_count, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
            ON CONFLICT(user_id, canonical_name, entity_type) DO UPDATE SET
                mention_count = mention_count + 1,
                description = CASE
                    WHEN excluded.description IS NOT NULL
                     AND length(excluded.description) > length(coalesce(entities.description, ''))
                    THEN excluded.description
                    ELSE entities.description
                END,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(name)
        .bind(&canonical)
        .bind(entity_type.as_str())
        .bind(description)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            entity_id = %entity_id,
            canonical_name = %canonical,
            entity_type = %entity_type,
            "Entity upserted"
        );
        Ok(entity_id)
    }

    async fn link_post_to_entity(
        &self,
        entity_id: &str,
        post_id: &str,
        confidence: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entity_links (entity_id, post_id, confidence, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(entity_id, post_id) DO NOTHING
            "#,
        )
        .bind(entity_id)
        .bind(post_id)
        .bind(confidence)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(entity_id = %entity_id, post_id = %post_id, "Post-entity link recorded");
        Ok(())
    }

    async fn bump_edge(&self, user_id: &str, entity_a: &str, entity_b: &str) -> Result<()> {
        // Canonical ordering: each unordered pair maps to one row
        let (source_id, target_id) = if entity_a <= entity_b {
            (entity_a, entity_b)
        } else {
            (entity_b, entity_a)
        };

        sqlx::query(
            r#"
            INSERT INTO entity_edges (
                id, user_id, source_entity_id, target_entity_id,
                relation_type, weight, created_at
            ) VALUES (?, ?, ?, ?, ?, 1, ?)
            ON CONFLICT(user_id, source_entity_id, target_entity_id) DO UPDATE SET
                weight = weight + 1
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(source_id)
        .bind(target_id)
        .bind(CO_OCCURRENCE)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(source = %source_id, target = %target_id, "Edge bumped");
        Ok(())
    }

    async fn record_status(
        &self,
        post_id: &str,
        outcome: ExtractionOutcome,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO extraction_status (post_id, status, processed_at, error)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(post_id) DO UPDATE SET
                status = excluded.status,
                processed_at = excluded.processed_at,
                error = excluded.error
            "#,
        )
        .bind(post_id)
        .bind(outcome.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(error)
        .execute(&self.pool)
        .await?;

        debug!(post_id = %post_id, outcome = %outcome, "Extraction status recorded");
        Ok(())
    }

    // ========== Read Operations ==========

    async fn entity(&self, user_id: &str, entity_id: &str) -> Result<Option<Entity>> {
        let row: Option<EntityRow> =
            sqlx::query_as("SELECT * FROM entities WHERE id = ? AND user_id = ?")
                .bind(entity_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.into_entity()).transpose()
    }

    async fn entities_for_user(&self, user_id: &str) -> Result<Vec<Entity>> {
        let rows: Vec<EntityRow> = sqlx::query_as(
            "SELECT * FROM entities WHERE user_id = ? ORDER BY mention_count DESC, name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_entity()).collect()
    }

    async fn edges_for_user(&self, user_id: &str) -> Result<Vec<EntityEdge>> {
        let rows: Vec<EdgeRow> = sqlx::query_as(
            "SELECT * FROM entity_edges WHERE user_id = ? ORDER BY weight DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EdgeRow::into_edge).collect())
    }

    async fn edges_touching_entity(
        &self,
        user_id: &str,
        entity_id: &str,
    ) -> Result<Vec<EntityEdge>> {
        let rows: Vec<EdgeRow> = sqlx::query_as(
            r#"
            SELECT * FROM entity_edges
            WHERE user_id = ? AND (source_entity_id = ? OR target_entity_id = ?)
            ORDER BY weight DESC
            "#,
        )
        .bind(user_id)
        .bind(entity_id)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EdgeRow::into_edge).collect())
    }

    async fn post_ids_for_entity(&self, entity_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT post_id FROM entity_links WHERE entity_id = ? ORDER BY created_at DESC",
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn extraction_status(&self, post_id: &str) -> Result<Option<ExtractionStatus>> {
        let row: Option<StatusRow> =
            sqlx::query_as("SELECT * FROM extraction_status WHERE post_id = ?")
                .bind(post_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.into_status()).transpose()
    }

    async fn completed_post_ids(&self, user_id: &str) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT es.post_id FROM extraction_status es
            JOIN posts p ON p.id = es.post_id
            WHERE p.user_id = ? AND es.status = 'completed'
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn completed_post_count(&self, user_id: &str) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM extraction_status es
            JOIN posts p ON p.id = es.post_id
            WHERE p.user_id = ? AND es.status = 'completed'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn count_entities(&self, user_id: &str) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM entities WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn count_edges(&self, user_id: &str) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM entity_edges WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn count_entities_by_type(&self, user_id: &str) -> Result<CountsByType> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT entity_type, COUNT(*) FROM entities WHERE user_id = ? GROUP BY entity_type",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(t, c)| EntityType::parse(&t).map(|et| (et, c as u64)))
            .collect())
    }
}

// ========== Database Row Types ==========

#[derive(Debug, FromRow)]
struct EntityRow {
    id: String,
    user_id: String,
    name: String,
    canonical_name: String,
    entity_type: String,
    description: Option<String>,
    mention_count: i64,
    created_at: String,
    updated_at: String,
}

impl EntityRow {
    fn into_entity(self) -> Result<Entity> {
        let entity_type = EntityType::parse(&self.entity_type)
            .ok_or_else(|| Error::Other(format!("Invalid entity type: {}", self.entity_type)))?;

        Ok(Entity {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            canonical_name: self.canonical_name,
            entity_type,
            description: self.description,
            mention_count: self.mention_count,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

#[derive(Debug, FromRow)]
struct EdgeRow {
    id: String,
    user_id: String,
    source_entity_id: String,
    target_entity_id: String,
    relation_type: String,
    weight: i64,
    #[allow(dead_code)]
    created_at: String,
}

impl EdgeRow {
    fn into_edge(self) -> EntityEdge {
        EntityEdge {
            id: self.id,
            user_id: self.user_id,
            source_entity_id: self.source_entity_id,
            target_entity_id: self.target_entity_id,
            relation_type: self.relation_type,
            weight: self.weight,
        }
    }
}

#[derive(Debug, FromRow)]
struct StatusRow {
    post_id: String,
    status: String,
    processed_at: String,
    error: Option<String>,
}

impl StatusRow {
    fn into_status(self) -> Result<ExtractionStatus> {
        let outcome = ExtractionOutcome::parse(&self.status)
            .ok_or_else(|| Error::Other(format!("Invalid extraction status: {}", self.status)))?;

        Ok(ExtractionStatus {
            post_id: self.post_id,
            outcome,
            processed_at: parse_timestamp(&self.processed_at),
            error: self.error,
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
