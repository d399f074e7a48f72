//! SQLite implementation of the CollectionRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::collection::{Collection, CollectionRepository, CollectionSummary};
use crate::error::Result;

/// SQLite implementation of the collection repository
#[derive(Clone)]
pub struct SqliteCollectionRepository {
    pool: SqlitePool,
}

impl SqliteCollectionRepository {
    /// Create a new SQLite collection repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollectionRepository for SqliteCollectionRepository {
    async fn save(&self, collection: &Collection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collections (id, user_id, name, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&collection.id)
        .bind(&collection.user_id)
        .bind(&collection.name)
        .bind(&collection.description)
        .bind(collection.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(collection_id = %collection.id, "Collection saved");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Collection>> {
        let row: Option<CollectionRow> =
            sqlx::query_as("SELECT * FROM collections WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(CollectionRow::into_collection))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<CollectionSummary>> {
        let rows: Vec<CollectionCountRow> = sqlx::query_as(
            r#"
            SELECT c.*, COUNT(pc.post_id) AS post_count
            FROM collections c
            LEFT JOIN post_collections pc ON c.id = pc.collection_id
            WHERE c.user_id = ?
            GROUP BY c.id
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CollectionCountRow::into_summary).collect())
    }

    async fn update(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Collection>> {
        let Some(mut collection) = self.get(id).await? else {
            return Ok(None);
        };

        if let Some(name) = name {
            collection.name = name.to_string();
        }
        if let Some(description) = description {
            collection.description = Some(description.to_string());
        }

        sqlx::query("UPDATE collections SET name = ?, description = ? WHERE id = ?")
            .bind(&collection.name)
            .bind(&collection.description)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(Some(collection))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_post(&self, collection_id: &str, post_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO post_collections (post_id, collection_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(post_id, collection_id) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(collection_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(collection_id = %collection_id, post_id = %post_id, "Post added to collection");
        Ok(())
    }

    async fn remove_post(&self, collection_id: &str, post_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM post_collections WHERE collection_id = ? AND post_id = ?",
        )
        .bind(collection_id)
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn post_ids_in(&self, collection_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT pc.post_id FROM post_collections pc
            JOIN posts p ON p.id = pc.post_id
            WHERE pc.collection_id = ?
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn collection_ids_for_post(&self, post_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT collection_id FROM post_collections WHERE post_id = ?")
                .bind(post_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

// ========== Database Row Types ==========

#[derive(Debug, FromRow)]
struct CollectionRow {
    id: String,
    user_id: String,
    name: String,
    description: Option<String>,
    created_at: String,
}

impl CollectionRow {
    fn into_collection(self) -> Collection {
        Collection {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            created_at: parse_timestamp(&self.created_at),
        }
    }
}

#[derive(Debug, FromRow)]
struct CollectionCountRow {
    id: String,
    user_id: String,
    name: String,
    description: Option<String>,
    created_at: String,
    post_count: i64,
}

impl CollectionCountRow {
    fn into_summary(self) -> CollectionSummary {
        CollectionSummary {
            collection: Collection {
                id: self.id,
                user_id: self.user_id,
                name: self.name,
                description: self.description,
                created_at: parse_timestamp(&self.created_at),
            },
            post_count: self.post_count as u64,
        }
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
