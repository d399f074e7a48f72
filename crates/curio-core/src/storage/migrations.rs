//! Database migrations
//!
//! This module manages SQLite schema migrations for curio.
//! Migrations are versioned and applied automatically on database connection.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Posts and collections
const MIGRATION_V1: &str = r#"
    -- Saved posts
    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        original_url TEXT,
        content TEXT NOT NULL,
        summary TEXT,
        platform TEXT NOT NULL DEFAULT 'linkedin',
        author_name TEXT,
        author_url TEXT,
        image_url TEXT,
        published_at TIMESTAMP,
        tags TEXT NOT NULL DEFAULT '[]',
        is_favorite INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts(user_id);
    CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at);
    CREATE INDEX IF NOT EXISTS idx_posts_original_url ON posts(user_id, original_url);

    -- Collections of posts
    CREATE TABLE IF NOT EXISTS collections (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_collections_user_id ON collections(user_id);

    -- Post membership in collections
    CREATE TABLE IF NOT EXISTS post_collections (
        post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        collection_id TEXT NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (post_id, collection_id)
    );

    CREATE INDEX IF NOT EXISTS idx_post_collections_collection ON post_collections(collection_id);
"#;

/// Migration 2: Knowledge graph tables
const MIGRATION_V2: &str = r#"
    -- Deduplicated named entities, scoped per user
    CREATE TABLE IF NOT EXISTS entities (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        canonical_name TEXT NOT NULL,
        entity_type TEXT NOT NULL CHECK (entity_type IN ('person', 'company', 'topic', 'technology')),
        description TEXT,
        mention_count INTEGER NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    -- Dedup key: one entity per (user, canonical name, type)
    CREATE UNIQUE INDEX IF NOT EXISTS idx_entities_dedup
        ON entities(user_id, canonical_name, entity_type);
    CREATE INDEX IF NOT EXISTS idx_entities_user_id ON entities(user_id);

    -- Evidence that an entity was mentioned in a specific post
    CREATE TABLE IF NOT EXISTS entity_links (
        entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
        post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        confidence REAL NOT NULL DEFAULT 1.0,
        context TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (entity_id, post_id)
    );

    CREATE INDEX IF NOT EXISTS idx_entity_links_post_id ON entity_links(post_id);

    -- Undirected co-occurrence edges, stored with source_entity_id < target_entity_id
    CREATE TABLE IF NOT EXISTS entity_edges (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        source_entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
        target_entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
        relation_type TEXT NOT NULL DEFAULT 'co-occurrence',
        weight INTEGER NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_entity_edges_pair
        ON entity_edges(user_id, source_entity_id, target_entity_id);
    CREATE INDEX IF NOT EXISTS idx_entity_edges_user_id ON entity_edges(user_id);

    -- Per-post record of whether entity extraction has run
    CREATE TABLE IF NOT EXISTS extraction_status (
        post_id TEXT PRIMARY KEY NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        status TEXT NOT NULL CHECK (status IN ('completed', 'failed')),
        processed_at TIMESTAMP NOT NULL,
        error TEXT
    );
"#;

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    // Ensure migrations table exists
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    // Get the latest version
    let row: Option<(i32,)> = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(v,)| v).unwrap_or(0))
}

/// Record that a migration has been applied
async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    // Apply migrations in order
    if current_version < 1 {
        tracing::info!("Applying migration v1: Posts and collections");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Knowledge graph tables");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Check if the database needs migrations
pub async fn needs_migration(pool: &SqlitePool) -> anyhow::Result<bool> {
    let current_version = get_current_version(pool).await?;
    Ok(current_version < CURRENT_VERSION)
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool")
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await;

        // Should start with no migrations
        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 0);
        assert!(status.needs_migration);

        // Run migrations
        run_migrations(&pool).await.unwrap();

        // Should be at current version
        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
        assert!(!status.needs_migration);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = create_test_pool().await;

        // Run migrations twice
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        // Should still be at current version
        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        let tables = vec![
            "posts",
            "collections",
            "post_collections",
            "entities",
            "entity_links",
            "entity_edges",
            "extraction_status",
        ];

        for table in tables {
            let result: (i32,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap_or_else(|_| panic!("Table {} should exist", table));
            assert_eq!(result.0, 0, "Table {} should be empty", table);
        }
    }

    #[tokio::test]
    async fn test_entity_dedup_constraint() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        let insert = "INSERT INTO entities (id, user_id, name, canonical_name, entity_type) VALUES (?, ?, ?, ?, ?)";

        sqlx::query(insert)
            .bind("e1")
            .bind("u1")
            .bind("OpenAI")
            .bind("openai")
            .bind("company")
            .execute(&pool)
            .await
            .unwrap();

        // Same dedup key should violate the unique index
        let dup = sqlx::query(insert)
            .bind("e2")
            .bind("u1")
            .bind("openai")
            .bind("openai")
            .bind("company")
            .execute(&pool)
            .await;
        assert!(dup.is_err());

        // Same canonical name for a different user is fine
        sqlx::query(insert)
            .bind("e3")
            .bind("u2")
            .bind("OpenAI")
            .bind("openai")
            .bind("company")
            .execute(&pool)
            .await
            .unwrap();
    }
}
