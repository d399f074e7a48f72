//! SQLite implementation of the PostRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::post::{Post, PostFilters, PostRepository, PostUpdate};
use crate::error::Result;

/// SQLite implementation of the post repository
#[derive(Clone)]
pub struct SqlitePostRepository {
    pool: SqlitePool,
}

impl SqlitePostRepository {
    /// Create a new SQLite post repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert(&self, post: &Post) -> Result<()> {
        let tags_json = serde_json::to_string(&post.tags)
            .map_err(|e| crate::Error::Other(format!("Failed to serialize tags: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO posts (
                id, user_id, original_url, content, summary, platform,
                author_name, author_url, image_url, published_at, tags,
                is_favorite, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.original_url)
        .bind(&post.content)
        .bind(&post.summary)
        .bind(&post.platform)
        .bind(&post.author_name)
        .bind(&post.author_url)
        .bind(&post.image_url)
        .bind(post.published_at.map(|dt| dt.to_rfc3339()))
        .bind(&tags_json)
        .bind(post.is_favorite)
        .bind(post.created_at.to_rfc3339())
        .bind(post.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn save(&self, post: &Post) -> Result<()> {
        self.insert(post).await?;
        debug!(post_id = %post.id, "Post saved");
        Ok(())
    }

    async fn save_many(&self, posts: &[Post]) -> Result<()> {
        for post in posts {
            self.insert(post).await?;
        }
        debug!(count = posts.len(), "Posts saved");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Post>> {
        let row: Option<PostRow> = sqlx::query_as("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(PostRow::into_post))
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<Post>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let query = format!(
            "SELECT * FROM posts WHERE id IN ({}) ORDER BY created_at DESC",
            placeholders
        );

        let mut query_builder = sqlx::query_as::<_, PostRow>(&query);
        for id in ids {
            query_builder = query_builder.bind(id);
        }

        let rows = query_builder.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(PostRow::into_post).collect())
    }

    async fn list(&self, user_id: &str, filters: &PostFilters) -> Result<Vec<Post>> {
        let mut query = String::from("SELECT * FROM posts WHERE user_id = ?");

        if filters.search.is_some() {
            query.push_str(
                " AND (content LIKE ? COLLATE NOCASE \
                 OR summary LIKE ? COLLATE NOCASE \
                 OR author_name LIKE ? COLLATE NOCASE)",
            );
        }
        if filters.tag.is_some() {
            query.push_str(
                " AND EXISTS (SELECT 1 FROM json_each(posts.tags) WHERE json_each.value = ?)",
            );
        }

        query.push_str(" ORDER BY created_at DESC");

        if filters.limit.is_some() {
            query.push_str(" LIMIT ?");
        }
        if filters.offset.is_some() {
            // LIMIT is required before OFFSET in SQLite
            if filters.limit.is_none() {
                query.push_str(" LIMIT -1");
            }
            query.push_str(" OFFSET ?");
        }

        let mut query_builder = sqlx::query_as::<_, PostRow>(&query).bind(user_id);

        if let Some(search) = &filters.search {
            let pattern = format!("%{}%", search);
            query_builder = query_builder
                .bind(pattern.clone())
                .bind(pattern.clone())
                .bind(pattern);
        }
        if let Some(tag) = &filters.tag {
            query_builder = query_builder.bind(tag.clone());
        }
        if let Some(limit) = filters.limit {
            query_builder = query_builder.bind(limit as i64);
        }
        if let Some(offset) = filters.offset {
            query_builder = query_builder.bind(offset as i64);
        }

        let rows = query_builder.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(PostRow::into_post).collect())
    }

    async fn update(&self, id: &str, update: PostUpdate) -> Result<Option<Post>> {
        let Some(mut post) = self.get(id).await? else {
            return Ok(None);
        };

        if let Some(content) = update.content {
            post.content = content;
        }
        if let Some(summary) = update.summary {
            post.summary = Some(summary);
        }
        if let Some(tags) = update.tags {
            post.tags = tags;
        }
        if let Some(is_favorite) = update.is_favorite {
            post.is_favorite = is_favorite;
        }
        post.updated_at = Utc::now();

        let tags_json = serde_json::to_string(&post.tags)
            .map_err(|e| crate::Error::Other(format!("Failed to serialize tags: {}", e)))?;

        sqlx::query(
            r#"
            UPDATE posts
            SET content = ?, summary = ?, tags = ?, is_favorite = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&post.content)
        .bind(&post.summary)
        .bind(&tags_json)
        .bind(post.is_favorite)
        .bind(post.updated_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        debug!(post_id = %id, "Post updated");
        Ok(Some(post))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_url(&self, user_id: &str, url: &str) -> Result<Option<Post>> {
        let row: Option<PostRow> =
            sqlx::query_as("SELECT * FROM posts WHERE user_id = ? AND original_url = ?")
                .bind(user_id)
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(PostRow::into_post))
    }

    async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<Post>> {
        let pattern = format!("%{}%", query);

        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
            SELECT * FROM posts
            WHERE user_id = ?
              AND (content LIKE ? COLLATE NOCASE
                   OR summary LIKE ? COLLATE NOCASE
                   OR author_name LIKE ? COLLATE NOCASE)
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PostRow::into_post).collect())
    }

    async fn count_for_user(&self, user_id: &str) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

// ========== Database Row Types ==========

#[derive(Debug, FromRow)]
struct PostRow {
    id: String,
    user_id: String,
    original_url: Option<String>,
    content: String,
    summary: Option<String>,
    platform: String,
    author_name: Option<String>,
    author_url: Option<String>,
    image_url: Option<String>,
    published_at: Option<String>,
    tags: String,
    is_favorite: bool,
    created_at: String,
    updated_at: String,
}

impl PostRow {
    fn into_post(self) -> Post {
        let tags: Vec<String> = serde_json::from_str(&self.tags).unwrap_or_default();

        Post {
            id: self.id,
            user_id: self.user_id,
            original_url: self.original_url,
            content: self.content,
            summary: self.summary,
            platform: self.platform,
            author_name: self.author_name,
            author_url: self.author_url,
            image_url: self.image_url,
            published_at: self.published_at.as_deref().map(parse_timestamp),
            tags,
            is_favorite: self.is_favorite,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn setup() -> (Database, SqlitePostRepository) {
        let db = Database::in_memory().await.expect("in-memory database");
        let repo = SqlitePostRepository::new(db.pool().clone());
        (db, repo)
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let (_db, repo) = setup().await;

        let post = Post::new("u1", "Announcing our seed round")
            .with_author_name("Jane Doe")
            .with_original_url("https://linkedin.com/posts/1")
            .with_tags(vec!["funding".into(), "startup".into()]);

        repo.save(&post).await.unwrap();

        let loaded = repo.get(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.content, "Announcing our seed round");
        assert_eq!(loaded.author_name.as_deref(), Some("Jane Doe"));
        assert_eq!(loaded.tags, vec!["funding".to_string(), "startup".to_string()]);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (_db, repo) = setup().await;
        assert!(repo.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_with_search_filter() {
        let (_db, repo) = setup().await;

        repo.save(&Post::new("u1", "Kubernetes in production")).await.unwrap();
        repo.save(&Post::new("u1", "Hiring our first designer")).await.unwrap();
        repo.save(&Post::new("u2", "Kubernetes at scale")).await.unwrap();

        let filters = PostFilters {
            search: Some("kubernetes".into()),
            ..Default::default()
        };
        let results = repo.list("u1", &filters).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "Kubernetes in production");
    }

    #[tokio::test]
    async fn test_list_with_tag_filter() {
        let (_db, repo) = setup().await;

        repo.save(&Post::new("u1", "a").with_tags(vec!["ai".into()]))
            .await
            .unwrap();
        repo.save(&Post::new("u1", "b").with_tags(vec!["design".into()]))
            .await
            .unwrap();

        let filters = PostFilters {
            tag: Some("ai".into()),
            ..Default::default()
        };
        let results = repo.list("u1", &filters).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "a");
    }

    #[tokio::test]
    async fn test_list_limit_and_offset() {
        let (_db, repo) = setup().await;

        for i in 0..5 {
            repo.save(&Post::new("u1", format!("post {}", i))).await.unwrap();
        }

        let filters = PostFilters {
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(repo.list("u1", &filters).await.unwrap().len(), 2);

        let filters = PostFilters {
            offset: Some(4),
            ..Default::default()
        };
        assert_eq!(repo.list("u1", &filters).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_post() {
        let (_db, repo) = setup().await;

        let post = Post::new("u1", "original");
        repo.save(&post).await.unwrap();

        let updated = repo
            .update(
                &post.id,
                PostUpdate {
                    summary: Some("A summary".into()),
                    is_favorite: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.summary.as_deref(), Some("A summary"));
        assert!(updated.is_favorite);
        assert_eq!(updated.content, "original");

        // Missing post yields None
        assert!(repo.update("nope", PostUpdate::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_post() {
        let (_db, repo) = setup().await;

        let post = Post::new("u1", "to delete");
        repo.save(&post).await.unwrap();

        assert!(repo.delete(&post.id).await.unwrap());
        assert!(!repo.delete(&post.id).await.unwrap());
        assert!(repo.get(&post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_url() {
        let (_db, repo) = setup().await;

        let post = Post::new("u1", "linked").with_original_url("https://example.com/p/1");
        repo.save(&post).await.unwrap();

        let found = repo
            .find_by_url("u1", "https://example.com/p/1")
            .await
            .unwrap();
        assert!(found.is_some());

        // Other users don't see it
        assert!(
            repo.find_by_url("u2", "https://example.com/p/1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_search_matches_author() {
        let (_db, repo) = setup().await;

        repo.save(&Post::new("u1", "post one").with_author_name("Jane Doe"))
            .await
            .unwrap();
        repo.save(&Post::new("u1", "post two")).await.unwrap();

        let results = repo.search("u1", "jane", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "post one");
    }

    #[tokio::test]
    async fn test_get_many_skips_missing() {
        let (_db, repo) = setup().await;

        let post = Post::new("u1", "exists");
        repo.save(&post).await.unwrap();

        let posts = repo
            .get_many(&[post.id.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);

        assert!(repo.get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_for_user() {
        let (_db, repo) = setup().await;

        repo.save(&Post::new("u1", "a")).await.unwrap();
        repo.save(&Post::new("u1", "b")).await.unwrap();
        repo.save(&Post::new("u2", "c")).await.unwrap();

        assert_eq!(repo.count_for_user("u1").await.unwrap(), 2);
        assert_eq!(repo.count_for_user("u3").await.unwrap(), 0);
    }
}
