//! Bulk import of posts from platform data exports
//!
//! Deduplicates by original URL per user before inserting, so re-running
//! an import of the same export file only adds new posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

use super::{Post, PostRepository};

/// A single post from an import file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportItem {
    /// Full post text
    pub content: String,
    /// URL the post was saved from
    #[serde(default)]
    pub original_url: Option<String>,
    /// Short summary
    #[serde(default)]
    pub summary: Option<String>,
    /// Name of the post author
    #[serde(default)]
    pub author_name: Option<String>,
    /// Profile URL of the post author
    #[serde(default)]
    pub author_url: Option<String>,
    /// When the post was originally published
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Freeform tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Result of a bulk import
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    /// Posts inserted
    pub imported: u64,
    /// Posts skipped because their URL was already saved
    pub skipped: u64,
}

/// Import a batch of posts for a user, skipping URLs already saved
pub async fn bulk_import<P: PostRepository>(
    repo: &P,
    user_id: &str,
    items: Vec<ImportItem>,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    let mut to_insert = Vec::new();

    for item in items {
        if let Some(url) = &item.original_url
            && repo.find_by_url(user_id, url).await?.is_some()
        {
            report.skipped += 1;
            continue;
        }

        let mut post = Post::new(user_id, item.content).with_tags(item.tags);
        if let Some(url) = item.original_url {
            post = post.with_original_url(url);
        }
        if let Some(summary) = item.summary {
            post = post.with_summary(summary);
        }
        if let Some(author_name) = item.author_name {
            post = post.with_author_name(author_name);
        }
        if let Some(author_url) = item.author_url {
            post = post.with_author_url(author_url);
        }
        if let Some(published_at) = item.published_at {
            post = post.with_published_at(published_at);
        }

        to_insert.push(post);
    }

    if !to_insert.is_empty() {
        repo.save_many(&to_insert).await?;
        report.imported = to_insert.len() as u64;
    }

    info!(
        user_id = %user_id,
        imported = report.imported,
        skipped = report.skipped,
        "Bulk import finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::post::PostFilters;
    use crate::infrastructure::post::SqlitePostRepository;
    use crate::storage::Database;

    fn item(content: &str, url: Option<&str>) -> ImportItem {
        ImportItem {
            content: content.to_string(),
            original_url: url.map(String::from),
            summary: None,
            author_name: None,
            author_url: None,
            published_at: None,
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_import_dedups_by_url() {
        let db = Database::in_memory().await.expect("in-memory database");
        let repo = SqlitePostRepository::new(db.pool().clone());

        let first = bulk_import(
            &repo,
            "u1",
            vec![
                item("one", Some("https://example.com/1")),
                item("two", Some("https://example.com/2")),
                item("no url", None),
            ],
        )
        .await
        .unwrap();
        assert_eq!(first.imported, 3);
        assert_eq!(first.skipped, 0);

        // Re-importing the same export only skips posts with known URLs
        let second = bulk_import(
            &repo,
            "u1",
            vec![
                item("one", Some("https://example.com/1")),
                item("three", Some("https://example.com/3")),
            ],
        )
        .await
        .unwrap();
        assert_eq!(second.imported, 1);
        assert_eq!(second.skipped, 1);

        let all = repo.list("u1", &PostFilters::default()).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_import_preserves_fields() {
        let db = Database::in_memory().await.expect("in-memory database");
        let repo = SqlitePostRepository::new(db.pool().clone());

        let mut single = item("full item", Some("https://example.com/full"));
        single.author_name = Some("Jane Doe".into());
        single.summary = Some("A summary".into());
        single.tags = vec!["imported".into()];

        bulk_import(&repo, "u1", vec![single]).await.unwrap();

        let post = repo
            .find_by_url("u1", "https://example.com/full")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.author_name.as_deref(), Some("Jane Doe"));
        assert_eq!(post.summary.as_deref(), Some("A summary"));
        assert_eq!(post.tags, vec!["imported".to_string()]);
    }

    #[tokio::test]
    async fn test_import_empty_batch() {
        let db = Database::in_memory().await.expect("in-memory database");
        let repo = SqlitePostRepository::new(db.pool().clone());

        let report = bulk_import(&repo, "u1", Vec::new()).await.unwrap();
        assert_eq!(report.imported, 0);
        assert_eq!(report.skipped, 0);
    }
}
