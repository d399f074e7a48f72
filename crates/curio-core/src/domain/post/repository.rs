//! Repository trait for post persistence

use async_trait::async_trait;

use crate::error::Result;

use super::Post;

/// Filters for listing a user's posts
#[derive(Debug, Clone, Default)]
pub struct PostFilters {
    /// Case-insensitive substring match against content, summary, or author
    pub search: Option<String>,
    /// Only posts carrying this tag
    pub tag: Option<String>,
    /// Maximum number of rows to return
    pub limit: Option<usize>,
    /// Number of rows to skip
    pub offset: Option<usize>,
}

/// Partial update for a post
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    /// Replace the content
    pub content: Option<String>,
    /// Replace the summary
    pub summary: Option<String>,
    /// Replace the tags
    pub tags: Option<Vec<String>>,
    /// Change the favorite flag
    pub is_favorite: Option<bool>,
}

/// Repository trait for post persistence
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Save a new post
    async fn save(&self, post: &Post) -> Result<()>;

    /// Save a batch of posts
    async fn save_many(&self, posts: &[Post]) -> Result<()>;

    /// Get a post by id
    async fn get(&self, id: &str) -> Result<Option<Post>>;

    /// Get posts by id, preserving only rows that exist
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Post>>;

    /// List a user's posts, newest first, applying the given filters
    async fn list(&self, user_id: &str, filters: &PostFilters) -> Result<Vec<Post>>;

    /// Apply a partial update; returns the updated post or `None` if missing
    async fn update(&self, id: &str, update: PostUpdate) -> Result<Option<Post>>;

    /// Delete a post; returns whether a row was removed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Find a user's post saved from the given URL
    async fn find_by_url(&self, user_id: &str, url: &str) -> Result<Option<Post>>;

    /// Keyword search over content, summary, and author name
    async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<Post>>;

    /// Count a user's posts
    async fn count_for_user(&self, user_id: &str) -> Result<u64>;
}
