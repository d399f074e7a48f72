//! Saved posts domain
//!
//! A post is a piece of content a user saved from LinkedIn, Substack, or
//! another platform. Posts are the raw material the knowledge graph is
//! extracted from.

mod import;
mod repository;

pub use import::{ImportItem, ImportReport, bulk_import};
pub use repository::{PostFilters, PostRepository, PostUpdate};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default platform for saved posts
pub const DEFAULT_PLATFORM: &str = "linkedin";

/// A saved post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier for the post
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// URL the post was saved from
    pub original_url: Option<String>,
    /// Full post text
    pub content: String,
    /// Short user-written or scraped summary
    pub summary: Option<String>,
    /// Source platform (linkedin, substack, ...)
    pub platform: String,
    /// Name of the post author
    pub author_name: Option<String>,
    /// Profile URL of the post author
    pub author_url: Option<String>,
    /// Preview image URL
    pub image_url: Option<String>,
    /// When the post was originally published
    pub published_at: Option<DateTime<Utc>>,
    /// Freeform tags
    pub tags: Vec<String>,
    /// Whether the user marked the post as a favorite
    pub is_favorite: bool,
    /// When the post was saved
    pub created_at: DateTime<Utc>,
    /// When the post was last updated
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post with the given owner and content
    pub fn new(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            original_url: None,
            content: content.into(),
            summary: None,
            platform: DEFAULT_PLATFORM.to_string(),
            author_name: None,
            author_url: None,
            image_url: None,
            published_at: None,
            tags: Vec::new(),
            is_favorite: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the source URL
    pub fn with_original_url(mut self, url: impl Into<String>) -> Self {
        self.original_url = Some(url.into());
        self
    }

    /// Set the summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Set the source platform
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Set the author name
    pub fn with_author_name(mut self, author_name: impl Into<String>) -> Self {
        self.author_name = Some(author_name.into());
        self
    }

    /// Set the author profile URL
    pub fn with_author_url(mut self, author_url: impl Into<String>) -> Self {
        self.author_url = Some(author_url.into());
        self
    }

    /// Set the preview image URL
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Set the original publication time
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Set the tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}
