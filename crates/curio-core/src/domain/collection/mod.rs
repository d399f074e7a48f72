//! Collections domain
//!
//! Collections are user-named groupings of saved posts. Membership is a
//! plain link table; adding a post twice is a no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// A named collection of posts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    /// Unique identifier for the collection
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// When the collection was created
    pub created_at: DateTime<Utc>,
}

impl Collection {
    /// Create a new collection
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            name: name.into(),
            description: None,
            created_at: Utc::now(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A collection together with its post count, for list views
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    /// The collection
    #[serde(flatten)]
    pub collection: Collection,
    /// Number of posts in the collection
    pub post_count: u64,
}

/// Repository trait for collection persistence
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// Save a new collection
    async fn save(&self, collection: &Collection) -> Result<()>;

    /// Get a collection by id
    async fn get(&self, id: &str) -> Result<Option<Collection>>;

    /// List a user's collections with post counts, newest first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<CollectionSummary>>;

    /// Rename a collection and/or replace its description
    async fn update(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Collection>>;

    /// Delete a collection; returns whether a row was removed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Add a post to a collection (no-op if already present)
    async fn add_post(&self, collection_id: &str, post_id: &str) -> Result<()>;

    /// Remove a post from a collection; returns whether a row was removed
    async fn remove_post(&self, collection_id: &str, post_id: &str) -> Result<bool>;

    /// Ids of posts in a collection, newest first
    async fn post_ids_in(&self, collection_id: &str) -> Result<Vec<String>>;

    /// Ids of collections containing a post
    async fn collection_ids_for_post(&self, post_id: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_creation() {
        let collection = Collection::new("user-1", "Reading List")
            .with_description("Posts to revisit");

        assert!(!collection.id.is_empty());
        assert_eq!(collection.name, "Reading List");
        assert_eq!(collection.description.as_deref(), Some("Posts to revisit"));
    }
}
