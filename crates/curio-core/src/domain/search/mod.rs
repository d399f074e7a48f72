//! Retrieval-augmented search over saved posts
//!
//! Retrieves keyword-matching posts as context and asks the LLM to answer
//! the user's question grounded in them.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::post::{Post, PostRepository};
use crate::error::Result;
use crate::llm::{ChatCompleter, CompletionParams, Message};

/// Maximum posts retrieved as context for one question
const MAX_SOURCES: usize = 10;

/// Maximum completion tokens requested for an answer
const MAX_ANSWER_TOKENS: usize = 500;

/// Answer returned when retrieval finds nothing
const NO_RESULTS_ANSWER: &str = "I couldn't find any saved posts matching your query.";

/// System prompt grounding the answer in retrieved posts
const SEARCH_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based on the user's saved posts. Use the provided context to answer the question. If the answer isn't in the context, say so.";

/// Retrieval-augmented search service
pub struct SearchService<P> {
    posts: Arc<P>,
    llm: Arc<dyn ChatCompleter>,
}

/// An answer with the posts it was grounded in
#[derive(Debug, Clone, Serialize)]
pub struct SearchAnswer {
    /// The generated answer
    pub answer: String,
    /// Posts used as context
    pub sources: Vec<Post>,
}

impl<P: PostRepository> SearchService<P> {
    /// Create a new search service
    pub fn new(posts: Arc<P>, llm: Arc<dyn ChatCompleter>) -> Self {
        Self { posts, llm }
    }

    /// Answer a question using the user's saved posts as context
    pub async fn answer(&self, user_id: &str, query: &str) -> Result<SearchAnswer> {
        let sources = self.posts.search(user_id, query, MAX_SOURCES).await?;

        if sources.is_empty() {
            debug!(user_id = %user_id, "No posts matched the search query");
            return Ok(SearchAnswer {
                answer: NO_RESULTS_ANSWER.to_string(),
                sources,
            });
        }

        let context = sources
            .iter()
            .map(|post| {
                format!(
                    "[Title: {}]\n[Content: {}]\n[Author: {}]",
                    post.summary.as_deref().unwrap_or("No Title"),
                    post.content,
                    post.author_name.as_deref().unwrap_or("Unknown"),
                )
            })
            .collect::<Vec<_>>()
            .join("\n---\n");

        let messages = vec![
            Message::system(SEARCH_SYSTEM_PROMPT),
            Message::user(format!("Context:\n{}\n\nQuestion: {}", context, query)),
        ];

        let params = CompletionParams::default().with_max_tokens(MAX_ANSWER_TOKENS);
        let response = self.llm.complete(messages, params).await?;

        info!(
            user_id = %user_id,
            source_count = sources.len(),
            "Search answer generated"
        );

        Ok(SearchAnswer {
            answer: response.content,
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::post::SqlitePostRepository;
    use crate::llm::{FinishReason, LlmResponse};
    use crate::storage::Database;
    use std::sync::Mutex;

    /// Completer that records the prompt and returns a canned answer
    struct RecordingCompleter {
        answer: String,
        last_prompt: Mutex<Option<String>>,
    }

    impl RecordingCompleter {
        fn new(answer: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.into(),
                last_prompt: Mutex::new(None),
            })
        }
    }

    #[async_trait::async_trait]
    impl ChatCompleter for RecordingCompleter {
        async fn complete(
            &self,
            messages: Vec<Message>,
            _params: CompletionParams,
        ) -> Result<LlmResponse> {
            let prompt = messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            *self.last_prompt.lock().unwrap() = Some(prompt);

            Ok(LlmResponse {
                content: self.answer.clone(),
                model: "mock/model".to_string(),
                tokens_used: 0,
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: FinishReason::Stop,
            })
        }
    }

    async fn setup() -> (Database, Arc<SqlitePostRepository>) {
        let db = Database::in_memory().await.expect("in-memory database");
        let posts = Arc::new(SqlitePostRepository::new(db.pool().clone()));
        (db, posts)
    }

    #[tokio::test]
    async fn test_answer_with_no_sources() {
        let (_db, posts) = setup().await;
        let completer = RecordingCompleter::new("should not be called");
        let service = SearchService::new(posts, completer.clone());

        let result = service.answer("u1", "anything").await.unwrap();
        assert_eq!(result.answer, NO_RESULTS_ANSWER);
        assert!(result.sources.is_empty());
        // The LLM is never consulted when retrieval is empty
        assert!(completer.last_prompt.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_answer_grounds_in_retrieved_posts() {
        let (_db, posts) = setup().await;

        let post = Post::new("u1", "We migrated everything to Kubernetes last year")
            .with_author_name("Jane Doe")
            .with_summary("Migration story");
        posts.save(&post).await.unwrap();

        let completer = RecordingCompleter::new("They migrated to Kubernetes.");
        let service = SearchService::new(posts, completer.clone());

        let result = service.answer("u1", "kubernetes").await.unwrap();
        assert_eq!(result.answer, "They migrated to Kubernetes.");
        assert_eq!(result.sources.len(), 1);

        let prompt = completer.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Migration story"));
        assert!(prompt.contains("Jane Doe"));
        assert!(prompt.contains("Question: kubernetes"));
    }

    #[tokio::test]
    async fn test_answer_scoped_to_user() {
        let (_db, posts) = setup().await;

        let post = Post::new("u2", "Kubernetes tips");
        posts.save(&post).await.unwrap();

        let service = SearchService::new(posts, RecordingCompleter::new("unused"));

        let result = service.answer("u1", "kubernetes").await.unwrap();
        assert!(result.sources.is_empty());
        assert_eq!(result.answer, NO_RESULTS_ANSWER);
    }
}
