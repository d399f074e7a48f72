//! Error types for Curio

use thiserror::Error;

/// Result type alias using Curio's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Curio error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Post '{0}' not found. Run `curio post list` to see saved posts.")]
    PostNotFound(String),

    #[error("Collection '{0}' not found. Run `curio collection list` to see all collections.")]
    CollectionNotFound(String),

    #[error("Entity '{0}' not found in the knowledge graph.")]
    EntityNotFound(String),

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}. Check your API key with `curio config get llm.api_key`.")]
    LlmError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    // Extraction errors (E200-E299)
    #[error("Entity extraction failed: {0}")]
    ExtractionFailed(String),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::PostNotFound(_) => "E001",
            Self::CollectionNotFound(_) => "E002",
            Self::EntityNotFound(_) => "E003",
            Self::NetworkError(_) => "E100",
            Self::LlmError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::ExtractionFailed(_) => "E200",
            Self::DatabaseError(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::PostNotFound(_) => Some("curio post list".to_string()),
            Self::CollectionNotFound(_) => Some("curio collection list".to_string()),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::LlmError(_) => Some("curio config get llm.api_key".to_string()),
            _ => None,
        }
    }
}
