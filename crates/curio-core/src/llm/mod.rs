//! LLM integration - OpenAI-compatible chat completions
//!
//! Provides the `ChatCompleter` trait used by entity extraction and
//! retrieval-augmented search, plus the HTTP client implementation.

mod client;
mod types;

pub use client::{ChatCompleter, LlmClient, LlmClientBuilder};
pub use types::{
    ChatRequest, ChatResponse, Choice, CompletionParams, FinishReason, LlmResponse, Message,
    MessageRole, Usage,
};
