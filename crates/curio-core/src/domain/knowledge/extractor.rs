//! Entity extraction from post content using an LLM
//!
//! Sends a bounded prefix of the post text to the chat completion API with
//! a fixed instructional prompt and parses the JSON array it returns into
//! typed candidate entities. Malformed individual elements are discarded;
//! transport failures and unparseable responses surface as errors so the
//! pipeline can record a failed status for the post.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::llm::{ChatCompleter, CompletionParams, Message};

use super::entity::{CandidateEntity, EntityType};

/// Maximum characters of post content sent to the LLM
///
/// A cost/latency bound, not a correctness requirement: long posts are
/// analyzed from their prefix only.
const MAX_CONTENT_CHARS: usize = 4000;

/// Maximum completion tokens requested for extraction
const MAX_EXTRACTION_TOKENS: usize = 1000;

/// Temperature favoring deterministic extraction
const EXTRACTION_TEMPERATURE: f32 = 0.3;

/// Entity extractor backed by a chat completion capability
#[derive(Clone)]
pub struct EntityExtractor {
    llm: Arc<dyn ChatCompleter>,
}

impl EntityExtractor {
    /// Create a new entity extractor
    pub fn new(llm: Arc<dyn ChatCompleter>) -> Self {
        Self { llm }
    }

    /// Extract typed candidate entities from post content
    ///
    /// Returns an empty list when the model finds nothing (or returns a
    /// non-array JSON value); returns an error when the LLM call fails or
    /// the response is not parseable as JSON at all.
    pub async fn extract(
        &self,
        content: &str,
        author_hint: Option<&str>,
    ) -> Result<Vec<CandidateEntity>> {
        let truncated = truncate_chars(content, MAX_CONTENT_CHARS);
        let prompt = build_extraction_prompt(truncated, author_hint);

        let params = CompletionParams::default()
            .with_temperature(EXTRACTION_TEMPERATURE)
            .with_max_tokens(MAX_EXTRACTION_TOKENS);

        let response = self.llm.complete(vec![Message::user(prompt)], params).await?;

        let candidates = parse_candidates(&response.content)?;

        debug!(
            candidate_count = candidates.len(),
            "Entities extracted from content"
        );

        Ok(candidates)
    }
}

/// Build the fixed extraction prompt for a content prefix
fn build_extraction_prompt(content: &str, author_hint: Option<&str>) -> String {
    let author_line = match author_hint {
        Some(author) => format!("\n\nPost author: {}", author),
        None => String::new(),
    };

    format!(
        r#"Analyze this professional content and extract key entities. Return a JSON array of objects with "name", "type", and "description" fields.

Entity types:
- "person": Named individuals mentioned (include the post author if known)
- "company": Companies, organizations, startups
- "topic": Business concepts, strategies, themes (e.g., "product-led growth", "remote work")
- "technology": Specific technologies, tools, frameworks, platforms (e.g., "GPT-4", "Kubernetes", "Figma")

Rules:
- Extract 3-15 entities maximum
- Use the most common/recognized form of each name
- Keep descriptions to one short sentence
- Only extract entities that are meaningfully discussed, not just briefly mentioned
- For topics, prefer specific concepts over generic ones (e.g., "AI pricing models" over "business")

Content:
{content}{author_line}

Return ONLY a valid JSON array, no other text."#
    )
}

/// Parse the raw LLM response into candidate entities
///
/// Elements missing a name or carrying an unknown type are dropped
/// individually; a response that is valid JSON but not an array yields an
/// empty list; a response that is not JSON at all is an error.
fn parse_candidates(response: &str) -> Result<Vec<CandidateEntity>> {
    let cleaned = strip_code_fences(response);

    let parsed: serde_json::Value = serde_json::from_str(cleaned).map_err(|e| {
        warn!(error = %e, "Failed to parse extraction response as JSON");
        Error::ExtractionFailed(format!("Invalid response: {}", e))
    })?;

    let Some(items) = parsed.as_array() else {
        return Ok(Vec::new());
    };

    let candidates = items
        .iter()
        .filter_map(|item| {
            let raw: RawCandidate = serde_json::from_value(item.clone()).ok()?;
            let name = raw.name?.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let entity_type = EntityType::parse(raw.entity_type.as_deref()?)?;
            let description = raw
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty());

            Some(CandidateEntity {
                name,
                entity_type,
                description,
            })
        })
        .collect();

    Ok(candidates)
}

/// Loosely-typed candidate as returned by the LLM
#[derive(Debug, Deserialize)]
struct RawCandidate {
    name: Option<String>,
    #[serde(rename = "type")]
    entity_type: Option<String>,
    description: Option<String>,
}

/// Truncate to a maximum number of characters on a char boundary
fn truncate_chars(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Strip Markdown code-fence wrappers from a response
///
/// Falls back to slicing between the outermost brackets when the response
/// embeds the array in surrounding prose.
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        // Drop the fence line ("```json" or bare "```") and the closing fence
        let body = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest,
        };
        return body.trim_end().trim_end_matches("```").trim();
    }

    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']'))
        && start < end
    {
        return &trimmed[start..=end];
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FinishReason, LlmResponse};

    /// Completer returning a fixed response body
    struct FixedCompleter {
        body: String,
    }

    #[async_trait::async_trait]
    impl ChatCompleter for FixedCompleter {
        async fn complete(
            &self,
            _messages: Vec<Message>,
            _params: CompletionParams,
        ) -> Result<LlmResponse> {
            Ok(LlmResponse {
                content: self.body.clone(),
                model: "test/model".to_string(),
                tokens_used: 0,
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: FinishReason::Stop,
            })
        }
    }

    /// Completer that always fails at the transport level
    struct UnreachableCompleter;

    #[async_trait::async_trait]
    impl ChatCompleter for UnreachableCompleter {
        async fn complete(
            &self,
            _messages: Vec<Message>,
            _params: CompletionParams,
        ) -> Result<LlmResponse> {
            Err(Error::LlmError("connection refused".to_string()))
        }
    }

    fn extractor_with(body: &str) -> EntityExtractor {
        EntityExtractor::new(Arc::new(FixedCompleter {
            body: body.to_string(),
        }))
    }

    #[tokio::test]
    async fn test_extract_parses_valid_array() {
        let extractor = extractor_with(
            r#"[
                {"name": "Microsoft", "type": "company", "description": "Technology company"},
                {"name": "Jane Doe", "type": "person"}
            ]"#,
        );

        let candidates = extractor.extract("some post", None).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "Microsoft");
        assert_eq!(candidates[0].entity_type, EntityType::Company);
        assert_eq!(
            candidates[0].description.as_deref(),
            Some("Technology company")
        );
        assert_eq!(candidates[1].description, None);
    }

    #[tokio::test]
    async fn test_extract_discards_invalid_elements() {
        let extractor = extractor_with(
            r#"[
                {"name": "Kubernetes", "type": "technology"},
                {"name": "", "type": "company"},
                {"name": "No Type Given"},
                {"name": "Acme", "type": "organization"},
                "just a string",
                {"name": "Valid Topic", "type": "topic"}
            ]"#,
        );

        let candidates = extractor.extract("some post", None).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "Kubernetes");
        assert_eq!(candidates[1].name, "Valid Topic");
    }

    #[tokio::test]
    async fn test_extract_strips_code_fences() {
        let extractor =
            extractor_with("```json\n[{\"name\": \"Figma\", \"type\": \"technology\"}]\n```");

        let candidates = extractor.extract("some post", None).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Figma");
    }

    #[tokio::test]
    async fn test_extract_non_array_json_is_empty() {
        let extractor = extractor_with(r#"{"entities": []}"#);

        let candidates = extractor.extract("some post", None).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_extract_invalid_json_is_error() {
        let extractor = extractor_with("I could not find any entities, sorry!");

        let result = extractor.extract("some post", None).await;
        assert!(matches!(result, Err(Error::ExtractionFailed(_))));
    }

    #[tokio::test]
    async fn test_extract_propagates_llm_failure() {
        let extractor = EntityExtractor::new(Arc::new(UnreachableCompleter));

        let result = extractor.extract("some post", None).await;
        assert!(matches!(result, Err(Error::LlmError(_))));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 4000), "short");

        let long = "x".repeat(5000);
        assert_eq!(truncate_chars(&long, 4000).len(), 4000);

        // Must not split multi-byte characters
        let emoji = "\u{1F600}".repeat(10);
        let truncated = truncate_chars(&emoji, 3);
        assert_eq!(truncated.chars().count(), 3);
    }

    #[test]
    fn test_strip_code_fences_variants() {
        assert_eq!(strip_code_fences("[1, 2]"), "[1, 2]");
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("```\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(
            strip_code_fences("Here is the result: [1, 2] as requested."),
            "[1, 2]"
        );
    }

    #[test]
    fn test_prompt_includes_author_hint() {
        let prompt = build_extraction_prompt("content here", Some("Jane Doe"));
        assert!(prompt.contains("Post author: Jane Doe"));

        let prompt = build_extraction_prompt("content here", None);
        assert!(!prompt.contains("Post author:"));
    }
}
