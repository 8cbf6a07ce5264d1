//! ============================================================================
//! Answer Generator - Grounded answers with cited sources
//! ============================================================================
//! Asks the language model for a JSON reply carrying the answer and the
//! source URLs it used. This is the one pipeline stage whose failure is
//! fatal to the request.
//! ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use super::completion::{CompletionModel, CompletionPrompt};
use super::context::Context;
use crate::config::CitationPolicy;
use crate::types::{CopilotError, GenerationResult};

const INSTRUCTIONS: &str = "You are a support assistant for a data catalog product. \
Answer the user's question using the numbered sources and the previous answers below when they are relevant. \
If the sources do not cover the question, say so briefly and answer from general knowledge. \
Reply with a JSON object of the form {\"LLM_Response\": string, \"Cited_URLs\": [string]}. \
List in Cited_URLs only the source URLs you actually used, in order of importance; use an empty list if none.";

#[derive(Deserialize)]
struct ModelAnswer {
    #[serde(rename = "LLM_Response", alias = "answer", default)]
    answer: String,
    #[serde(rename = "Cited_URLs", alias = "cited_urls", default)]
    cited_urls: Option<CitedUrls>,
}

/// Models sometimes send a single URL instead of a list
#[derive(Deserialize)]
#[serde(untagged)]
enum CitedUrls {
    One(String),
    Many(Vec<String>),
}

impl CitedUrls {
    fn into_vec(self) -> Vec<String> {
        match self {
            CitedUrls::One(url) => vec![url],
            CitedUrls::Many(urls) => urls,
        }
    }
}

/// Language-model answer step
pub struct AnswerGenerator {
    completion: Arc<dyn CompletionModel>,
    citation_policy: CitationPolicy,
    timeout: Duration,
}

impl AnswerGenerator {
    pub fn new(
        completion: Arc<dyn CompletionModel>,
        citation_policy: CitationPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            completion,
            citation_policy,
            timeout,
        }
    }

    /// Generate an answer grounded in `context`
    pub async fn generate(
        &self,
        user_text: &str,
        context: &Context,
    ) -> Result<GenerationResult, CopilotError> {
        let prompt = CompletionPrompt {
            instructions: INSTRUCTIONS.to_string(),
            context: context.render(),
            user_message: user_text.to_string(),
        };

        let raw = match tokio::time::timeout(self.timeout, self.completion.complete(&prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(CopilotError::GenerationUnavailable(e.to_string())),
            Err(_) => {
                return Err(CopilotError::GenerationUnavailable(format!(
                    "Completion timed out after {:?}",
                    self.timeout
                )))
            }
        };

        let mut result = parse_reply(&raw);
        if result.answer.is_empty() {
            return Err(CopilotError::GenerationUnavailable(
                "Model returned an empty answer".to_string(),
            ));
        }

        result.cited_urls = filter_citations(result.cited_urls, context, self.citation_policy);
        debug!(
            "Generated {} char answer with {} citations",
            result.answer.len(),
            result.cited_urls.len()
        );
        Ok(result)
    }
}

/// Parse the model reply: JSON object, fenced JSON, or plain text
fn parse_reply(raw: &str) -> GenerationResult {
    let trimmed = raw.trim();

    let parsed = serde_json::from_str::<ModelAnswer>(trimmed)
        .or_else(|_| serde_json::from_str::<ModelAnswer>(&extract_code_block(trimmed)));

    match parsed {
        Ok(answer) => GenerationResult {
            answer: answer.answer.trim().to_string(),
            cited_urls: answer.cited_urls.map(CitedUrls::into_vec).unwrap_or_default(),
        },
        Err(_) => {
            warn!("Model reply was not JSON, using it as plain text");
            GenerationResult {
                answer: trimmed.to_string(),
                cited_urls: Vec::new(),
            }
        }
    }
}

/// Extract code block from markdown response
fn extract_code_block(response: &str) -> String {
    if let Some(start) = response.find("```") {
        let after_start = &response[start + 3..];
        // Skip language identifier if present
        let code_start = after_start.find('\n').map(|i| i + 1).unwrap_or(0);
        let code_content = &after_start[code_start..];

        if let Some(end) = code_content.find("```") {
            return code_content[..end].trim().to_string();
        }
    }

    response.trim().to_string()
}

fn filter_citations(urls: Vec<String>, context: &Context, policy: CitationPolicy) -> Vec<String> {
    // Nothing was retrieved, so nothing can be cited under any policy
    if context.chunks().is_empty() {
        if !urls.is_empty() {
            debug!("Dropping {} citations, no sources were retrieved", urls.len());
        }
        return Vec::new();
    }

    let retrieved = context.source_urls();
    let mut kept: Vec<String> = Vec::new();

    for url in urls {
        let url = url.trim().to_string();
        if url.is_empty() || kept.contains(&url) {
            continue;
        }
        if policy == CitationPolicy::RetrievedOnly && !retrieved.contains(&url) {
            debug!("Dropping citation not among retrieved sources: {}", url);
            continue;
        }
        kept.push(url);
    }

    kept
}
