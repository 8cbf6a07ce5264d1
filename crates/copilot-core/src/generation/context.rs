//! ============================================================================
//! Context Assembler - Bounded grounding context for generation
//! ============================================================================
//! Merges retrieved chunks and the user's prior answers into one context
//! that fits the generator's character budget. Pure and deterministic.
//! ============================================================================

use crate::types::ContentChunk;

/// Assembled grounding context
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    chunks: Vec<ContentChunk>,
    prior_answers: Vec<String>,
}

impl Context {
    /// Chunks kept, highest score first
    pub fn chunks(&self) -> &[ContentChunk] {
        &self.chunks
    }

    /// Prior answers kept, most similar first
    pub fn prior_answers(&self) -> &[String] {
        &self.prior_answers
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.prior_answers.is_empty()
    }

    /// Characters of chunk text plus prior answers
    pub fn char_len(&self) -> usize {
        self.chunks.iter().map(|c| c.text.chars().count()).sum::<usize>()
            + self.prior_answers.iter().map(|a| a.chars().count()).sum::<usize>()
    }

    /// Distinct non-empty chunk URLs in rank order
    pub fn source_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for chunk in &self.chunks {
            if !chunk.url.is_empty() && !urls.contains(&chunk.url) {
                urls.push(chunk.url.clone());
            }
        }
        urls
    }

    /// Prompt text: numbered sources, then previous answers
    pub fn render(&self) -> String {
        let mut out = String::new();

        if !self.chunks.is_empty() {
            out.push_str("<sources>\n");
            for (i, chunk) in self.chunks.iter().enumerate() {
                let url = if chunk.url.is_empty() { "no url" } else { chunk.url.as_str() };
                out.push_str(&format!("[{}] ({})\n{}\n\n", i + 1, url, chunk.text.trim()));
            }
            out.push_str("</sources>\n");
        }

        if !self.prior_answers.is_empty() {
            out.push_str("<previous_answers>\nAnswers previously given to this user:\n");
            for answer in &self.prior_answers {
                out.push_str(&format!("- {}\n", answer));
            }
            out.push_str("</previous_answers>\n");
        }

        out
    }
}

/// Builds [`Context`] values under a fixed character budget
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Lowest-score chunks are dropped first, then the least similar prior
    /// answers. A single item still over budget is cut at a char boundary.
    pub fn assemble(&self, chunks: &[ContentChunk], prior_answers: &[String]) -> Context {
        let mut chunks: Vec<ContentChunk> = chunks
            .iter()
            .filter(|c| !c.text.trim().is_empty())
            .cloned()
            .collect();
        // stable: ties keep retrieval order
        chunks.sort_by(|a, b| b.score.total_cmp(&a.score));

        let prior_answers: Vec<String> = prior_answers
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let mut context = Context {
            chunks,
            prior_answers,
        };

        if self.max_chars == 0 {
            return Context::default();
        }

        let mut total = context.char_len();
        while total > self.max_chars && context.chunks.len() + context.prior_answers.len() > 1 {
            if let Some(dropped) = context.chunks.pop() {
                total -= dropped.text.chars().count();
            } else if let Some(dropped) = context.prior_answers.pop() {
                total -= dropped.chars().count();
            }
        }

        if total > self.max_chars {
            if let Some(chunk) = context.chunks.first_mut() {
                chunk.text = truncate_chars(&chunk.text, self.max_chars);
            } else if let Some(answer) = context.prior_answers.first_mut() {
                *answer = truncate_chars(answer, self.max_chars);
            }
        }

        context
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, score: f32, text: &str, url: &str) -> ContentChunk {
        ContentChunk {
            id: id.to_string(),
            score,
            text: text.to_string(),
            url: url.to_string(),
            url_id: String::new(),
            parent_id: String::new(),
        }
    }

    #[test]
    fn test_empty_inputs_give_empty_context() {
        let context = ContextAssembler::new(100).assemble(&[], &[]);
        assert!(context.is_empty());
        assert_eq!(context.render(), "");
        assert!(context.source_urls().is_empty());
    }

    #[test]
    fn test_chunks_sorted_by_score() {
        let context = ContextAssembler::new(1000).assemble(
            &[chunk("a", 0.2, "low", "u/a"), chunk("b", 0.9, "high", "u/b")],
            &[],
        );
        assert_eq!(context.chunks()[0].id, "b");
        assert_eq!(context.source_urls(), vec!["u/b", "u/a"]);
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let chunks = vec![
            chunk("a", 0.5, "alpha", "u/a"),
            chunk("b", 0.5, "beta", "u/b"),
            chunk("c", 0.7, "gamma", "u/c"),
        ];
        let answers = vec!["earlier answer".to_string()];
        let assembler = ContextAssembler::new(15);

        let first = assembler.assemble(&chunks, &answers);
        let second = assembler.assemble(&chunks, &answers);
        assert_eq!(first, second);
        assert_eq!(first.render(), second.render());
    }

    #[test]
    fn test_over_budget_drops_lowest_score_chunks_first() {
        let chunks = vec![
            chunk("top", 0.9, "0123456789", "u/top"),
            chunk("mid", 0.5, "0123456789", "u/mid"),
            chunk("low", 0.1, "0123456789", "u/low"),
        ];
        let answers = vec!["abcde".to_string()];

        let context = ContextAssembler::new(24).assemble(&chunks, &answers);
        let ids: Vec<&str> = context.chunks().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["top"]);
        assert_eq!(context.prior_answers(), ["abcde".to_string()]);
        assert!(context.char_len() <= 24);
    }

    #[test]
    fn test_answers_dropped_after_chunks() {
        let answers = vec!["first answer".to_string(), "second answer".to_string()];
        let context = ContextAssembler::new(12).assemble(&[chunk("a", 0.9, "0123456789", "u")], &answers);
        assert!(context.chunks().is_empty());
        assert_eq!(context.prior_answers(), ["first answer".to_string()]);
    }

    #[test]
    fn test_single_oversized_item_is_truncated() {
        let context = ContextAssembler::new(4).assemble(&[chunk("a", 0.9, "héllo wörld", "u")], &[]);
        assert_eq!(context.chunks()[0].text, "héll");
    }

    #[test]
    fn test_blank_items_are_dropped() {
        let context = ContextAssembler::new(100).assemble(
            &[chunk("a", 0.9, "   ", "u/a")],
            &["".to_string(), "  kept ".to_string()],
        );
        assert!(context.chunks().is_empty());
        assert_eq!(context.prior_answers(), ["kept".to_string()]);
    }

    #[test]
    fn test_render_lists_sources_and_answers() {
        let context = ContextAssembler::new(1000).assemble(
            &[chunk("a", 0.9, "SSO setup guide...", "https://docs.example.com/sso")],
            &["Use SAML.".to_string()],
        );
        let rendered = context.render();
        assert!(rendered.contains("[1] (https://docs.example.com/sso)"));
        assert!(rendered.contains("SSO setup guide..."));
        assert!(rendered.contains("- Use SAML."));
    }
}
