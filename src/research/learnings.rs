//! Result processing: search hits into distilled learnings and follow-up questions.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::decode::{decode, Decoded};
use super::prompts;
use super::sources::unique;
use super::Researcher;
use crate::search::SearchHit;
use crate::text::trim_to_tokens;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedResults {
    pub learnings: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LearningReply {
    learnings: Vec<String>,
    #[serde(default)]
    follow_up_questions: Vec<String>,
}

static STEP_PATTERN: OnceLock<Regex> = OnceLock::new();
static BRACKET_PATTERN: OnceLock<Regex> = OnceLock::new();

fn step_pattern() -> &'static Regex {
    STEP_PATTERN.get_or_init(|| Regex::new(r"^Step \d+:").expect("valid step regex"))
}

fn bracket_pattern() -> &'static Regex {
    BRACKET_PATTERN.get_or_init(|| Regex::new(r"\[.*?\]").expect("valid bracket regex"))
}

/// True for strings that read like leaked reasoning rather than findings.
fn is_meta_commentary(learning: &str) -> bool {
    learning.contains("INTERNAL PROCESS:")
        || learning.starts_with("OUTLINE:")
        || step_pattern().is_match(learning)
}

/// Drop meta-commentary, strip `[...]` reference markers, drop blanks and repeats.
pub fn sanitize_learnings(raw: Vec<String>) -> Vec<String> {
    unique(raw.into_iter().filter_map(|learning| {
        let trimmed = learning.trim();
        if is_meta_commentary(trimmed) {
            debug!(learning = trimmed, "Dropping meta-commentary learning");
            return None;
        }
        let stripped = bracket_pattern().replace_all(trimmed, "");
        let cleaned = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
        (!cleaned.is_empty()).then_some(cleaned)
    }))
}

impl Researcher {
    /// Distill search hits into at most `num_learnings` learnings.
    ///
    /// Page text is trimmed, concatenated and chunked before any provider
    /// call. Every chunk is processed; truncation happens once at the end.
    /// Chunks whose reply fails or does not decode contribute nothing.
    pub async fn process_results(
        &self,
        query: &str,
        hits: &[SearchHit],
        num_learnings: usize,
        num_follow_ups: usize,
    ) -> ProcessedResults {
        let count = |text: &str| self.count_tokens(text);

        let contents: Vec<String> = hits
            .iter()
            .filter_map(SearchHit::content)
            .map(|content| trim_to_tokens(&content, self.config.page_token_limit, count))
            .filter(|content| !content.trim().is_empty())
            .collect();
        if contents.is_empty() {
            debug!(query, "No page content to process");
            return ProcessedResults::default();
        }

        let chunks = self.splitter.split(&contents.join("\n\n"), count);
        let first = hits.first();
        let title = first
            .and_then(|h| h.title.as_deref())
            .unwrap_or("Untitled");
        let url = first.and_then(|h| h.url.as_deref()).unwrap_or("unknown");
        debug!(query, pages = contents.len(), chunks = chunks.len(), "Processing content");

        let mut learnings = Vec::new();
        let mut follow_ups = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let prompt =
                prompts::learning_prompt(query, num_learnings, num_follow_ups, title, url, chunk);
            let reply = match self.complete(&prompt).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(query, chunk = i, "Learning extraction failed: {:#}", e);
                    continue;
                }
            };
            match decode::<LearningReply>(&reply) {
                Decoded::Parsed(parsed) => {
                    learnings.extend(parsed.learnings);
                    follow_ups.extend(parsed.follow_up_questions);
                }
                Decoded::Rejected(reason) => {
                    warn!(query, chunk = i, "Discarding learning reply: {}", reason);
                }
            }
        }

        let mut learnings = sanitize_learnings(learnings);
        learnings.truncate(num_learnings);

        let mut follow_up_questions = unique(
            follow_ups
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
        );
        follow_up_questions.truncate(num_follow_ups);

        ProcessedResults {
            learnings,
            follow_up_questions,
        }
    }
}
