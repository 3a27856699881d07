//! Query generation: topic + prior learnings into distinct search queries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::decode::{decode, Decoded};
use super::prompts;
use super::Researcher;
use crate::cache::{fingerprint, list_fingerprint};

pub const DEFAULT_NUM_QUERIES: usize = 3;

/// A search query with the goal it is meant to serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchQuery {
    pub query: String,
    #[serde(default)]
    pub research_goal: String,
}

#[derive(Debug, Deserialize)]
struct QueryReply {
    queries: Vec<ResearchQuery>,
}

/// Cache key. Default-valued inputs are left out so calls differing only by
/// defaults share an entry.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryKey<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "is_default_count")]
    num_queries: usize,
    #[serde(skip_serializing_if = "is_blank")]
    research_goal: &'a str,
    #[serde(skip_serializing_if = "String::is_empty")]
    learnings: String,
    depth: u32,
    breadth: usize,
}

fn is_default_count(n: &usize) -> bool {
    *n == DEFAULT_NUM_QUERIES
}

fn is_blank(s: &&str) -> bool {
    s.trim().is_empty()
}

/// Case- and whitespace-insensitive identity of a query.
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop blank and repeated queries, then keep the first `limit`.
fn dedupe_queries(queries: Vec<ResearchQuery>, limit: usize) -> Vec<ResearchQuery> {
    let mut seen = HashSet::new();
    let mut out: Vec<ResearchQuery> = queries
        .into_iter()
        .filter_map(|mut q| {
            q.query = q.query.trim().to_string();
            let key = normalize_query(&q.query);
            (!key.is_empty() && seen.insert(key)).then_some(q)
        })
        .collect();
    out.truncate(limit);
    out
}

impl Researcher {
    /// Ask the completion provider for up to `num_queries` sub-queries.
    ///
    /// Never fails: provider and parse errors are logged and yield `[]`.
    pub async fn generate_queries(
        &self,
        query: &str,
        num_queries: usize,
        learnings: &[String],
        research_goal: &str,
        depth: u32,
        breadth: usize,
    ) -> Vec<ResearchQuery> {
        if num_queries == 0 {
            return vec![];
        }

        let key = fingerprint(&QueryKey {
            query,
            num_queries,
            research_goal,
            learnings: list_fingerprint(learnings),
            depth,
            breadth,
        })
        .unwrap_or_else(|| query.to_string());

        if let Some(cached) = self.caches.queries.get(&key) {
            debug!(query, count = cached.len(), "Using cached queries");
            return cached;
        }

        let prompt = prompts::query_prompt(query, num_queries, learnings, research_goal);
        let reply = match self.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(query, "Query generation failed: {:#}", e);
                return vec![];
            }
        };

        let queries = match decode::<QueryReply>(&reply) {
            Decoded::Parsed(parsed) => dedupe_queries(parsed.queries, num_queries),
            Decoded::Rejected(reason) => {
                warn!(query, "Discarding query generation reply: {}", reason);
                return vec![];
            }
        };

        debug!(query, count = queries.len(), "Generated queries");
        if !queries.is_empty() {
            self.caches.queries.set(key, queries.clone());
        }
        queries
    }
}
