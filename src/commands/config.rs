use anyhow::Result;

use crate::config::ResearchConfig;

/// Render the effective configuration, one `key: value` per line.
pub fn render(config: &ResearchConfig) -> String {
    let env_or = |key: &str, default: &str| {
        dotenv::var(key)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };
    let key_state = |key: &str| {
        if dotenv::var(key).map(|v| !v.is_empty()).unwrap_or(false) {
            "set"
        } else {
            "unset"
        }
    };

    [
        ("concurrency_limit", config.concurrency_limit.to_string()),
        ("max_visited_urls", config.max_visited_urls.to_string()),
        ("search_timeout_ms", config.search_timeout.as_millis().to_string()),
        (
            "completion_timeout_ms",
            config.completion_timeout.as_millis().to_string(),
        ),
        ("completion_retries", config.completion_retries.to_string()),
        ("learnings_per_query", config.learnings_per_query.to_string()),
        ("chunk_size", config.chunk_size.to_string()),
        ("chunk_overlap", config.chunk_overlap.to_string()),
        ("page_token_limit", config.page_token_limit.to_string()),
        ("query_cache_size", config.query_cache_size.to_string()),
        ("report_cache_size", config.report_cache_size.to_string()),
        ("feedback_cache_size", config.feedback_cache_size.to_string()),
        ("llm_base_url", env_or("LLM_BASE_URL", "http://localhost:1234/v1")),
        ("llm_model", env_or("LLM_MODEL", "qwen/qwen3-8b")),
        ("llm_api_key", key_state("LLM_API_KEY").to_string()),
        ("firecrawl_base_url", env_or("FIRECRAWL_BASE_URL", "https://api.firecrawl.dev")),
        ("firecrawl_api_key", key_state("FIRECRAWL_API_KEY").to_string()),
    ]
    .iter()
    .map(|(k, v)| format!("{}: {}", k, v))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn show(config: &ResearchConfig) -> Result<()> {
    println!("{}", render(config));
    Ok(())
}
