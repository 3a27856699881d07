use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};

/// Tunable research parameters. Loaded from the environment, overridable from the CLI.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Max branch units running provider calls at once, across the whole tree.
    pub concurrency_limit: usize,
    /// A branch stops expanding once its inherited URL set grows past this.
    pub max_visited_urls: usize,
    pub search_timeout: Duration,
    pub completion_timeout: Duration,
    /// Extra attempts after a failed completion call.
    pub completion_retries: u32,
    pub learnings_per_query: usize,
    /// Chunk size in tokens, applied before any provider limit is reached.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Each fetched page is trimmed to this many tokens before chunking.
    pub page_token_limit: usize,
    pub query_cache_size: usize,
    pub report_cache_size: usize,
    pub feedback_cache_size: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            max_visited_urls: 20,
            search_timeout: Duration::from_millis(15_000),
            completion_timeout: Duration::from_millis(120_000),
            completion_retries: 2,
            learnings_per_query: 3,
            chunk_size: 4_000,
            chunk_overlap: 100,
            page_token_limit: 20_000,
            query_cache_size: 50,
            report_cache_size: 20,
            feedback_cache_size: 50,
        }
    }
}

impl ResearchConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            concurrency_limit: env_or("RESEARCH_CONCURRENCY", defaults.concurrency_limit)?,
            max_visited_urls: env_or("RESEARCH_MAX_VISITED_URLS", defaults.max_visited_urls)?,
            search_timeout: env_millis("RESEARCH_SEARCH_TIMEOUT_MS", defaults.search_timeout)?,
            completion_timeout: env_millis(
                "RESEARCH_COMPLETION_TIMEOUT_MS",
                defaults.completion_timeout,
            )?,
            completion_retries: env_or(
                "RESEARCH_COMPLETION_RETRIES",
                defaults.completion_retries,
            )?,
            learnings_per_query: env_or(
                "RESEARCH_LEARNINGS_PER_QUERY",
                defaults.learnings_per_query,
            )?,
            chunk_size: env_or("RESEARCH_CHUNK_TOKENS", defaults.chunk_size)?,
            chunk_overlap: env_or("RESEARCH_CHUNK_OVERLAP_TOKENS", defaults.chunk_overlap)?,
            page_token_limit: env_or("RESEARCH_PAGE_TOKEN_LIMIT", defaults.page_token_limit)?,
            query_cache_size: env_or("RESEARCH_QUERY_CACHE_SIZE", defaults.query_cache_size)?,
            report_cache_size: env_or("RESEARCH_REPORT_CACHE_SIZE", defaults.report_cache_size)?,
            feedback_cache_size: env_or(
                "RESEARCH_FEEDBACK_CACHE_SIZE",
                defaults.feedback_cache_size,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every field, reporting all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.concurrency_limit == 0 {
            errors.push("concurrency_limit must be at least 1".to_string());
        }
        if self.chunk_size == 0 {
            errors.push("chunk_size must be at least 1".to_string());
        }
        if self.chunk_overlap >= self.chunk_size {
            errors.push(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }
        if self.page_token_limit == 0 {
            errors.push("page_token_limit must be at least 1".to_string());
        }
        if self.search_timeout.is_zero() {
            errors.push("search_timeout cannot be zero".to_string());
        }
        if self.completion_timeout.is_zero() {
            errors.push("completion_timeout cannot be zero".to_string());
        }
        for (name, size) in [
            ("query_cache_size", self.query_cache_size),
            ("report_cache_size", self.report_cache_size),
            ("feedback_cache_size", self.feedback_cache_size),
        ] {
            if size == 0 {
                errors.push(format!("{} must be at least 1", name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!("Invalid research configuration: {}", errors.join("; "))
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match dotenv::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(e) => bail!("{} has an invalid value {:?}: {}", key, raw, e),
        },
        _ => Ok(default),
    }
}

fn env_millis(key: &str, default: Duration) -> Result<Duration> {
    let ms = env_or(key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ResearchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency_limit, 5);
        assert_eq!(config.max_visited_urls, 20);
        assert_eq!(config.search_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let config = ResearchConfig {
            concurrency_limit: 0,
            chunk_size: 100,
            chunk_overlap: 100,
            report_cache_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("concurrency_limit"));
        assert!(err.contains("chunk_overlap"));
        assert!(err.contains("report_cache_size"));
        assert!(!err.contains("query_cache_size"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ResearchConfig {
            search_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
