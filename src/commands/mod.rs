mod config;
mod feedback;
mod report;
mod research;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};

use crate::config::ResearchConfig;
use crate::llm::LlmClient;
use crate::research::{ResearchCaches, Researcher};
use crate::search::{SearchClient, SearchOptions, SearchProvider, SearchResponse};

/// Deep research - recursive web research with an LLM
#[derive(Parser, Debug)]
#[command(name = "deep-research", version, about)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Research a topic and write a report
    Research(research::ResearchArgs),
    /// Write a report from a saved findings file
    Report(report::ReportArgs),
    /// Ask clarifying questions about a query
    Feedback(feedback::FeedbackArgs),
    /// Show the effective configuration
    Config,
}

/// CLI overrides applied on top of the environment.
#[derive(Args, Debug, Default)]
pub struct ConfigOverrides {
    /// Max concurrent provider calls across the research tree
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Stop expanding a branch once it has seen more than this many URLs
    #[arg(long, global = true)]
    pub max_urls: Option<usize>,

    /// Search timeout in milliseconds
    #[arg(long, global = true)]
    pub search_timeout_ms: Option<u64>,

    /// Learnings kept per search query
    #[arg(long, global = true)]
    pub learnings_per_query: Option<usize>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ResearchConfig) {
        if let Some(n) = self.concurrency {
            config.concurrency_limit = n;
        }
        if let Some(n) = self.max_urls {
            config.max_visited_urls = n;
        }
        if let Some(ms) = self.search_timeout_ms {
            config.search_timeout = std::time::Duration::from_millis(ms);
        }
        if let Some(n) = self.learnings_per_query {
            config.learnings_per_query = n;
        }
    }
}

/// Stand-in for commands that never search.
struct NoSearch;

#[async_trait]
impl SearchProvider for NoSearch {
    async fn search(&self, _query: &str, _options: &SearchOptions) -> Result<SearchResponse> {
        bail!("search is not configured for this command")
    }
}

fn build_researcher(config: ResearchConfig, with_search: bool) -> Result<Researcher> {
    let llm = Arc::new(LlmClient::from_env()?);
    tracing::info!(model = llm.model(), "LLM client initialized");

    let search: Arc<dyn SearchProvider> = if with_search {
        Arc::new(SearchClient::from_env()?)
    } else {
        Arc::new(NoSearch)
    };
    let caches = ResearchCaches::new(&config);
    Researcher::new(llm, search, config, caches)
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = ResearchConfig::from_env()?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    match cli.command {
        Command::Config => config::show(&config),
        Command::Research(args) => {
            let researcher = build_researcher(config, true)?;
            research::run(&researcher, args).await
        }
        Command::Report(args) => {
            let researcher = build_researcher(config, false)?;
            report::run(&researcher, args).await
        }
        Command::Feedback(args) => {
            let researcher = build_researcher(config, false)?;
            feedback::run(&researcher, args).await
        }
    }
}
