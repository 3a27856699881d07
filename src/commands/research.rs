use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info};

use super::report::{write_findings, Findings};
use crate::research::feedback::FeedbackRequest;
use crate::research::progress::{ProgressCallback, ResearchProgress};
use crate::research::Researcher;

#[derive(Args, Debug)]
pub struct ResearchArgs {
    /// What to research
    pub query: String,

    /// Levels of follow-up research (1-5)
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=5))]
    pub depth: u32,

    /// Sub-queries per level, halved at each level (1-5)
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=5))]
    pub breadth: u32,

    /// Learnings already known; repeat for several
    #[arg(long = "learning")]
    pub learnings: Vec<String>,

    /// Print clarifying questions before researching
    #[arg(long)]
    pub clarify: bool,

    /// Where to write the report
    #[arg(short, long, default_value = "output.md")]
    pub output: PathBuf,

    /// Also save learnings and sources as JSON, for the `report` command
    #[arg(long)]
    pub findings: Option<PathBuf>,
}

fn percent(done: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        done * 100 / total
    }
}

/// One-line progress summary.
pub fn render_progress(p: &ResearchProgress) -> String {
    let depth_done = p.total_depth.saturating_sub(p.current_depth) as usize;
    let breadth_done = p.total_breadth.saturating_sub(p.current_breadth);
    let mut line = format!(
        "depth {}% | breadth {}% | queries {}/{} ({}%)",
        percent(depth_done, p.total_depth as usize),
        percent(breadth_done, p.total_breadth),
        p.completed_queries,
        p.total_queries,
        percent(p.completed_queries, p.total_queries),
    );
    if let Some(q) = &p.current_query {
        line.push_str(&format!(" | {}", q));
    }
    line
}

/// Clarifying-question request for a research run, seeded with known learnings.
fn clarify_request(args: &ResearchArgs) -> FeedbackRequest {
    FeedbackRequest {
        existing_learnings: args.learnings.clone(),
        ..FeedbackRequest::new(&args.query)
    }
}

pub async fn run(researcher: &Researcher, args: ResearchArgs) -> Result<()> {
    if args.clarify {
        let feedback = researcher.generate_feedback(&clarify_request(&args)).await;
        if let Some(analysis) = &feedback.analysis {
            println!("{}\n", analysis);
        }
        for (i, q) in feedback.follow_up_questions.iter().enumerate() {
            println!("{}. {}", i + 1, q);
        }
        println!();
    }

    debug!(
        concurrency = researcher.config().concurrency_limit,
        max_urls = researcher.config().max_visited_urls,
        "Research limits"
    );
    let on_progress: ProgressCallback = Arc::new(|p: &ResearchProgress| {
        info!(target: "progress", "{}", render_progress(p));
    });

    let outcome = researcher
        .research(
            &args.query,
            args.depth,
            args.breadth as usize,
            args.learnings,
            Some(on_progress),
        )
        .await;

    let caches = researcher.caches();
    debug!(
        queries = ?caches.queries.stats(),
        reports = ?caches.reports.stats(),
        "Cache usage"
    );

    tokio::fs::write(&args.output, &outcome.report)
        .await
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;
    info!(path = %args.output.display(), "Report saved");

    if let Some(path) = &args.findings {
        let findings = Findings {
            query: args.query.clone(),
            learnings: outcome.result.learnings.clone(),
            visited_urls: outcome.result.visited_urls.clone(),
        };
        write_findings(path, &findings).await?;
        info!(path = %path.display(), "Findings saved");
    }

    println!("{}", outcome.report);
    Ok(())
}
