use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::research::sources::unique;
use crate::research::Researcher;

/// Saved output of a research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Findings {
    pub query: String,
    #[serde(default)]
    pub learnings: Vec<String>,
    #[serde(default)]
    pub visited_urls: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Findings JSON written by `research --findings`
    #[arg(long)]
    pub findings: PathBuf,

    /// Use this prompt instead of the saved query
    #[arg(long)]
    pub prompt: Option<String>,

    /// Where to write the report
    #[arg(short, long, default_value = "output.md")]
    pub output: PathBuf,
}

pub async fn write_findings(path: &Path, findings: &Findings) -> Result<()> {
    let json = serde_json::to_string_pretty(findings)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write findings to {}", path.display()))
}

pub async fn read_findings(path: &Path) -> Result<Findings> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read findings from {}", path.display()))?;
    let mut findings: Findings = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a findings file", path.display()))?;
    if findings.query.trim().is_empty() {
        bail!("{} has an empty query", path.display());
    }
    findings.learnings = unique(findings.learnings);
    findings.visited_urls = unique(findings.visited_urls);
    Ok(findings)
}

pub async fn run(researcher: &Researcher, args: ReportArgs) -> Result<()> {
    let findings = read_findings(&args.findings).await?;
    let prompt = args.prompt.unwrap_or_else(|| findings.query.clone());
    info!(
        learnings = findings.learnings.len(),
        sources = findings.visited_urls.len(),
        "Loaded findings"
    );

    let report = researcher
        .write_final_report(&prompt, &findings.learnings, &findings.visited_urls)
        .await;

    tokio::fs::write(&args.output, &report)
        .await
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;
    info!(path = %args.output.display(), "Report saved");

    println!("{}", report);
    Ok(())
}
