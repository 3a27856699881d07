//! Final report synthesis: outline, body, summary and title, assembled into markdown.

use serde::Serialize;
use tracing::{info, warn};

use super::prompts;
use super::Researcher;
use crate::cache::{fingerprint, list_fingerprint};

pub const OUTLINE_PLACEHOLDER: &str = "Outline could not be generated.";
pub const REPORT_PLACEHOLDER: &str = "Report could not be generated.";
pub const SUMMARY_PLACEHOLDER: &str = "Summary could not be generated.";
pub const TITLE_PLACEHOLDER: &str = "Title could not be generated.";

#[derive(Serialize)]
struct ReportKey<'a> {
    prompt: &'a str,
    learnings: String,
    visited_urls: String,
}

/// The four generated sections of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSections {
    pub title: String,
    pub summary: String,
    pub outline: String,
    pub body: String,
}

/// Lay out a finished report. Section order is fixed.
pub fn assemble_report(
    sections: &ReportSections,
    learnings: &[String],
    visited_urls: &[String],
) -> String {
    let mut doc = String::new();
    doc.push_str(&format!("# {}\n\n", sections.title));
    doc.push_str(&format!("## Summary\n\n{}\n\n", sections.summary));
    doc.push_str(&format!("## Outline\n\n{}\n\n", sections.outline));
    doc.push_str(&format!("## Report\n\n{}\n\n", sections.body));

    doc.push_str("## Learnings\n\n");
    for learning in learnings {
        doc.push_str(&format!("- {}\n", learning));
    }
    doc.push_str("\n## Sources\n\n");
    for url in visited_urls {
        doc.push_str(&format!("- {}\n", url));
    }
    doc
}

/// Title replies sometimes come back as a markdown heading or quoted.
fn clean_title(raw: &str) -> String {
    let line = raw.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    line.trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

impl Researcher {
    /// Write the final report. Each stage degrades to a placeholder on
    /// failure, so this always returns a document.
    pub async fn write_final_report(
        &self,
        prompt: &str,
        learnings: &[String],
        visited_urls: &[String],
    ) -> String {
        let key = fingerprint(&ReportKey {
            prompt,
            learnings: list_fingerprint(learnings),
            visited_urls: list_fingerprint(visited_urls),
        });
        if let Some(report) = key.as_ref().and_then(|k| self.caches.reports.get(k)) {
            info!("Using cached report");
            return report;
        }

        info!(
            learnings = learnings.len(),
            sources = visited_urls.len(),
            "Writing final report"
        );

        let outline = self
            .report_stage("outline", &prompts::outline_prompt(prompt, learnings))
            .await;
        let outline_text = outline.as_deref().unwrap_or(OUTLINE_PLACEHOLDER);
        let body = self
            .report_stage("report", &prompts::report_prompt(outline_text, learnings))
            .await;
        let summary = self
            .report_stage("summary", &prompts::summary_prompt(learnings))
            .await;
        let title = self
            .report_stage("title", &prompts::title_prompt(prompt, learnings))
            .await
            .map(|t| clean_title(&t))
            .filter(|t| !t.is_empty());

        let degraded =
            outline.is_none() || body.is_none() || summary.is_none() || title.is_none();
        let sections = ReportSections {
            title: title.unwrap_or_else(|| TITLE_PLACEHOLDER.to_string()),
            summary: summary.unwrap_or_else(|| SUMMARY_PLACEHOLDER.to_string()),
            body: body.unwrap_or_else(|| REPORT_PLACEHOLDER.to_string()),
            outline: outline.unwrap_or_else(|| OUTLINE_PLACEHOLDER.to_string()),
        };

        let report = assemble_report(&sections, learnings, visited_urls);

        // Reports with placeholder sections are not cached.
        match key {
            Some(key) if !degraded => self.caches.reports.set(key, report.clone()),
            Some(_) => warn!("Report has placeholder sections, not caching"),
            None => {}
        }
        report
    }

    async fn report_stage(&self, stage: &'static str, prompt: &str) -> Option<String> {
        match self.complete(prompt).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                warn!(stage, "Report stage returned nothing");
                None
            }
            Err(e) => {
                warn!(stage, "Report stage failed: {:#}", e);
                None
            }
        }
    }
}
