pub mod decode;
pub mod feedback;
pub mod learnings;
pub mod progress;
pub mod prompts;
pub mod queries;
pub mod report;
pub mod sources;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info, warn};

use crate::cache::LruCache;
use crate::config::ResearchConfig;
use crate::llm::CompletionProvider;
use crate::search::{SearchOptions, SearchProvider};
use crate::text::TextSplitter;

use feedback::Feedback;
use progress::{CompletionGuard, ProgressCallback, ProgressTracker};
use queries::{normalize_query, ResearchQuery};

/// Upper bound on the extra time a search call gets beyond its own timeout.
const MAX_SEARCH_GRACE: Duration = Duration::from_secs(1);
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Learnings and sources gathered by one subtree. Both lists are deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResult {
    pub learnings: Vec<String>,
    pub visited_urls: Vec<String>,
}

impl ResearchResult {
    /// Set union with `other`, keeping first-seen order.
    pub fn merge(&mut self, other: ResearchResult) {
        sources::merge_unique(&mut self.learnings, other.learnings);
        sources::merge_unique(&mut self.visited_urls, other.visited_urls);
    }
}

/// A finished run: the merged findings and the synthesized report.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub result: ResearchResult,
    pub report: String,
}

/// One node of the research tree.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    pub query: String,
    pub depth: u32,
    pub breadth: usize,
    pub research_goal: String,
    /// Learnings inherited from the path root..=self.
    pub learnings: Vec<String>,
    pub visited_urls: Vec<String>,
    /// Normalized sub-queries already issued on the ancestor path.
    pub issued_queries: HashSet<String>,
}

impl Branch {
    pub fn root(query: &str, depth: u32, breadth: usize, learnings: Vec<String>) -> Self {
        Self {
            query: query.to_string(),
            depth,
            breadth,
            learnings,
            ..Default::default()
        }
    }
}

/// Process-wide caches, built once and handed to the [`Researcher`].
#[derive(Clone)]
pub struct ResearchCaches {
    pub queries: Arc<LruCache<String, Vec<ResearchQuery>>>,
    pub reports: Arc<LruCache<String, String>>,
    pub feedback: Arc<LruCache<String, Feedback>>,
}

impl ResearchCaches {
    pub fn new(config: &ResearchConfig) -> Self {
        Self {
            queries: Arc::new(LruCache::new("queries", config.query_cache_size)),
            reports: Arc::new(LruCache::new("reports", config.report_cache_size)),
            feedback: Arc::new(LruCache::new("feedback", config.feedback_cache_size)),
        }
    }
}

/// Recursive research engine.
///
/// Expands a query into sub-queries, searches and distills each one under a
/// tree-wide concurrency limit, and recurses with halved breadth until the
/// depth budget runs out. Provider failures never escape a branch.
pub struct Researcher {
    llm: Arc<dyn CompletionProvider>,
    search: Arc<dyn SearchProvider>,
    config: ResearchConfig,
    limiter: Semaphore,
    splitter: TextSplitter,
    caches: ResearchCaches,
}

impl Researcher {
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        search: Arc<dyn SearchProvider>,
        config: ResearchConfig,
        caches: ResearchCaches,
    ) -> Result<Self> {
        config.validate()?;
        let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            llm,
            search,
            limiter: Semaphore::new(config.concurrency_limit),
            splitter,
            config,
            caches,
        })
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn caches(&self) -> &ResearchCaches {
        &self.caches
    }

    /// Run the research tree, then write the final report.
    pub async fn research(
        &self,
        query: &str,
        depth: u32,
        breadth: usize,
        existing_learnings: Vec<String>,
        on_progress: Option<ProgressCallback>,
    ) -> ResearchOutcome {
        let tracker = ProgressTracker::new(depth, breadth, on_progress);
        info!(query, depth, breadth, "Starting research");

        let mut result = ResearchResult {
            learnings: sources::unique(existing_learnings.iter().cloned()),
            visited_urls: vec![],
        };
        let tree = self
            .deep_research(Branch::root(query, depth, breadth, existing_learnings), &tracker)
            .await;
        result.merge(tree);

        let done = tracker.snapshot();
        info!(
            learnings = result.learnings.len(),
            sources = result.visited_urls.len(),
            completed = done.completed_queries,
            total = done.total_queries,
            "Research tree finished"
        );

        let report = self
            .write_final_report(query, &result.learnings, &result.visited_urls)
            .await;
        ResearchOutcome { result, report }
    }

    /// The scheduler: expand `branch`, run every sub-query, merge what comes back.
    pub fn deep_research<'a>(
        &'a self,
        branch: Branch,
        progress: &'a ProgressTracker,
    ) -> BoxFuture<'a, ResearchResult> {
        async move {
            if branch.depth == 0 || branch.visited_urls.len() > self.config.max_visited_urls {
                debug!(
                    query = %branch.query,
                    depth = branch.depth,
                    urls = branch.visited_urls.len(),
                    "Branch budget exhausted"
                );
                return ResearchResult {
                    learnings: branch.learnings,
                    visited_urls: branch.visited_urls,
                };
            }

            let queries = {
                let _permit = self.permit().await.ok();
                self.generate_queries(
                    &branch.query,
                    branch.breadth,
                    &branch.learnings,
                    &branch.research_goal,
                    branch.depth,
                    branch.breadth,
                )
                .await
            };
            if queries.is_empty() {
                info!(query = %branch.query, depth = branch.depth, "No sub-queries, branch ends here");
                return ResearchResult::default();
            }

            progress.expanded(branch.depth, branch.breadth, queries.len());
            let next_breadth = branch.breadth.div_ceil(2);
            debug!(
                query = %branch.query,
                depth = branch.depth,
                branches = queries.len(),
                next_breadth,
                "Dispatching sub-queries"
            );

            let results = join_all(
                queries
                    .into_iter()
                    .map(|sub| self.run_branch(&branch, sub, next_breadth, progress)),
            )
            .await;

            let mut merged = ResearchResult::default();
            for result in results {
                merged.merge(result);
            }
            merged
        }
        .boxed()
    }

    /// One branch unit. Always reports completion, never fails.
    async fn run_branch(
        &self,
        parent: &Branch,
        sub: ResearchQuery,
        next_breadth: usize,
        progress: &ProgressTracker,
    ) -> ResearchResult {
        let _done = CompletionGuard::new(progress, &sub.query);

        let key = normalize_query(&sub.query);
        if key.is_empty() || parent.issued_queries.contains(&key) {
            debug!(query = %sub.query, "Skipping already issued query");
            return ResearchResult::default();
        }

        let query = sub.query.clone();
        match self.explore(parent, sub, key, next_breadth, progress).await {
            Ok(result) => result,
            Err(e) => {
                warn!(query = %query, "Research branch failed: {:#}", e);
                ResearchResult::default()
            }
        }
    }

    async fn explore(
        &self,
        parent: &Branch,
        sub: ResearchQuery,
        key: String,
        next_breadth: usize,
        progress: &ProgressTracker,
    ) -> Result<ResearchResult> {
        let (visited_urls, processed) = {
            let _permit = self.permit().await?;
            let options = SearchOptions::markdown(self.config.search_timeout, parent.breadth);
            let response = tokio::time::timeout(
                search_deadline(self.config.search_timeout),
                self.search.search(&sub.query, &options),
            )
            .await
            .map_err(|_| anyhow!("search timed out after {:?}", self.config.search_timeout))??;

            let hits = match response.data {
                Some(hits) if !hits.is_empty() => hits,
                _ => {
                    info!(query = %sub.query, "Search returned no data");
                    return Ok(ResearchResult::default());
                }
            };

            let urls = sources::collect_urls(hits.iter().map(|h| h.url.as_deref()));
            let processed = self
                .process_results(
                    &sub.query,
                    &hits,
                    self.config.learnings_per_query,
                    next_breadth,
                )
                .await;
            (urls, processed)
        };

        info!(
            query = %sub.query,
            learnings = processed.learnings.len(),
            urls = visited_urls.len(),
            "Processed search results"
        );

        let own = ResearchResult {
            learnings: processed.learnings,
            visited_urls,
        };
        let next_depth = parent.depth.saturating_sub(1);
        if next_depth == 0 {
            return Ok(own);
        }

        let mut learnings = parent.learnings.clone();
        sources::merge_unique(&mut learnings, own.learnings.iter().cloned());
        let mut visited = parent.visited_urls.clone();
        sources::merge_unique(&mut visited, own.visited_urls.iter().cloned());
        let mut issued = parent.issued_queries.clone();
        issued.insert(key);

        let child = Branch {
            query: sub.query,
            depth: next_depth,
            breadth: next_breadth,
            research_goal: steer_goal(&sub.research_goal, &processed.follow_up_questions),
            learnings,
            visited_urls: visited,
            issued_queries: issued,
        };
        let subtree = self.deep_research(child, progress).await;

        let mut result = own;
        result.merge(subtree);
        Ok(result)
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>> {
        self.limiter
            .acquire()
            .await
            .map_err(|_| anyhow!("Semaphore closed"))
    }

    /// Completion call with a timeout and linear-backoff retries.
    pub(crate) async fn complete(&self, prompt: &str) -> Result<String> {
        let attempts = self.config.completion_retries + 1;
        let mut last_err = anyhow!("no completion attempted");
        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.completion_timeout, self.llm.generate(prompt))
                .await
            {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => last_err = e,
                Err(_) => {
                    last_err = anyhow!(
                        "completion timed out after {:?}",
                        self.config.completion_timeout
                    )
                }
            }
            if attempt < attempts {
                debug!(attempt, "Completion failed, retrying: {:#}", last_err);
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
        }
        Err(last_err)
    }

    pub(crate) fn count_tokens(&self, text: &str) -> usize {
        self.llm.count_tokens(text)
    }
}

/// How long to wait on a search asked to finish within `timeout`.
fn search_deadline(timeout: Duration) -> Duration {
    timeout + (timeout / 10).min(MAX_SEARCH_GRACE)
}

/// Fold follow-up questions into a child's research goal.
fn steer_goal(goal: &str, follow_ups: &[String]) -> String {
    if follow_ups.is_empty() {
        return goal.to_string();
    }
    let directions = follow_ups.join("\n");
    if goal.trim().is_empty() {
        format!("Follow-up research directions: {}", directions)
    } else {
        format!("{}\nFollow-up research directions: {}", goal, directions)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::testing::*;
    use super::*;
    use crate::search::SearchResponse;

    /// Sub-queries are "<topic>/<n>"; learnings name their query.
    fn tree_llm() -> Arc<ScriptedLlm> {
        ScriptedLlm::new(|prompt| {
            if prompt.contains("web search queries") {
                let topic = field(prompt, "Topic: ");
                let n: usize = field(prompt, "Generate up to ")
                    .split_whitespace()
                    .next()
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(0);
                let subs: Vec<String> = (0..n).map(|i| format!("{}/{}", topic, i)).collect();
                let refs: Vec<&str> = subs.iter().map(String::as_str).collect();
                Ok(query_reply(&refs))
            } else if prompt.contains("Extract up to") {
                let query = prompt
                    .split_once("<query>")
                    .and_then(|(_, r)| r.split_once("</query>"))
                    .map(|(q, _)| q.to_string())
                    .unwrap_or_default();
                Ok(serde_json::json!({
                    "learnings": [format!("learned {}", query), "shared fact"],
                    "followUpQuestions": []
                })
                .to_string())
            } else {
                Ok("text".to_string())
            }
        })
    }

    #[tokio::test]
    async fn test_depth_zero_returns_input_without_calls() {
        let llm = tree_llm();
        let search = ScriptedSearch::one_page_per_query();
        let r = researcher(llm.clone(), search.clone());
        let tracker = ProgressTracker::new(0, 3, None);

        let branch = Branch {
            query: "topic".into(),
            depth: 0,
            breadth: 3,
            learnings: vec!["known".into()],
            visited_urls: vec!["https://known.dev".into()],
            ..Default::default()
        };
        let result = r.deep_research(branch, &tracker).await;

        assert_eq!(result.learnings, vec!["known"]);
        assert_eq!(result.visited_urls, vec!["https://known.dev"]);
        assert_eq!(llm.calls(), 0);
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn test_url_ceiling_stops_expansion() {
        let llm = tree_llm();
        let search = ScriptedSearch::one_page_per_query();
        let r = researcher(llm.clone(), search.clone());
        let tracker = ProgressTracker::new(2, 2, None);

        let urls: Vec<String> = (0..21).map(|i| format!("https://u{}.dev", i)).collect();
        let branch = Branch {
            query: "topic".into(),
            depth: 2,
            breadth: 2,
            visited_urls: urls.clone(),
            ..Default::default()
        };
        let result = r.deep_research(branch, &tracker).await;
        assert_eq!(result.visited_urls, urls);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_tree_size_is_bounded() {
        let llm = tree_llm();
        let search = ScriptedSearch::one_page_per_query();
        let r = researcher(llm.clone(), search.clone());

        let outcome = r.research("root", 2, 2, vec![], None).await;

        // Root expands to 2, each child (breadth 1) to 1 more.
        assert_eq!(search.calls(), 4);
        assert!(search.calls() <= 2 * 2);
        assert_eq!(llm.calls_matching("web search queries"), 3);
        assert_eq!(outcome.result.visited_urls.len(), 4);
    }

    #[tokio::test]
    async fn test_terminates_for_small_budgets() {
        for depth in 0..=3u32 {
            for breadth in 0..=3usize {
                let llm = tree_llm();
                let search = ScriptedSearch::one_page_per_query();
                let r = researcher(llm, search.clone());
                r.research("t", depth, breadth, vec![], None).await;
                // Geometric bound: breadth, ceil(breadth/2), ... summed over levels.
                let mut bound = 0;
                let mut width = 1;
                let mut b = breadth;
                for _ in 0..depth {
                    width *= b;
                    bound += width;
                    b = b.div_ceil(2);
                }
                assert!(search.calls() <= bound, "depth {} breadth {}", depth, breadth);
            }
        }
    }

    #[tokio::test]
    async fn test_merge_is_set_union() {
        let llm = tree_llm();
        let search = ScriptedSearch::one_page_per_query();
        let r = researcher(llm, search);

        let outcome = r.research("root", 1, 2, vec![], None).await;
        let learnings = &outcome.result.learnings;

        assert!(learnings.contains(&"learned root/0".to_string()));
        assert!(learnings.contains(&"learned root/1".to_string()));
        assert_eq!(learnings.iter().filter(|l| *l == "shared fact").count(), 1);
        assert_eq!(learnings.len(), 3);
    }

    #[tokio::test]
    async fn test_null_search_data_degrades_to_empty() {
        let llm = tree_llm();
        let search = ScriptedSearch::new(|_| Ok(SearchResponse { data: None }));
        let r = researcher(llm, search.clone());

        let outcome = r.research("root", 2, 3, vec![], None).await;
        assert!(outcome.result.learnings.is_empty());
        assert!(outcome.result.visited_urls.is_empty());
        assert_eq!(search.calls(), 3);
    }

    #[tokio::test]
    async fn test_search_errors_are_contained() {
        let llm = tree_llm();
        let search = ScriptedSearch::new(|query| {
            if query.ends_with("/0") {
                anyhow::bail!("connection reset")
            }
            Ok(SearchResponse {
                data: Some(vec![page("https://ok.dev", "fine")]),
            })
        });
        let r = researcher(llm, search);

        let outcome = r.research("root", 1, 2, vec![], None).await;
        assert_eq!(outcome.result.visited_urls, vec!["https://ok.dev"]);
        assert!(outcome.result.learnings.contains(&"learned root/1".to_string()));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_bounded() {
        let llm = tree_llm();
        let search = ScriptedSearch::one_page_per_query();
        let r = researcher(llm, search);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |p: &progress::ResearchProgress| {
            sink.lock().unwrap().push(p.clone());
        });
        r.research("root", 2, 4, vec![], Some(callback)).await;

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        for pair in seen.windows(2) {
            assert!(pair[0].completed_queries <= pair[1].completed_queries);
            assert!(pair[0].current_depth >= pair[1].current_depth);
            assert!(pair[0].current_breadth >= pair[1].current_breadth);
        }
        for p in seen.iter() {
            assert!(p.completed_queries <= p.total_queries);
        }
        let last = seen.last().unwrap();
        // 4 root branches, each expanding to 2.
        assert_eq!(last.total_queries, 12);
        assert_eq!(last.completed_queries, 12);
        assert_eq!(last.current_depth, 1);
    }

    #[tokio::test]
    async fn test_two_branch_scenario_lists_sources() {
        let llm = ScriptedLlm::new(|prompt| {
            if prompt.contains("web search queries") {
                Ok(query_reply(&["a", "b"]))
            } else if prompt.contains("Extract up to") {
                Ok(r#"{"learnings": ["a fact"], "followUpQuestions": []}"#.to_string())
            } else {
                Ok("stage output".to_string())
            }
        });
        let search = ScriptedSearch::one_page_per_query();
        let r = researcher(llm, search.clone());

        let outcome = r.research("topic X", 1, 2, vec![], None).await;

        assert_eq!(search.calls(), 2);
        let mut urls = outcome.result.visited_urls.clone();
        urls.sort();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);

        let sources = outcome.report.split("## Sources").nth(1).unwrap();
        assert!(sources.contains("- https://example.com/a"));
        assert!(sources.contains("- https://example.com/b"));
    }

    #[tokio::test]
    async fn test_malformed_query_reply_yields_empty_contribution() {
        let llm = ScriptedLlm::new(|prompt| {
            if prompt.contains("web search queries") {
                Ok("Here are some queries: first, second".to_string())
            } else {
                Ok("stage output".to_string())
            }
        });
        let search = ScriptedSearch::one_page_per_query();
        let r = researcher(llm, search.clone());
        let tracker = ProgressTracker::new(2, 2, None);

        let result = r
            .deep_research(Branch::root("topic", 2, 2, vec!["kept".into()]), &tracker)
            .await;
        assert_eq!(result, ResearchResult::default());
        assert_eq!(search.calls(), 0);
        assert_eq!(tracker.snapshot().total_queries, 0);
    }

    #[tokio::test]
    async fn test_repeated_query_is_not_searched_again() {
        // Every node proposes the same sub-query.
        let llm = ScriptedLlm::new(|prompt| {
            if prompt.contains("web search queries") {
                Ok(query_reply(&["Same  Query"]))
            } else if prompt.contains("Extract up to") {
                Ok(r#"{"learnings": ["x"], "followUpQuestions": ["why?"]}"#.to_string())
            } else {
                Ok("stage output".to_string())
            }
        });
        let search = ScriptedSearch::one_page_per_query();
        let r = researcher(llm, search.clone());

        r.research("root", 3, 1, vec![], None).await;
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn test_follow_ups_steer_child_goal() {
        let llm = ScriptedLlm::new(|prompt| {
            if prompt.contains("web search queries") {
                let topic = field(prompt, "Topic: ").to_string();
                Ok(query_reply(&[&format!("{} deeper", topic)]))
            } else if prompt.contains("Extract up to") {
                Ok(r#"{"learnings": ["x"], "followUpQuestions": ["what about cost?"]}"#.to_string())
            } else {
                Ok("stage output".to_string())
            }
        });
        let search = ScriptedSearch::one_page_per_query();
        let r = researcher(llm.clone(), search);

        r.research("root", 2, 1, vec![], None).await;
        let prompts = llm.prompts.lock().unwrap();
        let child = prompts
            .iter()
            .find(|p| p.contains("Topic: root deeper"))
            .unwrap();
        assert!(child.contains("Follow-up research directions: what about cost?"));
    }

    #[tokio::test]
    async fn test_existing_learnings_are_kept() {
        let llm = tree_llm();
        let search = ScriptedSearch::new(|_| Ok(SearchResponse { data: None }));
        let r = researcher(llm, search);

        let outcome = r
            .research("root", 1, 1, vec!["prior".into(), "prior".into()], None)
            .await;
        assert_eq!(outcome.result.learnings, vec!["prior"]);
    }

    #[test]
    fn test_steer_goal() {
        assert_eq!(steer_goal("goal", &[]), "goal");
        assert_eq!(
            steer_goal("", &["q1".into()]),
            "Follow-up research directions: q1"
        );
        assert!(steer_goal("goal", &["q1".into(), "q2".into()]).starts_with("goal\n"));
    }

    /// Search that sleeps before answering and records peak concurrency.
    struct SlowSearch {
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowSearch {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SearchProvider for SlowSearch {
        async fn search(&self, query: &str, _options: &SearchOptions) -> Result<SearchResponse> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(SearchResponse {
                data: Some(vec![page(&format!("https://slow.dev/{}", query), "slow page")]),
            })
        }
    }

    fn researcher_with(
        llm: Arc<ScriptedLlm>,
        search: Arc<SlowSearch>,
        config: ResearchConfig,
    ) -> Researcher {
        let caches = ResearchCaches::new(&config);
        Researcher::new(llm, search, config, caches).unwrap()
    }

    #[tokio::test]
    async fn test_concurrency_limit_caps_in_flight_searches() {
        let search = SlowSearch::new(Duration::from_millis(20));
        let config = ResearchConfig {
            concurrency_limit: 2,
            ..test_config()
        };
        let r = researcher_with(tree_llm(), search.clone(), config);

        let outcome = r.research("root", 2, 4, vec![], None).await;

        // 4 root branches, each expanding to 2.
        assert_eq!(outcome.result.visited_urls.len(), 12);
        let peak = search.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak in-flight searches {}", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_search_timeout_degrades_branch() {
        let search = SlowSearch::new(Duration::from_secs(30));
        let config = ResearchConfig {
            search_timeout: Duration::from_millis(50),
            ..test_config()
        };
        let r = researcher_with(tree_llm(), search.clone(), config);

        let started = std::time::Instant::now();
        let outcome = r.research("root", 2, 2, vec![], None).await;

        assert!(outcome.result.visited_urls.is_empty());
        assert!(outcome.result.learnings.is_empty());
        assert!(outcome.report.contains("## Sources"));
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_search_deadline_grace_is_proportional() {
        assert_eq!(
            search_deadline(Duration::from_millis(50)),
            Duration::from_millis(55)
        );
        assert_eq!(
            search_deadline(Duration::from_secs(15)),
            Duration::from_secs(16)
        );
    }

    #[tokio::test]
    async fn test_complete_retries_then_fails() {
        let llm = ScriptedLlm::new(|_| anyhow::bail!("503"));
        let search = ScriptedSearch::one_page_per_query();
        let config = ResearchConfig {
            completion_retries: 1,
            ..ResearchConfig::default()
        };
        let caches = ResearchCaches::new(&config);
        let r = Researcher::new(llm.clone(), search, config, caches).unwrap();

        assert!(r.complete("hi").await.is_err());
        assert_eq!(llm.calls(), 2);
    }
}
