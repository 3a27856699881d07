use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

/// Snapshot of a running research tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchProgress {
    pub current_depth: u32,
    pub total_depth: u32,
    pub current_breadth: usize,
    pub total_breadth: usize,
    pub total_queries: usize,
    pub completed_queries: usize,
    pub current_query: Option<String>,
}

pub type ProgressCallback = Arc<dyn Fn(&ResearchProgress) + Send + Sync>;

/// Shared progress state for one research run.
///
/// Branches update it concurrently; each update and its callback run under
/// one lock so observers see `completed_queries` in non-decreasing order.
/// The callback fires once per finished branch unit.
pub struct ProgressTracker {
    state: Mutex<ResearchProgress>,
    on_progress: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new(depth: u32, breadth: usize, on_progress: Option<ProgressCallback>) -> Self {
        Self {
            state: Mutex::new(ResearchProgress {
                current_depth: depth,
                total_depth: depth,
                current_breadth: breadth,
                total_breadth: breadth,
                ..Default::default()
            }),
            on_progress,
        }
    }

    fn update(&self, notify: bool, apply: impl FnOnce(&mut ResearchProgress)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut state);
        if !notify {
            return;
        }
        if let Some(cb) = &self.on_progress {
            cb(&state);
        }
    }

    /// A node expanded into `count` branches at `depth`/`breadth`.
    ///
    /// Registered before any of them is dispatched, so completions never
    /// overtake the total.
    pub fn expanded(&self, depth: u32, breadth: usize, count: usize) {
        self.update(false, |p| {
            p.total_queries += count;
            p.current_depth = p.current_depth.min(depth);
            p.current_breadth = p.current_breadth.min(breadth);
        });
    }

    pub fn started(&self, query: &str) {
        self.update(false, |p| p.current_query = Some(query.to_string()));
    }

    /// One branch unit finished, whatever its outcome.
    pub fn completed(&self, query: &str) {
        self.update(true, |p| {
            p.completed_queries = (p.completed_queries + 1).min(p.total_queries);
            p.current_query = Some(query.to_string());
        });
    }

    pub fn snapshot(&self) -> ResearchProgress {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Calls [`ProgressTracker::completed`] when dropped.
///
/// Held across a branch unit so completion is reported exactly once, even if
/// the branch bails out early.
pub struct CompletionGuard<'a> {
    tracker: &'a ProgressTracker,
    query: String,
}

impl<'a> CompletionGuard<'a> {
    pub fn new(tracker: &'a ProgressTracker, query: &str) -> Self {
        tracker.started(query);
        Self {
            tracker,
            query: query.to_string(),
        }
    }
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.tracker.completed(&self.query);
    }
}
