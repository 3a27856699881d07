//! Clarifying questions for a research query, asked before the tree runs.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::decode::{decode, Decoded};
use super::prompts;
use super::Researcher;
use crate::cache::{fingerprint, list_fingerprint};

pub const DEFAULT_NUM_QUESTIONS: usize = 3;
pub const DEFAULT_FEEDBACK_GOAL: &str = "Understand the user's query";

const PARSE_FAILED: &str = "Failed to parse feedback response. Please check logs for raw output.";
const PROVIDER_FAILED: &str = "Error generating feedback. Please check provider configuration and logs.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
    #[serde(default)]
    pub analysis: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeedbackRequest {
    pub query: String,
    pub num_questions: usize,
    pub research_goal: String,
    pub existing_learnings: Vec<String>,
}

impl FeedbackRequest {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            num_questions: DEFAULT_NUM_QUESTIONS,
            research_goal: DEFAULT_FEEDBACK_GOAL.to_string(),
            existing_learnings: vec![],
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackKey<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_questions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    research_goal: Option<&'a str>,
    #[serde(skip_serializing_if = "String::is_empty")]
    learnings: String,
}

impl<'a> From<&'a FeedbackRequest> for FeedbackKey<'a> {
    fn from(req: &'a FeedbackRequest) -> Self {
        Self {
            query: &req.query,
            num_questions: (req.num_questions != DEFAULT_NUM_QUESTIONS).then_some(req.num_questions),
            research_goal: (req.research_goal != DEFAULT_FEEDBACK_GOAL)
                .then_some(req.research_goal.as_str()),
            learnings: list_fingerprint(&req.existing_learnings),
        }
    }
}

impl Researcher {
    /// Ask for clarifying questions. Failures come back as an explanatory
    /// `analysis` with no questions.
    pub async fn generate_feedback(&self, request: &FeedbackRequest) -> Feedback {
        let key = fingerprint(&FeedbackKey::from(request))
            .unwrap_or_else(|| request.query.clone());
        if let Some(cached) = self.caches.feedback.get(&key) {
            debug!(query = %request.query, "Using cached feedback");
            return cached;
        }

        let prompt = prompts::feedback_prompt(
            &request.query,
            request.num_questions,
            &request.research_goal,
            &request.existing_learnings,
        );
        let reply = match self.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(query = %request.query, "Feedback generation failed: {:#}", e);
                return Feedback {
                    follow_up_questions: vec![],
                    analysis: Some(PROVIDER_FAILED.to_string()),
                };
            }
        };

        let feedback = match decode::<Feedback>(&reply) {
            Decoded::Parsed(mut parsed) => {
                parsed.follow_up_questions.retain(|q| !q.trim().is_empty());
                parsed.follow_up_questions.truncate(request.num_questions);
                parsed
            }
            Decoded::Rejected(reason) => {
                warn!(query = %request.query, "Discarding feedback reply: {}", reason);
                debug!(reply = %reply, "Raw feedback reply");
                Feedback {
                    follow_up_questions: vec![],
                    analysis: Some(PARSE_FAILED.to_string()),
                }
            }
        };

        self.caches.feedback.set(key, feedback.clone());
        feedback
    }
}
