use anyhow::Result;
use clap::Args;

use crate::research::feedback::{FeedbackRequest, DEFAULT_NUM_QUESTIONS};
use crate::research::Researcher;

#[derive(Args, Debug)]
pub struct FeedbackArgs {
    /// The research query to refine
    pub query: String,

    /// Max questions to ask
    #[arg(short = 'n', long, default_value_t = DEFAULT_NUM_QUESTIONS)]
    pub questions: usize,

    /// What the research is for
    #[arg(long)]
    pub goal: Option<String>,
}

pub async fn run(researcher: &Researcher, args: FeedbackArgs) -> Result<()> {
    let mut request = FeedbackRequest::new(&args.query);
    request.num_questions = args.questions;
    if let Some(goal) = args.goal {
        request.research_goal = goal;
    }

    let feedback = researcher.generate_feedback(&request).await;
    println!("{}", serde_json::to_string_pretty(&feedback)?);
    Ok(())
}
