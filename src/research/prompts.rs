//! Prompt templates. Every task prompt is prefixed with [`system_prompt`].

use chrono::Local;

pub fn system_prompt() -> String {
    let today = Local::now().format("%A, %B %-d, %Y");
    format!(
        r#"You are an expert researcher. Today is {today}. Follow these rules:
- Be highly organized and detailed. Assume the reader is an expert analyst.
- Prefer credible, primary sources and state exact figures, names and dates.
- Flag speculation and predictions explicitly.
- Do not narrate your own reasoning process in the answer.
- When asked for JSON, reply with JSON only."#
    )
}

fn with_system(task: String) -> String {
    format!("{}\n\n{}", system_prompt(), task)
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .map(|l| format!("- {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn query_prompt(
    query: &str,
    num_queries: usize,
    learnings: &[String],
    research_goal: &str,
) -> String {
    let goal = if research_goal.trim().is_empty() {
        String::new()
    } else {
        format!("\nResearch goal: {}\n", research_goal)
    };
    with_system(format!(
        r#"Generate up to {num_queries} web search queries to research the topic below. Return fewer if the topic is narrow. Each query must be distinct and should target a different angle (background, comparison, limitations, recent developments).

Topic: {query}
{goal}
Learnings from earlier research (use them to make the queries more specific):
{learnings}

Reply with JSON only:
{{"queries": [{{"query": "search terms", "researchGoal": "what this query should uncover and how to go deeper once found"}}]}}"#,
        learnings = bullet_list(learnings),
    ))
}

pub fn learning_prompt(
    query: &str,
    num_learnings: usize,
    num_follow_ups: usize,
    title: &str,
    url: &str,
    content: &str,
) -> String {
    with_system(format!(
        r#"Extract up to {num_learnings} learnings from the page content below for the research query <query>{query}</query>. Each learning must be a concise, information-dense statement that keeps entities, metrics and dates. Only include facts stated in the content. Also suggest up to {num_follow_ups} follow-up questions that would deepen this research.

Page title: {title}
Page URL: {url}
<content>
{content}
</content>

Reply with JSON only:
{{"learnings": ["..."], "followUpQuestions": ["..."]}}
If the page holds nothing relevant, reply {{"learnings": [], "followUpQuestions": []}}."#
    ))
}

pub fn outline_prompt(prompt: &str, learnings: &[String]) -> String {
    with_system(format!(
        "Based on the prompt and the learnings below, write a detailed outline for a research report.\n\nPrompt: {}\n\nLearnings:\n{}",
        prompt,
        bullet_list(learnings)
    ))
}

pub fn report_prompt(outline: &str, learnings: &[String]) -> String {
    with_system(format!(
        "Using the outline and learnings below, write a comprehensive research report in markdown. Do not add a title.\n\nOutline:\n{}\n\nLearnings:\n{}",
        outline,
        bullet_list(learnings)
    ))
}

pub fn summary_prompt(learnings: &[String]) -> String {
    with_system(format!(
        "Write a short executive summary (one or two paragraphs) of the following research learnings.\n\nLearnings:\n{}",
        bullet_list(learnings)
    ))
}

pub fn title_prompt(prompt: &str, learnings: &[String]) -> String {
    with_system(format!(
        "Write a concise title for a research report on the prompt below. Reply with the title only, no quotes or markdown.\n\nPrompt: {}\n\nLearnings:\n{}",
        prompt,
        bullet_list(learnings)
    ))
}

pub fn feedback_prompt(
    query: &str,
    num_questions: usize,
    research_goal: &str,
    learnings: &[String],
) -> String {
    with_system(format!(
        r#"Given the research query below, ask up to {num_questions} follow-up questions that would clarify its scope, assumptions or intended use. Return fewer if the query is already clear. Questions must be open-ended and easy to answer.

Query: {query}
Research goal: {research_goal}
Known so far:
{learnings}

Reply with JSON only:
{{"followUpQuestions": ["..."], "analysis": "one or two sentences on what is unclear about the query"}}"#,
        learnings = bullet_list(learnings),
    ))
}
