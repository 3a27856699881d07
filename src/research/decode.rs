use serde::de::DeserializeOwned;

/// Outcome of decoding a provider reply against a schema.
#[derive(Debug, PartialEq)]
pub enum Decoded<T> {
    Parsed(T),
    /// Reply was not JSON or did not match the schema.
    Rejected(String),
}

/// Decode a completion into `T`.
///
/// Accepts bare JSON, a ```json fenced block, or a JSON object embedded in
/// surrounding prose. Anything else, or a shape mismatch, is `Rejected`.
pub fn decode<T: DeserializeOwned>(reply: &str) -> Decoded<T> {
    let Some(candidate) = extract_json(reply) else {
        return Decoded::Rejected(format!(
            "no JSON object in reply: {:?}",
            reply.chars().take(120).collect::<String>()
        ));
    };
    match serde_json::from_str::<T>(candidate) {
        Ok(v) => Decoded::Parsed(v),
        Err(e) => Decoded::Rejected(format!("reply does not match schema: {}", e)),
    }
}

fn extract_json(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    if let Some(block) = extract_fenced_block(trimmed) {
        return Some(block);
    }
    // Outermost braces within prose.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        Some(&trimmed[start..=end])
    } else {
        None
    }
}

/// Content of the first ```json (or bare ```) block.
fn extract_fenced_block(input: &str) -> Option<&str> {
    let start_idx = input.find("```json").or_else(|| input.find("```"))?;
    let after_tag = &input[start_idx..];

    // Skip the rest of the opening fence line
    let code_start = after_tag.find('\n').map(|i| i + 1)?;
    let code_region = &after_tag[code_start..];

    let end = code_region.find("```").unwrap_or(code_region.len());
    let code = code_region[..end].trim();

    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}
