//! Token-aware trimming and chunking.
//!
//! Everything here is pure: callers pass the token counter, usually
//! [`CompletionProvider::count_tokens`](crate::llm::CompletionProvider::count_tokens).

use anyhow::{bail, Result};
use tracing::warn;

/// Trimming never cuts below this many characters.
const MIN_TRIM_CHARS: usize = 140;

const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Cut `text` down until `count` reports at most `max_tokens`.
///
/// Shrinks by characters in proportion to the overflow, so the result is a
/// prefix of the input. Stops at [`MIN_TRIM_CHARS`] even if still over budget.
pub fn trim_to_tokens<F>(text: &str, max_tokens: usize, count: F) -> String
where
    F: Fn(&str) -> usize,
{
    if text.is_empty() || max_tokens == 0 {
        return String::new();
    }

    let mut current = text;
    loop {
        let tokens = count(current);
        if tokens <= max_tokens {
            return current.to_string();
        }

        let chars = current.chars().count();
        let overflow = tokens - max_tokens;
        let chars_per_token = (chars / tokens.max(1)).max(2);
        let target = chars
            .saturating_sub(overflow * chars_per_token)
            .max(MIN_TRIM_CHARS);
        if target >= chars {
            return current.to_string();
        }
        current = char_prefix(current, target);
    }
}

fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Recursive separator splitter measuring chunk size in tokens.
///
/// Splits on paragraph, line, word, then character boundaries until every
/// piece fits, then greedily merges neighbours back up to `chunk_size`
/// keeping up to `chunk_overlap` tokens of trailing context.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be at least 1");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "Cannot have chunk_overlap ({}) >= chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn split<F>(&self, text: &str, count: F) -> Vec<String>
    where
        F: Fn(&str) -> usize,
    {
        if text.trim().is_empty() {
            return vec![];
        }
        self.split_with(text, &self.separators, &count)
    }

    fn split_with<F>(&self, text: &str, separators: &[String], count: &F) -> Vec<String>
    where
        F: Fn(&str) -> usize,
    {
        // First separator present in the text; "" always matches.
        let pos = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(pos).map(String::as_str).unwrap_or("");
        let remaining = separators.get(pos + 1..).unwrap_or(&[]);

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(|c| c.to_string()).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in splits {
            if count(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator, count));
                fitting.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, remaining, count));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator, count));
        }
        chunks
    }

    fn merge<F>(&self, pieces: &[String], separator: &str, count: &F) -> Vec<String>
    where
        F: Fn(&str) -> usize,
    {
        let mut docs = Vec::new();
        let mut window: std::collections::VecDeque<(&str, usize)> =
            std::collections::VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = count(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if total > self.chunk_size {
                    warn!(
                        size = total,
                        chunk_size = self.chunk_size,
                        "created a chunk larger than chunk_size"
                    );
                }
                push_joined(&mut docs, &window, separator);
                // Drop from the front until only the overlap remains and the next piece fits.
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some((_, n)) => total -= n,
                        None => break,
                    }
                }
            }
            window.push_back((piece.as_str(), len));
            total += len;
        }
        push_joined(&mut docs, &window, separator);
        docs
    }
}

fn push_joined(
    docs: &mut Vec<String>,
    window: &std::collections::VecDeque<(&str, usize)>,
    separator: &str,
) {
    let joined = window
        .iter()
        .map(|(s, _)| *s)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One token per whitespace-separated word.
    fn words(s: &str) -> usize {
        s.split_whitespace().count()
    }

    fn chars(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn test_trim_leaves_short_text() {
        assert_eq!(trim_to_tokens("short text", 10, words), "short text");
    }

    #[test]
    fn test_trim_empty_and_zero_budget() {
        assert_eq!(trim_to_tokens("", 10, words), "");
        assert_eq!(trim_to_tokens("anything", 0, words), "");
    }

    #[test]
    fn test_trim_returns_prefix_within_budget() {
        let text = "word ".repeat(500);
        let trimmed = trim_to_tokens(&text, 100, words);
        assert!(text.starts_with(&trimmed));
        assert!(words(&trimmed) <= 100);
        assert!(trimmed.len() >= MIN_TRIM_CHARS);
    }

    #[test]
    fn test_trim_respects_floor() {
        let text = "x".repeat(1000);
        // Every char is a token; budget of 10 is below the floor.
        let trimmed = trim_to_tokens(&text, 10, chars);
        assert_eq!(trimmed.chars().count(), MIN_TRIM_CHARS);
    }

    #[test]
    fn test_trim_multibyte_safe() {
        let text = "é".repeat(1000);
        let trimmed = trim_to_tokens(&text, 200, chars);
        assert!(trimmed.chars().all(|c| c == 'é'));
        assert!(chars(&trimmed) <= 200);
    }

    #[test]
    fn test_splitter_rejects_bad_overlap() {
        assert!(TextSplitter::new(10, 10).is_err());
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(10, 2).is_ok());
    }

    #[test]
    fn test_split_small_text_is_single_chunk() {
        let splitter = TextSplitter::new(50, 5).unwrap();
        let chunks = splitter.split("one two three", words);
        assert_eq!(chunks, vec!["one two three".to_string()]);
    }

    #[test]
    fn test_split_empty_text() {
        let splitter = TextSplitter::new(50, 5).unwrap();
        assert!(splitter.split("   \n\n ", words).is_empty());
    }

    #[test]
    fn test_split_prefers_paragraphs() {
        let splitter = TextSplitter::new(5, 0).unwrap();
        let text = "alpha beta gamma\n\ndelta epsilon zeta\n\neta theta";
        let chunks = splitter.split(text, words);
        // Paragraphs stay whole; the last two fit together in five tokens.
        assert_eq!(
            chunks,
            vec![
                "alpha beta gamma".to_string(),
                "delta epsilon zeta\n\neta theta".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_chunks_fit_budget() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        let text = (0..100).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let chunks = splitter.split(&text, words);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(words(chunk) <= 10, "chunk too large: {}", chunk);
        }
        // Every word survives somewhere.
        for i in 0..100 {
            let w = format!("w{}", i);
            assert!(chunks.iter().any(|c| c.split_whitespace().any(|x| x == w)));
        }
    }

    #[test]
    fn test_split_overlap_repeats_tail() {
        let splitter = TextSplitter::new(4, 2).unwrap();
        let chunks = splitter.split("a b c d e f g h", words);
        assert!(chunks.len() >= 2);
        let first_tail = chunks[0].split_whitespace().last().unwrap();
        assert!(chunks[1].split_whitespace().any(|w| w == first_tail));
    }

    #[test]
    fn test_split_falls_back_to_characters() {
        let splitter = TextSplitter::new(4, 0).unwrap();
        let chunks = splitter.split("abcdefghij", chars);
        assert_eq!(chunks.concat(), "abcdefghij");
        assert!(chunks.iter().all(|c| chars(c) <= 4));
    }
}
