use std::collections::HashSet;

use url::Url;

/// Canonical form of a visited URL, or `None` if it is blank.
///
/// Fragments are dropped and a bare trailing slash on the path is removed,
/// so `https://a.dev/x/#top` and `https://a.dev/x` collapse to one source.
/// Strings that do not parse as URLs are kept as trimmed text.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(mut url) = Url::parse(trimmed) else {
        return Some(trimmed.to_string());
    };
    url.set_fragment(None);

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }
    let mut out = url.to_string();
    // Url renders an empty path as "/"
    if url.path() == "/" && url.query().is_none() && out.ends_with('/') {
        out.pop();
    }
    Some(out)
}

/// Append `incoming` to `base`, skipping items already present. Keeps first-seen order.
pub fn merge_unique(base: &mut Vec<String>, incoming: impl IntoIterator<Item = String>) {
    let mut seen: HashSet<String> = base.iter().cloned().collect();
    for item in incoming {
        if seen.insert(item.clone()) {
            base.push(item);
        }
    }
}

/// Order-preserving dedup of a list.
pub fn unique(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out = Vec::new();
    merge_unique(&mut out, items);
    out
}

/// Normalized URLs of a batch of hits, deduplicated.
pub fn collect_urls<'a>(urls: impl IntoIterator<Item = Option<&'a str>>) -> Vec<String> {
    unique(urls.into_iter().flatten().filter_map(normalize_url))
}
