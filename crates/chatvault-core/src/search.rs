//! Linear-scan search across sessions.
//!
//! No index is kept: every query walks every session. Matching is
//! case-insensitive and each matching field yields one [`SearchMatch`].

use crate::error::{Error, Result};
use crate::models::{MatchType, SearchMatch, SearchResult};
use crate::session::Session;

/// Characters of context kept on each side of a match before word-boundary
/// extension.
pub const DEFAULT_SNIPPET_RADIUS: usize = 50;

const ELLIPSIS: &str = "…";

/// Search tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub snippet_radius: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            snippet_radius: DEFAULT_SNIPPET_RADIUS,
        }
    }
}

/// Search `sessions` in order, keeping only sessions with at least one hit.
pub fn search_sessions(
    sessions: &[Session],
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::Validation("search query is empty".to_string()));
    }

    Ok(sessions
        .iter()
        .map(|session| search_session(session, query, options))
        .filter(SearchResult::has_matches)
        .collect())
}

/// Every hit for `query` inside one session, in field order: name, system
/// prompt, messages, tags.
pub fn search_session(session: &Session, query: &str, options: &SearchOptions) -> SearchResult {
    let mut result = SearchResult::new(session.info());
    let radius = options.snippet_radius;

    if let Some(found) = find_case_insensitive(&session.name, query) {
        result.matches.push(SearchMatch {
            match_type: MatchType::Name,
            role: None,
            full_text: session.name.clone(),
            snippet: extract_snippet(&session.name, found, radius),
            message_index: None,
        });
    }

    let prompt = &session.conversation.system_prompt;
    if let Some(found) = find_case_insensitive(prompt, query) {
        result.matches.push(SearchMatch {
            match_type: MatchType::SystemPrompt,
            role: None,
            full_text: prompt.clone(),
            snippet: extract_snippet(prompt, found, radius),
            message_index: None,
        });
    }

    for (idx, message) in session.messages().iter().enumerate() {
        if let Some(found) = find_case_insensitive(&message.content, query) {
            result.matches.push(SearchMatch {
                match_type: MatchType::Message,
                role: Some(message.role),
                full_text: message.content.clone(),
                snippet: extract_snippet(&message.content, found, radius),
                message_index: Some(idx),
            });
        }
    }

    for tag in &session.tags {
        if let Some(found) = find_case_insensitive(tag, query) {
            result.matches.push(SearchMatch {
                match_type: MatchType::Tag,
                role: None,
                full_text: tag.clone(),
                snippet: extract_snippet(tag, found, radius),
                message_index: None,
            });
        }
    }

    result
}

/// Byte range in `haystack` of the first case-insensitive occurrence of
/// `needle`.
///
/// Lowercasing can change byte lengths, so the folded text keeps a map back
/// to the original offsets.
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }

    let mut folded = String::with_capacity(haystack.len());
    // For each byte of `folded`, the offset of the source char it came from.
    let mut origin = Vec::with_capacity(haystack.len());
    for (offset, ch) in haystack.char_indices() {
        for lower in ch.to_lowercase() {
            let before = folded.len();
            folded.push(lower);
            origin.extend(std::iter::repeat_n(offset, folded.len() - before));
        }
    }

    // Fold char by char like the haystack; `str::to_lowercase` applies the
    // final-sigma rule and would fold the two sides differently.
    let needle: String = needle.chars().flat_map(char::to_lowercase).collect();
    let start = folded.find(&needle)?;
    let end = start + needle.len();

    let orig_start = origin[start];
    let orig_end = match origin.get(end) {
        Some(&offset) => offset,
        None => haystack.len(),
    };
    // A match ending inside a multi-char fold still covers the whole char.
    let orig_end = if orig_end <= origin[end - 1] {
        next_char_boundary(haystack, origin[end - 1])
    } else {
        orig_end
    };
    Some((orig_start, orig_end))
}

fn next_char_boundary(text: &str, offset: usize) -> usize {
    text[offset..]
        .chars()
        .next()
        .map_or(text.len(), |ch| offset + ch.len_utf8())
}

/// Context around the match at byte range `found`.
///
/// Takes `radius` characters on each side, widens both edges outward to the
/// nearest whitespace so words are not cut, and marks truncated ends with
/// "…".
pub fn extract_snippet(text: &str, found: (usize, usize), radius: usize) -> String {
    let (match_start, match_end) = found;

    let mut start = if radius == 0 {
        match_start
    } else {
        text[..match_start]
            .char_indices()
            .rev()
            .nth(radius - 1)
            .map_or(0, |(offset, _)| offset)
    };
    let mut end = text[match_end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(offset, _)| match_end + offset);

    // Widen to word boundaries.
    while start > 0 {
        let Some(prev) = text[..start].chars().next_back() else {
            break;
        };
        if prev.is_whitespace() {
            break;
        }
        start -= prev.len_utf8();
    }
    while end < text.len() {
        let Some(next) = text[end..].chars().next() else {
            break;
        };
        if next.is_whitespace() {
            break;
        }
        end += next.len_utf8();
    }

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(text[start..end].trim());
    if end < text.len() {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
