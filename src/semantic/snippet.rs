//! Query-aware snippet extraction.
//!
//! Picks the sentence of a page that shares the most whole words with the
//! query, trims it, and wraps every matched query word in `**`.

use regex::{Captures, Regex};

/// Returned for pages without any text.
pub const NO_TEXT_PLACEHOLDER: &str = "[No text available]";

/// Default snippet length in characters
pub const DEFAULT_MAX_LENGTH: usize = 250;

/// Appended when a snippet is cut at `max_length`
const TRUNCATION_SUFFIX: &str = "...";

/// Build a highlighted excerpt of `text` for `query`.
///
/// Falls back to the beginning of the page when no sentence contains a query
/// word. Never fails.
pub fn generate_snippet(text: &str, query: &str, max_length: usize) -> String {
    if text.trim().is_empty() {
        return NO_TEXT_PLACEHOLDER.to_string();
    }

    let words = query_words(query);
    let matchers: Vec<Regex> = words.iter().filter_map(|w| word_regex(&[w.as_str()])).collect();

    let mut best_sentence = None;
    let mut best_score = 0;
    for sentence in split_sentences(text) {
        let score = matchers.iter().filter(|re| re.is_match(sentence)).count();
        if score > best_score {
            best_score = score;
            best_sentence = Some(sentence);
        }
    }

    let chosen = best_sentence.unwrap_or_else(|| take_chars(text, max_length));
    let snippet = truncate(chosen, max_length);

    highlight(&snippet, &words)
}

/// Lower-cased query words with surrounding punctuation removed.
///
/// Duplicates are kept: a word given twice counts twice when scoring.
fn query_words(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Case-insensitive whole-word matcher for any of `words`.
fn word_regex(words: &[&str]) -> Option<Regex> {
    if words.is_empty() {
        return None;
    }

    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).ok()
}

/// Split after `.`, `!` or `?` followed by whitespace.
///
/// The punctuation stays with its sentence; the whitespace is dropped.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = idx + c.len_utf8();
        if !chars.peek().is_some_and(|(_, next)| next.is_whitespace()) {
            continue;
        }

        sentences.push(&text[start..end]);
        while chars.peek().is_some_and(|(_, next)| next.is_whitespace()) {
            chars.next();
        }
        start = chars.peek().map(|(i, _)| *i).unwrap_or(text.len());
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

/// First `n` characters of `s` (never splits a UTF-8 sequence).
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn truncate(s: &str, max_length: usize) -> String {
    let head = take_chars(s, max_length);
    if head.len() < s.len() {
        format!("{head}{TRUNCATION_SUFFIX}")
    } else {
        s.to_string()
    }
}

/// Wrap every whole-word occurrence of any query word in `**`.
///
/// One combined pass, longest words first, so markers never nest.
fn highlight(snippet: &str, words: &[String]) -> String {
    let mut unique: Vec<&str> = words.iter().map(String::as_str).collect();
    unique.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    unique.dedup();

    match word_regex(&unique) {
        Some(re) => re
            .replace_all(snippet, |caps: &Captures| format!("**{}**", &caps[0]))
            .into_owned(),
        None => snippet.to_string(),
    }
}
