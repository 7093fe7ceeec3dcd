//! Text normalization for identity comparison and key derivation.
//!
//! Bibliography metadata arrives with diacritics, LaTeX markup, stray
//! braces and inconsistent spacing. Everything that feeds the grouper or
//! the key canonicalizer passes through here first: NFKD folding down to
//! ASCII, surname extraction from both `Last, First` and `First Last`
//! author shapes, and stopword-aware title words.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Words skipped when picking the short title word for a canonical key.
pub const STOPWORDS: &[&str] = &[
    "the", "and", "of", "for", "on", "in", "a", "an", "to", "with", "by", "via", "using", "from",
    "at", "or", "is",
];

static LATEX_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[A-Za-z]+\*?(?:\[[^\]]*\])?").unwrap());

static AUTHOR_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+and\s+").unwrap());

/// Folds a string to lowercase ASCII: NFKD decomposition, then only ASCII
/// alphanumerics and whitespace survive. `Müller` becomes `muller`.
pub fn fold(s: &str) -> String {
    s.nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace())
        .collect::<String>()
        .to_lowercase()
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes a title for comparison: LaTeX command tokens stripped (their
/// brace-wrapped arguments kept), braces and quotes dropped, folded to
/// ASCII, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    let stripped = LATEX_COMMAND.replace_all(title, " ");
    let cleaned: String = stripped
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '"' | '\\'))
        .collect();
    collapse(&fold(&cleaned))
}

/// Normalizes a year field. The first four-digit run wins, so `2014`,
/// `{2014}` and `c. 2014` all compare equal; anything without one falls
/// back to the folded text. Empty input normalizes to `None`.
pub fn normalize_year(year: &str) -> Option<String> {
    let bytes = year.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start >= 4 {
                return Some(year[start..start + 4].to_string());
            }
        } else {
            i += 1;
        }
    }
    let folded = collapse(&fold(year));
    if folded.is_empty() { None } else { Some(folded) }
}

/// Splits a BibTeX author field on ` and ` into individual author names.
pub fn split_authors(field: &str) -> Vec<String> {
    AUTHOR_SEPARATOR
        .split(field)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extracts one author's surname, folded to ASCII alphanumerics.
///
/// `Last, First` takes the part before the comma; `First Last` takes the
/// last word. Returns `None` when nothing alphanumeric remains.
pub fn surname(author: &str) -> Option<String> {
    let author = author.trim();
    let last = match author.split_once(',') {
        Some((last, _)) => last,
        None => author.split_whitespace().last()?,
    };
    let folded: String = fold(last)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if folded.is_empty() { None } else { Some(folded) }
}

/// Normalized surnames of every author in the field.
pub fn surname_set(field: &str) -> BTreeSet<String> {
    split_authors(field)
        .iter()
        .filter_map(|a| surname(a))
        .collect()
}

/// Normalized surname of the first author, if any.
pub fn first_surname(field: &str) -> Option<String> {
    split_authors(field).first().and_then(|a| surname(a))
}

/// First significant title word for key derivation: the first non-stopword
/// after normalization, the first word if everything is a stopword, or
/// `misc` for an empty title.
pub fn short_title_word(title: &str) -> String {
    let normalized = normalize_title(title);
    let mut words = normalized.split_whitespace();
    let first = words.next();
    first
        .into_iter()
        .chain(words)
        .find(|w| !STOPWORDS.contains(w))
        .or(first)
        .unwrap_or("misc")
        .to_string()
}
