//! Canonical key derivation and rename planning.
//!
//! Every distinct work gets one key of the form `surnameYYYYword`: the
//! first author's folded surname, the publication year, and the first
//! significant title word (`albert2009termination`, `wood2014ethereum`).
//! Groups are processed in original order; a representative whose key
//! already fits its canonical pattern keeps it, which minimizes rewrites
//! across the citing documents. When two distinct groups derive the same
//! base, later ones take the smallest free integer suffix starting at 2 —
//! a base key never gets an implicit `1`.

use crate::grouper::DuplicateGroup;
use crate::normalize;
use crate::parser::Entry;
use std::collections::{BTreeMap, HashSet};

/// The rename plan for one run.
///
/// `mapping` is total over every pre-run key, identity included, and its
/// image contains no collisions. `dropped` holds the store indices of
/// non-representative duplicates slated for removal.
#[derive(Debug)]
pub struct KeyPlan {
    pub mapping: BTreeMap<String, String>,
    pub dropped: Vec<usize>,
}

impl KeyPlan {
    /// Old-to-new pairs that actually change, in mapping order.
    pub fn renames(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mapping
            .iter()
            .filter(|(old, new)| old != new)
            .map(|(old, new)| (old.as_str(), new.as_str()))
    }
}

/// Derives the canonical base key for an entry.
///
/// Fallbacks for missing metadata follow the usual convention:
/// `unknown` surname, `noyear`, `misc` title word.
pub fn canonical_base(entry: &Entry) -> String {
    let author = entry.field("author").or_else(|| entry.field("editor"));
    let surname = author
        .and_then(normalize::first_surname)
        .unwrap_or_else(|| "unknown".to_string());
    let year = entry
        .field("year")
        .and_then(normalize::normalize_year)
        .unwrap_or_else(|| "noyear".to_string());
    let word = entry
        .field("title")
        .map(normalize::short_title_word)
        .unwrap_or_else(|| "misc".to_string());
    format!("{surname}{year}{word}")
}

/// Whether a key already satisfies the canonical pattern for `base`:
/// the base itself or the base plus a bare integer suffix.
pub fn matches_canonical(key: &str, base: &str) -> bool {
    match key.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Plans the key assignment for a grouped store.
///
/// Groups are visited in representative order, so the first group to
/// derive a base claims it and collisions resolve deterministically.
pub fn plan_keys(entries: &[Entry], groups: &[DuplicateGroup]) -> KeyPlan {
    let mut used: HashSet<String> = HashSet::new();
    let mut mapping = BTreeMap::new();
    let mut dropped = Vec::new();

    for group in groups {
        let representative = &entries[group.representative];
        let base = canonical_base(representative);

        let new_key = if matches_canonical(representative.key(), &base)
            && !used.contains(representative.key())
        {
            representative.key().to_string()
        } else {
            next_free(&base, &used)
        };
        used.insert(new_key.clone());

        for &index in &group.members {
            mapping.insert(entries[index].key().to_string(), new_key.clone());
            if index != group.representative {
                dropped.push(index);
            }
        }
    }

    dropped.sort_unstable();
    KeyPlan { mapping, dropped }
}

fn next_free(base: &str, used: &HashSet<String>) -> String {
    if !used.contains(base) {
        return base.to_string();
    }
    let mut suffix = 2usize;
    loop {
        let candidate = format!("{base}{suffix}");
        if !used.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}
