//! Citation rewriting across the document corpus.
//!
//! All effective renames compile into one word-boundary-anchored
//! alternation, longest key first, and each file is rewritten in a single
//! pass through the mapping. A replacement can therefore never be
//! re-matched by a later rule, and a key that is a prefix of another key
//! or of surrounding prose is never partially replaced. Files are
//! disjoint, so the per-file read-modify-write loop optionally fans out
//! across a thread pool.

use crate::{Error, Result};
use rayon::prelude::*;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Compiled single-pass matcher for every renamed key.
#[derive(Debug)]
pub struct KeyMatcher {
    pattern: Regex,
    mapping: HashMap<String, String>,
}

impl KeyMatcher {
    /// Builds a matcher from the key mapping, ignoring identity entries.
    /// Returns `None` when nothing is effectively renamed.
    pub fn from_mapping(mapping: &BTreeMap<String, String>) -> Option<Self> {
        let mut renamed: Vec<&String> = mapping
            .iter()
            .filter(|(old, new)| old != new)
            .map(|(old, _)| old)
            .collect();
        if renamed.is_empty() {
            return None;
        }
        // Longest key first, then lexicographic for determinism.
        renamed.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let alternation = renamed
            .iter()
            .map(|key| regex::escape(key))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"\b(?:{alternation})\b"))
            .expect("escaped keys always form a valid pattern");

        let mapping = renamed
            .into_iter()
            .map(|old| (old.clone(), mapping[old].clone()))
            .collect();

        Some(Self { pattern, mapping })
    }

    /// Rewrites every citation token in `content`, returning the new text
    /// and the number of replacements.
    pub fn rewrite(&self, content: &str) -> (String, usize) {
        let mut count = 0usize;
        let rewritten = self
            .pattern
            .replace_all(content, |caps: &Captures| {
                count += 1;
                self.mapping[&caps[0]].clone()
            })
            .into_owned();
        (rewritten, count)
    }
}

/// One corpus file that contained at least one citation to rewrite.
#[derive(Debug, Clone, Serialize)]
pub struct FileRewrite {
    pub path: PathBuf,
    pub replacements: usize,
}

/// Applies the matcher to every file, in place when `write` is set.
///
/// Only files with at least one replacement are reported. Any read or
/// write failure is fatal for the run; files already rewritten stay as
/// they are.
pub fn rewrite_files(
    files: &[PathBuf],
    matcher: &KeyMatcher,
    write: bool,
    parallel: bool,
) -> Result<Vec<FileRewrite>> {
    let outcome: Result<Vec<Option<FileRewrite>>> = if parallel {
        files
            .par_iter()
            .map(|path| rewrite_one(path, matcher, write))
            .collect()
    } else {
        files
            .iter()
            .map(|path| rewrite_one(path, matcher, write))
            .collect()
    };

    Ok(outcome?.into_iter().flatten().collect())
}

fn rewrite_one(path: &Path, matcher: &KeyMatcher, write: bool) -> Result<Option<FileRewrite>> {
    let content = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let (rewritten, replacements) = matcher.rewrite(&content);
    if replacements == 0 {
        return Ok(None);
    }

    if write {
        fs::write(path, rewritten).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    Ok(Some(FileRewrite {
        path: path.to_path_buf(),
        replacements,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn matcher(pairs: &[(&str, &str)]) -> KeyMatcher {
        let mapping: BTreeMap<String, String> = pairs
            .iter()
            .map(|(old, new)| (old.to_string(), new.to_string()))
            .collect();
        KeyMatcher::from_mapping(&mapping).unwrap()
    }

    #[test]
    fn rewrites_citation_tokens() {
        let m = matcher(&[("wood14eth", "wood2014ethereum")]);
        let (out, count) = m.rewrite(r"As shown in \cite{wood14eth}, the ledger...");
        assert_eq!(out, r"As shown in \cite{wood2014ethereum}, the ledger...");
        assert_eq!(count, 1);
    }

    #[test]
    fn identity_mappings_produce_no_matcher() {
        let mapping: BTreeMap<String, String> = [("same", "same"), ("also", "also")]
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        assert!(KeyMatcher::from_mapping(&mapping).is_none());
    }

    #[test]
    fn word_boundaries_protect_longer_keys() {
        // Renaming smith2020foo must not corrupt smith2020foobar.
        let m = matcher(&[("smith2020foo", "smith2020bar")]);
        let (out, count) = m.rewrite(r"\cite{smith2020foo} and \cite{smith2020foobar}");
        assert_eq!(out, r"\cite{smith2020bar} and \cite{smith2020foobar}");
        assert_eq!(count, 1);
    }

    #[test]
    fn overlapping_keys_match_longest_first() {
        let m = matcher(&[
            ("smith2020", "jones2020deep"),
            ("smith2020extra", "jones2020wide"),
        ]);
        let (out, count) = m.rewrite(r"\cite{smith2020extra, smith2020}");
        assert_eq!(out, r"\cite{jones2020wide, jones2020deep}");
        assert_eq!(count, 2);
    }

    #[test]
    fn merged_duplicates_resolve_in_one_pass() {
        // Two old spellings of one work, both cited.
        let m = matcher(&[
            ("wood2014", "wood2014ethereum"),
            ("wood14eth", "wood2014ethereum"),
        ]);
        let (out, count) = m.rewrite(r"\cite{wood2014} vs \citep{wood14eth}");
        assert_eq!(out, r"\cite{wood2014ethereum} vs \citep{wood2014ethereum}");
        assert_eq!(count, 2);
    }

    #[test]
    fn replacement_is_not_rematched_in_the_same_pass() {
        // a -> b while b -> c: a single pass must not turn a into c.
        let m = matcher(&[("keya", "keyb"), ("keyb", "keyc")]);
        let (out, count) = m.rewrite(r"\cite{keya, keyb}");
        assert_eq!(out, r"\cite{keyb, keyc}");
        assert_eq!(count, 2);
    }

    #[test]
    fn counts_every_occurrence_across_lines() {
        let m = matcher(&[("old1999x", "new1999x")]);
        let (out, count) = m.rewrite("\\cite{old1999x}\n\\cite{old1999x,other}\nplain old1999x");
        assert_eq!(count, 3);
        assert!(!out.contains("old1999x"));
    }

    #[test]
    fn rewrite_files_updates_only_matching_files() {
        let dir = TempDir::new().unwrap();
        let cited = dir.path().join("cited.tex");
        let clean = dir.path().join("clean.tex");
        fs::write(&cited, r"\cite{old2000a}").unwrap();
        fs::write(&clean, "no citations here").unwrap();

        let m = matcher(&[("old2000a", "new2000a")]);
        let files = vec![cited.clone(), clean.clone()];
        let rewrites = rewrite_files(&files, &m, true, false).unwrap();

        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].path, cited);
        assert_eq!(rewrites[0].replacements, 1);
        assert_eq!(fs::read_to_string(&cited).unwrap(), r"\cite{new2000a}");
        assert_eq!(fs::read_to_string(&clean).unwrap(), "no citations here");
    }

    #[test]
    fn dry_pass_reports_counts_without_writing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("chapter.tex");
        fs::write(&file, r"\cite{old2000a}").unwrap();

        let m = matcher(&[("old2000a", "new2000a")]);
        let rewrites = rewrite_files(&[file.clone()], &m, false, false).unwrap();

        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].replacements, 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), r"\cite{old2000a}");
    }

    #[test]
    fn parallel_rewrite_matches_sequential() {
        let dir = TempDir::new().unwrap();
        let mut files = Vec::new();
        for i in 0..8 {
            let path = dir.path().join(format!("ch{i}.tex"));
            fs::write(&path, format!("\\cite{{old2000a}} in chapter {i}")).unwrap();
            files.push(path);
        }

        let m = matcher(&[("old2000a", "new2000a")]);
        let rewrites = rewrite_files(&files, &m, true, true).unwrap();

        assert_eq!(rewrites.len(), 8);
        assert!(rewrites.iter().all(|r| r.replacements == 1));
        for path in &files {
            assert!(fs::read_to_string(path).unwrap().contains("new2000a"));
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let m = matcher(&[("old2000a", "new2000a")]);
        let err = rewrite_files(&[PathBuf::from("/nonexistent/chapter.tex")], &m, true, false)
            .unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }
}
