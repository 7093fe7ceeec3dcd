//! Spot and fix orchestration.
//!
//! Spot is the read-only pipeline: parse, group, plan keys, summarize.
//! Fix runs the same analysis and then mutates in a fixed order: snapshot
//! the untouched bibliography, write the deduplicated and renamed
//! bibliography at its original path, then rewrite the citing documents.
//! The bibliography always lands before any document, so an interrupted
//! run can be rolled back completely from the snapshot and no document is
//! ever renamed against a mapping the live bibliography does not match.
//! Failures are fatal and never retried.

use crate::canonical::{KeyPlan, plan_keys};
use crate::grouper::{DuplicateGroup, Grouping, GroupingConfig, GroupingWarning, group_entries};
use crate::parser::{Bibliography, Entry};
use crate::rewriter::{FileRewrite, KeyMatcher, rewrite_files};
use crate::scanner::{ScanConfig, collect_corpus_files};
use crate::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix appended to the bibliography file name for the pre-mutation
/// snapshot.
pub const SNAPSHOT_SUFFIX: &str = ".bak";

/// Settings for a fix run.
#[derive(Debug, Clone)]
pub struct FixOptions {
    pub bib_path: PathBuf,
    pub corpus_root: PathBuf,
    pub scan: ScanConfig,
    /// Rewrite corpus files across a thread pool.
    pub parallel: bool,
    /// Compute everything, including per-file counts, but write nothing.
    pub dry_run: bool,
}

/// The analyzed state shared by spot and fix: the parsed store, its
/// partition into duplicate groups, and the key plan.
#[derive(Debug)]
pub struct Analysis {
    pub bibliography: Bibliography,
    pub groups: Vec<DuplicateGroup>,
    pub warnings: Vec<GroupingWarning>,
    pub plan: KeyPlan,
}

/// One duplicate group as reported: the surviving key, what it was, and
/// what gets dropped.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub new_key: String,
    pub kept: String,
    pub dropped: Vec<String>,
    pub year: Option<String>,
    pub title: Option<String>,
}

/// A proposed (spot) or applied (fix) key rename.
#[derive(Debug, Clone, Serialize)]
pub struct Rename {
    pub old: String,
    pub new: String,
}

/// Read-only report for both modes.
#[derive(Debug, Serialize)]
pub struct SpotReport {
    pub entries: usize,
    pub duplicate_groups: Vec<GroupSummary>,
    pub renames: Vec<Rename>,
    pub warnings: Vec<GroupingWarning>,
}

/// Outcome of a fix run.
#[derive(Debug, Serialize)]
pub struct FixReport {
    pub spot: SpotReport,
    pub dry_run: bool,
    /// Snapshot location; absent on dry runs.
    pub snapshot: Option<PathBuf>,
    pub entries_removed: usize,
    pub keys_renamed: usize,
    pub files_updated: usize,
    pub citations_rewritten: usize,
    pub updated_files: Vec<FileRewrite>,
}

/// Runs the read-only half of the pipeline against a bibliography file.
pub fn analyze(bib_path: &Path, grouping: &GroupingConfig) -> Result<Analysis> {
    let source = fs::read_to_string(bib_path).map_err(|source| Error::Read {
        path: bib_path.to_path_buf(),
        source,
    })?;
    let bibliography = Bibliography::parse(&source)?;
    let Grouping { groups, warnings } = group_entries(&bibliography.entries, grouping);
    let plan = plan_keys(&bibliography.entries, &groups);
    Ok(Analysis {
        bibliography,
        groups,
        warnings,
        plan,
    })
}

impl Analysis {
    /// Builds the report for spot mode (also embedded in fix reports).
    pub fn summarize(&self) -> SpotReport {
        let entries = &self.bibliography.entries;
        let mut duplicate_groups = Vec::new();
        let mut renames = Vec::new();

        for group in &self.groups {
            let representative = &entries[group.representative];
            let new_key = self.plan.mapping[representative.key()].clone();

            if group.members.len() > 1 {
                duplicate_groups.push(GroupSummary {
                    new_key: new_key.clone(),
                    kept: representative.key().to_string(),
                    dropped: group
                        .members
                        .iter()
                        .filter(|&&index| index != group.representative)
                        .map(|&index| entries[index].key().to_string())
                        .collect(),
                    year: representative.field("year").map(str::to_string),
                    title: representative.field("title").map(str::to_string),
                });
            }

            if representative.key() != new_key {
                renames.push(Rename {
                    old: representative.key().to_string(),
                    new: new_key,
                });
            }
        }

        SpotReport {
            entries: entries.len(),
            duplicate_groups,
            renames,
            warnings: self.warnings.clone(),
        }
    }
}

/// Snapshot path for a bibliography file: the same name with the snapshot
/// suffix appended.
pub fn snapshot_path(bib_path: &Path) -> PathBuf {
    let mut name = bib_path.file_name().unwrap_or_default().to_os_string();
    name.push(SNAPSHOT_SUFFIX);
    bib_path.with_file_name(name)
}

/// Applies a fix: snapshot, rewrite the bibliography, rewrite the corpus.
pub fn apply_fix(analysis: Analysis, options: &FixOptions) -> Result<FixReport> {
    let spot = analysis.summarize();
    let Analysis {
        mut bibliography,
        groups,
        plan,
        ..
    } = analysis;

    let snapshot = snapshot_path(&options.bib_path);
    if !options.dry_run {
        fs::copy(&options.bib_path, &snapshot).map_err(|source| Error::Snapshot {
            path: snapshot.clone(),
            source,
        })?;
    }

    // Representatives survive in original order; only their key spans
    // change.
    let survivors: Vec<Entry> = groups
        .iter()
        .map(|group| {
            let mut entry = bibliography.entries[group.representative].clone();
            let new_key = plan.mapping[entry.key()].as_str();
            if entry.key() != new_key {
                entry.set_key(new_key);
            }
            entry
        })
        .collect();
    bibliography.entries = survivors;

    if !options.dry_run {
        fs::write(&options.bib_path, bibliography.render()).map_err(|source| Error::Write {
            path: options.bib_path.clone(),
            source,
        })?;
    }

    let mut files = collect_corpus_files(&options.corpus_root, &options.scan)?;
    files.retain(|path| !same_file(path, &options.bib_path) && !same_file(path, &snapshot));

    let updated_files = match KeyMatcher::from_mapping(&plan.mapping) {
        Some(matcher) => rewrite_files(&files, &matcher, !options.dry_run, options.parallel)?,
        None => Vec::new(),
    };

    Ok(FixReport {
        entries_removed: plan.dropped.len(),
        keys_renamed: spot.renames.len(),
        files_updated: updated_files.len(),
        citations_rewritten: updated_files.iter().map(|f| f.replacements).sum(),
        snapshot: (!options.dry_run).then_some(snapshot),
        dry_run: options.dry_run,
        spot,
        updated_files,
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
