//! Corpus file scanner.
//!
//! Recursively walks the document tree to collect the files that may cite
//! bibliography keys, skipping entries whose names start with `.` or `_`
//! unless default excludes are disabled. Extension and glob filters narrow
//! the set further; the bibliography file and its snapshot are excluded by
//! the pipeline before rewriting.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File collection settings for the corpus walk.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Extensions of files that may contain citation tokens.
    pub extensions: Vec<String>,
    /// Glob patterns for files or directories to skip.
    pub excludes: Vec<glob::Pattern>,
    /// Skip `.` and `_` prefixed entries.
    pub default_excludes: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["tex".to_string()],
            excludes: Vec::new(),
            default_excludes: true,
        }
    }
}

/// Collects all candidate citation files under `root`, in deterministic
/// walk order.
pub fn collect_corpus_files(root: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(config.default_excludes && is_hidden_or_underscore(entry)));

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf());
            Error::Read {
                path,
                source: err.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !has_wanted_extension(entry.path(), &config.extensions) {
            continue;
        }
        if is_excluded(entry.path(), &config.excludes) {
            continue;
        }
        files.push(entry.into_path());
    }

    Ok(files)
}

fn is_hidden_or_underscore(entry: &walkdir::DirEntry) -> bool {
    // The walk root itself is never skipped, even when invoked from a
    // hidden working directory.
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|s| s.starts_with('.') || s.starts_with('_'))
}

fn has_wanted_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
}

fn is_excluded(path: &Path, excludes: &[glob::Pattern]) -> bool {
    excludes.iter().any(|pattern| {
        pattern.matches_path(path)
            || path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "x").unwrap();
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn collects_matching_extensions_recursively() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("intro.tex"));
        touch(&dir.path().join("chapters/one.tex"));
        touch(&dir.path().join("chapters/figure.pdf"));
        touch(&dir.path().join("refs.bib"));

        let files = collect_corpus_files(dir.path(), &ScanConfig::default()).unwrap();
        let mut found = names(&files);
        found.sort();
        assert_eq!(found, vec!["intro.tex", "one.tex"]);
    }

    #[test]
    fn skips_hidden_and_underscore_entries_by_default() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("main.tex"));
        touch(&dir.path().join(".git/objects/blob.tex"));
        touch(&dir.path().join("_build/out.tex"));
        touch(&dir.path().join(".hidden.tex"));

        let files = collect_corpus_files(dir.path(), &ScanConfig::default()).unwrap();
        assert_eq!(names(&files), vec!["main.tex"]);
    }

    #[test]
    fn default_excludes_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("main.tex"));
        touch(&dir.path().join("_build/out.tex"));

        let config = ScanConfig {
            default_excludes: false,
            ..ScanConfig::default()
        };
        let files = collect_corpus_files(dir.path(), &config).unwrap();
        let mut found = names(&files);
        found.sort();
        assert_eq!(found, vec!["main.tex", "out.tex"]);
    }

    #[test]
    fn glob_excludes_filter_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("main.tex"));
        touch(&dir.path().join("main.generated.tex"));

        let config = ScanConfig {
            excludes: vec![glob::Pattern::new("*.generated.tex").unwrap()],
            ..ScanConfig::default()
        };
        let files = collect_corpus_files(dir.path(), &config).unwrap();
        assert_eq!(names(&files), vec!["main.tex"]);
    }

    #[test]
    fn extension_filter_is_configurable() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("notes.md"));
        touch(&dir.path().join("main.tex"));

        let config = ScanConfig {
            extensions: vec!["md".to_string(), "tex".to_string()],
            ..ScanConfig::default()
        };
        let files = collect_corpus_files(dir.path(), &config).unwrap();
        let mut found = names(&files);
        found.sort();
        assert_eq!(found, vec!["main.tex", "notes.md"]);
    }
}
