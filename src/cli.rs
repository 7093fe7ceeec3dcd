//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API.
//! Each subcommand corresponds to a distinct operation: reporting
//! duplicates and non-canonical keys, fixing the bibliography and its
//! citing documents, or listing scan targets.

use crate::grouper::DEFAULT_FUZZY_THRESHOLD;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Detect and fix duplicate entries and non-canonical citation keys in
/// BibTeX bibliographies.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report duplicate entries and non-canonical keys (read-only).
    Spot {
        /// Project root containing the bibliography and citing documents.
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Bibliography file. Defaults to `refs.bib` under --dir.
        #[arg(long)]
        bib: Option<PathBuf>,

        /// Also group entries whose normalized titles are merely similar.
        /// Off by default: a false merge silently deletes a real entry.
        #[arg(long)]
        fuzzy_titles: bool,

        /// Jaro-Winkler similarity cutoff for --fuzzy-titles.
        #[arg(long, default_value_t = DEFAULT_FUZZY_THRESHOLD, value_parser = parse_threshold)]
        fuzzy_threshold: f64,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,

        /// Print additional diagnostics to stderr.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Remove duplicates, rename keys to `surnameYYYYword`, and update
    /// every citing document.
    Fix {
        /// Project root containing the bibliography and citing documents.
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Bibliography file. Defaults to `refs.bib` under --dir.
        #[arg(long)]
        bib: Option<PathBuf>,

        /// Also group entries whose normalized titles are merely similar.
        #[arg(long)]
        fuzzy_titles: bool,

        /// Jaro-Winkler similarity cutoff for --fuzzy-titles.
        #[arg(long, default_value_t = DEFAULT_FUZZY_THRESHOLD, value_parser = parse_threshold)]
        fuzzy_threshold: f64,

        /// Preview all changes without modifying any file.
        #[arg(long)]
        dry_run: bool,

        /// Show the proposed changes and confirm before applying them.
        #[arg(short, long)]
        interactive: bool,

        /// Rewrite corpus files in parallel.
        #[arg(long)]
        parallel: bool,

        /// File extensions scanned for citations.
        #[arg(long = "ext", default_values_t = vec!["tex".to_string()])]
        extensions: Vec<String>,

        /// Glob patterns for files/directories to exclude (e.g.
        /// "build", "*.generated.tex"). By default, entries starting
        /// with `.` or `_` are excluded.
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Disable default exclusion of `.` and `_` prefixed entries.
        #[arg(long)]
        no_default_excludes: bool,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,

        /// Print additional diagnostics to stderr.
        #[arg(short, long)]
        verbose: bool,
    },

    /// List files that would be scanned for citations without processing
    /// them.
    Scan {
        /// Project root containing the citing documents.
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// File extensions scanned for citations.
        #[arg(long = "ext", default_values_t = vec!["tex".to_string()])]
        extensions: Vec<String>,

        /// Glob patterns for files/directories to exclude.
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Disable default exclusion of `.` and `_` prefixed entries.
        #[arg(long)]
        no_default_excludes: bool,
    },
}

fn parse_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("Invalid threshold '{}', expected a number", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("Threshold {} out of range, expected 0.0..=1.0", value))
    }
}
