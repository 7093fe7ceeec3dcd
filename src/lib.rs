//! bibfix library for detecting and fixing duplicate bibliography entries
//! and non-canonical citation keys.
//!
//! When several independently written papers are merged into one document,
//! the shared bibliography accumulates entries that describe the same work
//! under different keys. This library provides the full normalization
//! pipeline in four phases:
//!
//! 1. **Parsing**: read the bibliography into an ordered, loss-free store
//! 2. **Grouping**: partition entries that denote the same work via
//!    union-find over author/year/title similarity
//! 3. **Key planning**: derive one canonical `surnameYYYYword` key per group
//!    and build the total old-key to new-key mapping
//! 4. **Rewriting**: rename keys in the bibliography and propagate every
//!    rename across the citing documents
//!
//! # Example
//!
//! ```no_run
//! use bibfix::grouper::GroupingConfig;
//! use bibfix::pipeline;
//! use std::path::Path;
//!
//! // Read-only analysis: duplicates and proposed renames, no writes.
//! let analysis = pipeline::analyze(Path::new("refs.bib"), &GroupingConfig::default()).unwrap();
//! let report = analysis.summarize();
//!
//! println!(
//!     "{} duplicate group(s), {} key(s) to rename",
//!     report.duplicate_groups.len(),
//!     report.renames.len()
//! );
//! ```

use std::path::PathBuf;

pub mod canonical;
pub mod cli;
pub mod grouper;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod rewriter;
pub mod scanner;

// Re-export commonly used types at crate root
pub use canonical::KeyPlan;
pub use grouper::{DuplicateGroup, GroupingConfig, GroupingWarning, TitleMatch};
pub use parser::{Bibliography, Entry};
pub use pipeline::{Analysis, FixOptions, FixReport, SpotReport};

/// A specialized Result type for bibliography operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the pipeline. Every variant is fatal for the run in
/// which it occurs; fix mode orders its steps so that the snapshot exists
/// before the first one that can mutate anything.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structurally unrecoverable bibliography source.
    #[error("malformed bibliography at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// A bibliography or corpus file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pre-mutation snapshot could not be created. Raised before any
    /// write, so the source tree is untouched.
    #[error("failed to create snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bibliography or a corpus file could not be persisted. Files
    /// written earlier in the run are left as-is; the snapshot is the
    /// recovery path.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
