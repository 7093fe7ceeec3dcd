//! bibfix: detect and fix duplicate entries and non-canonical citation
//! keys in BibTeX bibliographies.
//!
//! Spot mode reports duplicate groups and proposed renames without
//! touching any file. Fix mode snapshots the bibliography, removes
//! duplicates, renames every surviving key to `surnameYYYYword`, and
//! rewrites each citing document in place.

use anyhow::{Context, Result};
use bibfix::cli::{Args, Commands};
use bibfix::grouper::{GroupingConfig, TitleMatch};
use bibfix::pipeline::{self, FixOptions, FixReport, SpotReport};
use bibfix::scanner::{ScanConfig, collect_corpus_files};
use clap::Parser;
use colored::Colorize;
use dialoguer::Confirm;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Spot {
            dir,
            bib,
            fuzzy_titles,
            fuzzy_threshold,
            json,
            verbose,
        } => cmd_spot(&dir, bib, fuzzy_titles, fuzzy_threshold, json, verbose),
        Commands::Fix {
            dir,
            bib,
            fuzzy_titles,
            fuzzy_threshold,
            dry_run,
            interactive,
            parallel,
            extensions,
            exclude,
            no_default_excludes,
            json,
            verbose,
        } => cmd_fix(FixArgs {
            dir,
            bib,
            fuzzy_titles,
            fuzzy_threshold,
            dry_run,
            interactive,
            parallel,
            extensions,
            exclude,
            no_default_excludes,
            json,
            verbose,
        }),
        Commands::Scan {
            dir,
            extensions,
            exclude,
            no_default_excludes,
        } => cmd_scan(&dir, extensions, exclude, no_default_excludes),
    }
}

struct FixArgs {
    dir: PathBuf,
    bib: Option<PathBuf>,
    fuzzy_titles: bool,
    fuzzy_threshold: f64,
    dry_run: bool,
    interactive: bool,
    parallel: bool,
    extensions: Vec<String>,
    exclude: Vec<String>,
    no_default_excludes: bool,
    json: bool,
    verbose: bool,
}

fn cmd_spot(
    dir: &Path,
    bib: Option<PathBuf>,
    fuzzy_titles: bool,
    fuzzy_threshold: f64,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let bib_path = resolve_bib(dir, bib);
    let grouping = grouping_config(fuzzy_titles, fuzzy_threshold);

    let analysis = pipeline::analyze(&bib_path, &grouping)?;
    if verbose {
        eprintln!(
            "{} Parsed {} entries from {}",
            "info:".blue().bold(),
            analysis.bibliography.entries.len(),
            bib_path.display()
        );
    }

    let report = analysis.summarize();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_spot_report(&report);
    }

    Ok(())
}

fn cmd_fix(args: FixArgs) -> Result<()> {
    let bib_path = resolve_bib(&args.dir, args.bib);
    let grouping = grouping_config(args.fuzzy_titles, args.fuzzy_threshold);
    let scan = scan_config(args.extensions, &args.exclude, args.no_default_excludes)?;

    let analysis = pipeline::analyze(&bib_path, &grouping)?;
    if args.verbose {
        eprintln!(
            "{} Parsed {} entries from {}",
            "info:".blue().bold(),
            analysis.bibliography.entries.len(),
            bib_path.display()
        );
    }

    let preview = analysis.summarize();
    if !args.json {
        print_spot_report(&preview);
        println!();
    }

    if preview.duplicate_groups.is_empty() && preview.renames.is_empty() {
        if args.json {
            let report = FixReport {
                spot: preview,
                dry_run: args.dry_run,
                snapshot: None,
                entries_removed: 0,
                keys_renamed: 0,
                files_updated: 0,
                citations_rewritten: 0,
                updated_files: Vec::new(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{} Nothing to fix", "ok:".green().bold());
        }
        return Ok(());
    }

    if args.interactive && !args.dry_run {
        let proceed = Confirm::new()
            .with_prompt("Apply these changes?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !proceed {
            println!("{} Aborted, no files modified", "info:".blue().bold());
            return Ok(());
        }
    }

    let options = FixOptions {
        bib_path,
        corpus_root: args.dir,
        scan,
        parallel: args.parallel,
        dry_run: args.dry_run,
    };
    let report = pipeline::apply_fix(analysis, &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_fix_report(&report);
    }

    Ok(())
}

fn cmd_scan(
    dir: &Path,
    extensions: Vec<String>,
    exclude: Vec<String>,
    no_default_excludes: bool,
) -> Result<()> {
    let scan = scan_config(extensions, &exclude, no_default_excludes)?;
    let files = collect_corpus_files(dir, &scan)?;

    println!("Would scan {} files:", files.len());
    for file in files {
        println!("  {}", file.display());
    }

    Ok(())
}

fn resolve_bib(dir: &Path, bib: Option<PathBuf>) -> PathBuf {
    bib.unwrap_or_else(|| dir.join("refs.bib"))
}

fn grouping_config(fuzzy_titles: bool, fuzzy_threshold: f64) -> GroupingConfig {
    GroupingConfig {
        title_match: if fuzzy_titles {
            TitleMatch::Fuzzy {
                threshold: fuzzy_threshold,
            }
        } else {
            TitleMatch::Exact
        },
    }
}

fn scan_config(
    extensions: Vec<String>,
    exclude: &[String],
    no_default_excludes: bool,
) -> Result<ScanConfig> {
    let excludes = exclude
        .iter()
        .map(|pattern| {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid exclude pattern '{}'", pattern))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ScanConfig {
        extensions,
        excludes,
        default_excludes: !no_default_excludes,
    })
}

fn print_spot_report(report: &SpotReport) {
    if report.duplicate_groups.is_empty() {
        println!("{} No duplicate entries found", "ok:".green().bold());
    } else {
        println!(
            "{} {} duplicate group(s):\n",
            "Found".red().bold(),
            report.duplicate_groups.len()
        );
        for group in &report.duplicate_groups {
            println!(
                "  {} {}",
                group.kept.bold(),
                format!("(duplicates: {})", group.dropped.join(", ")).red()
            );
            if let Some(title) = &group.title {
                println!("    {}", truncate(title, 80).dimmed());
            }
            println!("    {} {}", "->".green(), group.new_key.green());
        }
    }

    println!();
    if report.renames.is_empty() {
        println!(
            "{} All keys match the canonical pattern",
            "ok:".green().bold()
        );
    } else {
        println!(
            "{} {} non-canonical key(s):\n",
            "Found".yellow().bold(),
            report.renames.len()
        );
        for rename in &report.renames {
            println!("  {} {} {}", rename.old.red(), "->".green(), rename.new.green());
        }
    }

    for warning in &report.warnings {
        eprintln!(
            "{} grouped '{}' and '{}' on fuzzy title similarity {:.3}",
            "warn:".yellow().bold(),
            warning.first_key,
            warning.second_key,
            warning.similarity
        );
    }
}

fn print_fix_report(report: &FixReport) {
    if report.dry_run {
        println!("{} no files were modified\n", "dry-run:".cyan().bold());
    }

    println!("Removed {} duplicate entries", report.entries_removed);
    println!("Renamed {} keys", report.keys_renamed);
    println!(
        "Updated {} files ({} citations rewritten)",
        report.files_updated, report.citations_rewritten
    );
    for file in &report.updated_files {
        println!(
            "  {} {} replacement(s)",
            file.path.display().to_string().dimmed(),
            file.replacements
        );
    }

    if let Some(snapshot) = &report.snapshot {
        println!(
            "\n{} Snapshot of the original bibliography at {}",
            "info:".blue().bold(),
            snapshot.display()
        );
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let cut: String = text.chars().take(limit).collect();
        format!("{cut}...")
    }
}
