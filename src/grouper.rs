//! Duplicate grouping over the entry store.
//!
//! Partitions entries into groups that denote the same work. Two entries
//! match when their normalized titles agree under the configured policy,
//! their normalized years agree, and their author surname sets share at
//! least one name. Matching is transitive: merging runs through an
//! explicit disjoint-set keyed by entry index, so A~B and B~C land A, B
//! and C in one group even when A and C alone would not match.
//!
//! A false merge silently deletes a real entry, so the title policy
//! defaults to exact equality after normalization. Fuzzy matching is
//! strictly opt-in, and every union that relied on it is reported as a
//! warning for human review.

use crate::normalize;
use crate::parser::Entry;
use petgraph::unionfind::UnionFind;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use strsim::jaro_winkler;

/// Default Jaro-Winkler cutoff when fuzzy title matching is enabled.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.95;

/// Title equality policy for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TitleMatch {
    /// Exact equality after normalization. The conservative default.
    #[default]
    Exact,
    /// Jaro-Winkler similarity at or above the threshold also matches.
    Fuzzy { threshold: f64 },
}

/// Configuration for the grouping pass.
#[derive(Debug, Clone, Default)]
pub struct GroupingConfig {
    pub title_match: TitleMatch,
}

/// A grouping decision that relied on fuzzy title matching below full
/// confidence. Non-fatal; surfaced in the report so a human can review
/// before running fix.
#[derive(Debug, Clone, Serialize)]
pub struct GroupingWarning {
    pub first_key: String,
    pub second_key: String,
    pub similarity: f64,
}

/// A set of entries judged to denote the same work.
///
/// `members` holds entry-store indices in ascending order; the
/// representative is the lowest (first occurrence wins).
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub representative: usize,
    pub members: Vec<usize>,
}

/// Result of a grouping pass: a full partition of the store (singletons
/// included) plus any fuzzy-match warnings.
#[derive(Debug)]
pub struct Grouping {
    pub groups: Vec<DuplicateGroup>,
    pub warnings: Vec<GroupingWarning>,
}

struct Identity {
    surnames: BTreeSet<String>,
    year: String,
    title: String,
}

/// Derived comparison identity, or `None` for entries that must stay
/// singletons: missing author (and editor), missing year, or an empty
/// title give the grouper nothing trustworthy to match on.
fn identity(entry: &Entry) -> Option<Identity> {
    let author = entry.field("author").or_else(|| entry.field("editor"))?;
    let surnames = normalize::surname_set(author);
    if surnames.is_empty() {
        return None;
    }
    let year = normalize::normalize_year(entry.field("year")?)?;
    let title = normalize::normalize_title(entry.field("title")?);
    if title.is_empty() {
        return None;
    }
    Some(Identity { surnames, year, title })
}

enum TitleVerdict {
    Match,
    FuzzyMatch(f64),
    Differ,
}

fn titles_match(a: &str, b: &str, policy: TitleMatch) -> TitleVerdict {
    if a == b {
        return TitleVerdict::Match;
    }
    if let TitleMatch::Fuzzy { threshold } = policy {
        let similarity = jaro_winkler(a, b);
        if similarity >= threshold {
            return TitleVerdict::FuzzyMatch(similarity);
        }
    }
    TitleVerdict::Differ
}

/// Partitions the store into duplicate groups.
pub fn group_entries(entries: &[Entry], config: &GroupingConfig) -> Grouping {
    let mut sets = UnionFind::<usize>::new(entries.len());
    let mut warnings = Vec::new();

    // Entries carrying the same key are the same entry, whatever their
    // metadata says.
    let mut first_with_key: HashMap<&str, usize> = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
        match first_with_key.entry(entry.key()) {
            std::collections::hash_map::Entry::Occupied(first) => {
                sets.union(*first.get(), index);
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(index);
            }
        }
    }

    let identities: Vec<Option<Identity>> = entries.iter().map(identity).collect();

    // Year buckets bound the pairwise scan: entries in different years can
    // never match.
    let mut by_year: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, identity) in identities.iter().enumerate() {
        if let Some(identity) = identity {
            by_year.entry(identity.year.as_str()).or_default().push(index);
        }
    }

    for bucket in by_year.values() {
        for (position, &left) in bucket.iter().enumerate() {
            for &right in &bucket[position + 1..] {
                let (Some(a), Some(b)) = (&identities[left], &identities[right]) else {
                    continue;
                };
                if a.surnames.is_disjoint(&b.surnames) {
                    continue;
                }
                match titles_match(&a.title, &b.title, config.title_match) {
                    TitleVerdict::Match => {
                        sets.union(left, right);
                    }
                    TitleVerdict::FuzzyMatch(similarity) => {
                        if sets.union(left, right) {
                            warnings.push(GroupingWarning {
                                first_key: entries[left].key().to_string(),
                                second_key: entries[right].key().to_string(),
                                similarity,
                            });
                        }
                    }
                    TitleVerdict::Differ => {}
                }
            }
        }
    }

    let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for index in 0..entries.len() {
        components.entry(sets.find(index)).or_default().push(index);
    }
    let mut groups: Vec<DuplicateGroup> = components
        .into_values()
        .map(|members| DuplicateGroup {
            representative: members[0],
            members,
        })
        .collect();
    groups.sort_by_key(|group| group.representative);

    Grouping { groups, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Bibliography;

    fn entries(source: &str) -> Vec<Entry> {
        Bibliography::parse(source).unwrap().entries
    }

    fn group_keys(entries: &[Entry], grouping: &Grouping) -> Vec<Vec<String>> {
        grouping
            .groups
            .iter()
            .map(|g| g.members.iter().map(|&i| entries[i].key().to_string()).collect())
            .collect()
    }

    #[test]
    fn groups_same_work_under_different_keys() {
        let entries = entries(
            r#"@article{wood2014, author = {Gavin Wood}, year = 2014,
                 title = {Ethereum: A Secure Decentralised Generalised Transaction Ledger}}
               @article{wood14eth, author = {G. Wood}, year = 2014,
                 title = {Ethereum: A Secure Decentralised Generalised Transaction Ledger}}"#,
        );
        let grouping = group_entries(&entries, &GroupingConfig::default());
        assert_eq!(grouping.groups.len(), 1);
        assert_eq!(grouping.groups[0].representative, 0);
        assert_eq!(grouping.groups[0].members, vec![0, 1]);
        assert!(grouping.warnings.is_empty());
    }

    #[test]
    fn different_titles_stay_separate_by_default() {
        let entries = entries(
            "@article{a, author = {Smith, J.}, year = 2020, title = {Machine Learning Basics}}\n\
             @article{b, author = {Smith, J.}, year = 2020, title = {Machine Learning Basic}}",
        );
        let grouping = group_entries(&entries, &GroupingConfig::default());
        assert_eq!(grouping.groups.len(), 2);
    }

    #[test]
    fn fuzzy_matching_is_explicit_opt_in_and_warns() {
        let source =
            "@article{a, author = {Smith, J.}, year = 2020, title = {Machine Learning Basics}}\n\
             @article{b, author = {Smith, J.}, year = 2020, title = {Machine Learning Basic}}";
        let entries = entries(source);
        let config = GroupingConfig {
            title_match: TitleMatch::Fuzzy { threshold: 0.9 },
        };
        let grouping = group_entries(&entries, &config);
        assert_eq!(grouping.groups.len(), 1);
        assert_eq!(grouping.warnings.len(), 1);
        let warning = &grouping.warnings[0];
        assert_eq!(warning.first_key, "a");
        assert_eq!(warning.second_key, "b");
        assert!(warning.similarity >= 0.9 && warning.similarity < 1.0);
    }

    #[test]
    fn unrelated_titles_stay_separate_even_with_fuzzy() {
        let entries = entries(
            "@article{a, author = {Smith, J.}, year = 2020, title = {Machine Learning Basics}}\n\
             @article{b, author = {Smith, J.}, year = 2020, title = {Completely Different Topic}}",
        );
        let config = GroupingConfig {
            title_match: TitleMatch::Fuzzy {
                threshold: DEFAULT_FUZZY_THRESHOLD,
            },
        };
        let grouping = group_entries(&entries, &config);
        assert_eq!(grouping.groups.len(), 2);
        assert!(grouping.warnings.is_empty());
    }

    #[test]
    fn different_years_never_match() {
        let entries = entries(
            "@article{a, author = {Smith, J.}, year = 2019, title = {Same Title}}\n\
             @article{b, author = {Smith, J.}, year = 2020, title = {Same Title}}",
        );
        let grouping = group_entries(&entries, &GroupingConfig::default());
        assert_eq!(grouping.groups.len(), 2);
    }

    #[test]
    fn disjoint_author_sets_never_match() {
        let entries = entries(
            "@article{a, author = {Smith, J.}, year = 2020, title = {Same Title}}\n\
             @article{b, author = {Jones, K.}, year = 2020, title = {Same Title}}",
        );
        let grouping = group_entries(&entries, &GroupingConfig::default());
        assert_eq!(grouping.groups.len(), 2);
    }

    #[test]
    fn missing_author_or_year_means_singleton() {
        let entries = entries(
            "@misc{noauthor1, year = 2020, title = {Orphan Work}}\n\
             @misc{noauthor2, year = 2020, title = {Orphan Work}}\n\
             @misc{noyear1, author = {Smith, J.}, title = {Undated Work}}\n\
             @misc{noyear2, author = {Smith, J.}, title = {Undated Work}}",
        );
        let grouping = group_entries(&entries, &GroupingConfig::default());
        assert_eq!(grouping.groups.len(), 4);
    }

    #[test]
    fn editor_substitutes_for_missing_author() {
        let entries = entries(
            "@book{a, editor = {Knuth, D.}, year = 1997, title = {Collected Papers}}\n\
             @book{b, editor = {Knuth, Donald}, year = 1997, title = {Collected Papers}}",
        );
        let grouping = group_entries(&entries, &GroupingConfig::default());
        assert_eq!(grouping.groups.len(), 1);
    }

    #[test]
    fn surname_overlap_is_transitive_through_union_find() {
        // a~b share smith, b~c share jones; a and c alone share nobody.
        let entries = entries(
            "@article{a, author = {Smith, J.}, year = 2020, title = {Joint Work}}\n\
             @article{b, author = {Smith, J. and Jones, K.}, year = 2020, title = {Joint Work}}\n\
             @article{c, author = {Jones, K.}, year = 2020, title = {Joint Work}}",
        );
        let grouping = group_entries(&entries, &GroupingConfig::default());
        assert_eq!(grouping.groups.len(), 1);
        assert_eq!(grouping.groups[0].members, vec![0, 1, 2]);
    }

    #[test]
    fn identical_keys_group_regardless_of_metadata() {
        let entries = entries(
            "@article{same, author = {Smith, J.}, year = 2020, title = {One Thing}}\n\
             @misc{same, title = {Entirely Other Thing}}",
        );
        let grouping = group_entries(&entries, &GroupingConfig::default());
        assert_eq!(grouping.groups.len(), 1);
        assert_eq!(grouping.groups[0].members, vec![0, 1]);
    }

    #[test]
    fn diacritics_fold_before_comparison() {
        let entries = entries(
            "@article{a, author = {Müller, F.}, year = 2018, title = {Étude of Systems}}\n\
             @article{b, author = {Muller, F.}, year = 2018, title = {Etude of Systems}}",
        );
        let grouping = group_entries(&entries, &GroupingConfig::default());
        assert_eq!(grouping.groups.len(), 1);
    }

    #[test]
    fn partition_covers_every_entry_exactly_once() {
        let entries = entries(
            "@article{a, author = {Smith, J.}, year = 2020, title = {T1}}\n\
             @article{b, author = {Smith, J.}, year = 2020, title = {T1}}\n\
             @article{c, author = {Doe, J.}, year = 2021, title = {T2}}\n\
             @misc{d, title = {No Metadata}}",
        );
        let grouping = group_entries(&entries, &GroupingConfig::default());
        let mut seen: Vec<usize> = grouping.groups.iter().flat_map(|g| g.members.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
        let keys = group_keys(&entries, &grouping);
        assert_eq!(keys, vec![vec!["a", "b"], vec!["c"], vec!["d"]]);
    }
}
