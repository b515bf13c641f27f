//! The three statistics computed by the pipeline.
//!
//! Every statistic follows the same shape: each worker computes a
//! [`PartialAggregate`] from its own data, non-coordinators send theirs to
//! worker 0, and the coordinator folds them into an [`Accumulator`] in
//! increasing worker order before ranking the result.
//!
//! # Example
//!
//! ```
//! # use gcclite::statistic;
//! let q2 = statistic::named("top-authors")?;
//! assert_eq!(q2, statistic::Statistic::TopAuthors);
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::hash::Hash;

use anyhow::{bail, Result};
use fnv::FnvBuildHasher;
use indexmap::IndexMap;

use crate::error::CommError;
use crate::{Record, ResolvedRecord};

pub mod diversity;
pub mod message;
pub mod region_counts;
pub mod top_authors;

pub use diversity::DiversityRow;
pub use message::PartialAggregate;
pub use region_counts::RegionRow;
pub use top_authors::AuthorRow;

/// Rows kept by every top-K statistic.
pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    /// Q1: tweets per Greater Capital City.
    RegionCounts,
    /// Q2: authors with the most tweets.
    TopAuthors,
    /// Q3: authors who tweeted from the most capital regions.
    AuthorDiversity,
}

impl Statistic {
    /// All statistics, in the order they are gathered.
    pub const ALL: [Statistic; 3] = [
        Statistic::RegionCounts,
        Statistic::TopAuthors,
        Statistic::AuthorDiversity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Statistic::RegionCounts => "region-counts",
            Statistic::TopAuthors => "top-authors",
            Statistic::AuthorDiversity => "author-diversity",
        }
    }

    /// Computes this worker's partial result.
    ///
    /// `bucket` is the partitioned (pre-join) bucket, `joined` its resolved
    /// records.
    pub fn local(
        self,
        bucket: &[Record],
        joined: &[ResolvedRecord],
        top_k: usize,
    ) -> PartialAggregate {
        match self {
            Statistic::RegionCounts => PartialAggregate::RegionCounts(region_counts::local(joined)),
            Statistic::TopAuthors => {
                PartialAggregate::TopAuthors(top_authors::local(bucket, top_k))
            }
            Statistic::AuthorDiversity => {
                PartialAggregate::AuthorDiversity(diversity::local(joined, top_k))
            }
        }
    }
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Gets the [`Statistic`] named `name`.
///
/// Returns [`None`] if no statistic with the given name was found.
pub fn try_named(name: &str) -> Option<Statistic> {
    Statistic::ALL.into_iter().find(|s| s.name() == name)
}

/// Gets the [`Statistic`] named `name`.
///
/// Returns an [`anyhow::Error`] if no statistic with the given name was found.
pub fn named(name: &str) -> Result<Statistic> {
    match try_named(name) {
        Some(statistic) => Ok(statistic),
        None => bail!("No statistic named `{}` found.", name),
    }
}

/////////////////////////////////////////////////////////////////////////////
// Counting
/////////////////////////////////////////////////////////////////////////////

/// A counter that remembers the order keys were first seen in.
///
/// Ranking is a stable sort by count, so ties keep first-seen order.
#[derive(Debug, Clone)]
pub struct Tally<K> {
    counts: IndexMap<K, u64, FnvBuildHasher>,
}

impl<K> Default for Tally<K> {
    fn default() -> Self {
        Self {
            counts: IndexMap::default(),
        }
    }
}

impl<K: Hash + Eq> Tally<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K, count: u64) {
        *self.counts.entry(key).or_insert(0) += count;
    }

    pub fn get(&self, key: &K) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries in first-seen order.
    pub fn into_entries(self) -> Vec<(K, u64)> {
        self.counts.into_iter().collect()
    }

    /// Entries by count, highest first; ties in first-seen order.
    pub fn ranked(self) -> Vec<(K, u64)> {
        let mut counts = self.counts;
        counts.sort_by(|_, a, _, b| b.cmp(a));
        counts.into_iter().collect()
    }
}

impl<K: Hash + Eq> FromIterator<(K, u64)> for Tally<K> {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for (key, count) in iter {
            tally.add(key, count);
        }
        tally
    }
}

impl<K: Hash + Eq> Extend<(K, u64)> for Tally<K> {
    fn extend<I: IntoIterator<Item = (K, u64)>>(&mut self, iter: I) {
        for (key, count) in iter {
            self.add(key, count);
        }
    }
}

/////////////////////////////////////////////////////////////////////////////
// Coordinator-side merging
/////////////////////////////////////////////////////////////////////////////

/// A statistic's final, ranked rows.
#[derive(Debug, Clone, PartialEq)]
pub enum StatisticTable {
    RegionCounts(Vec<RegionRow>),
    TopAuthors(Vec<AuthorRow>),
    AuthorDiversity(Vec<DiversityRow>),
}

/// The coordinator's running merge of one statistic.
///
/// Owned by the coordinator's receive loop and fed one partial at a time.
#[derive(Debug, Clone)]
pub enum Accumulator {
    RegionCounts(region_counts::Merge),
    TopAuthors(top_authors::Merge),
    AuthorDiversity(diversity::Merge),
}

impl Accumulator {
    /// Starts from the coordinator's own partial.
    pub fn new(own: PartialAggregate) -> Self {
        match own {
            PartialAggregate::RegionCounts(counts) => {
                Accumulator::RegionCounts(region_counts::Merge::new(counts))
            }
            PartialAggregate::TopAuthors(counts) => {
                Accumulator::TopAuthors(top_authors::Merge::new(counts))
            }
            PartialAggregate::AuthorDiversity(rows) => {
                Accumulator::AuthorDiversity(diversity::Merge::new(rows))
            }
        }
    }

    pub fn statistic(&self) -> Statistic {
        match self {
            Accumulator::RegionCounts(_) => Statistic::RegionCounts,
            Accumulator::TopAuthors(_) => Statistic::TopAuthors,
            Accumulator::AuthorDiversity(_) => Statistic::AuthorDiversity,
        }
    }

    /// Folds in another worker's partial. Partials of another kind are rejected.
    pub fn merge(&mut self, partial: PartialAggregate) -> Result<(), CommError> {
        match (self, partial) {
            (Accumulator::RegionCounts(merge), PartialAggregate::RegionCounts(counts)) => {
                merge.add(counts)
            }
            (Accumulator::TopAuthors(merge), PartialAggregate::TopAuthors(counts)) => {
                merge.add(counts)
            }
            (Accumulator::AuthorDiversity(merge), PartialAggregate::AuthorDiversity(rows)) => {
                merge.add(rows)
            }
            (this, other) => {
                return Err(CommError::KindMismatch {
                    expected: this.statistic().name(),
                    actual: other.statistic().name(),
                })
            }
        }
        Ok(())
    }

    /// Ranks the merged data and keeps the top `top_k` rows.
    pub fn finish(self, top_k: usize) -> StatisticTable {
        match self {
            Accumulator::RegionCounts(merge) => StatisticTable::RegionCounts(merge.finish(top_k)),
            Accumulator::TopAuthors(merge) => StatisticTable::TopAuthors(merge.finish(top_k)),
            Accumulator::AuthorDiversity(merge) => {
                StatisticTable::AuthorDiversity(merge.finish(top_k))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_ranks_stably() {
        let tally: Tally<&str> = [("b", 1), ("a", 2), ("c", 1), ("b", 1)].into_iter().collect();
        assert_eq!(tally.get(&"b"), Some(2));
        assert_eq!(tally.ranked(), vec![("b", 2), ("a", 2), ("c", 1)]);
    }

    #[test]
    fn test_tally_extend_keeps_first_seen_order() {
        let mut tally: Tally<u64> = [(7, 1), (3, 4)].into_iter().collect();
        tally.extend([(9, 2), (7, 3)]);
        assert_eq!(tally.len(), 3);
        assert_eq!(tally.into_entries(), vec![(7, 4), (3, 4), (9, 2)]);
    }

    #[test]
    fn test_named() {
        assert_eq!(try_named("region-counts"), Some(Statistic::RegionCounts));
        assert_eq!(try_named("author-diversity"), Some(Statistic::AuthorDiversity));
        assert!(named("word-count").is_err());
    }

    #[test]
    fn test_accumulator_rejects_other_kinds() {
        let mut acc = Accumulator::new(PartialAggregate::TopAuthors(vec![(1, 1)]));
        let err = acc
            .merge(PartialAggregate::RegionCounts(vec![("1gsyd".into(), 1)]))
            .unwrap_err();
        assert!(matches!(
            err,
            CommError::KindMismatch {
                expected: "top-authors",
                actual: "region-counts"
            }
        ));
    }
}
