//! Q3: the authors who tweeted from the most Greater Capital Cities.
//!
//! Unlike the other statistics, partial lists are concatenated rather than
//! merged by author, then re-ranked and cut again.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::catalog::is_capital_code;
use crate::{AuthorId, ResolvedRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiversityRow {
    pub author_id: AuthorId,
    /// Tweets per capital region, most tweeted first.
    pub regions: Vec<(String, u64)>,
    pub region_count: u64,
    pub total_count: u64,
}

impl DiversityRow {
    fn new(author_id: AuthorId, mut regions: Vec<(String, u64)>) -> Self {
        regions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Self {
            author_id,
            region_count: regions.len() as u64,
            total_count: regions.iter().map(|(_, count)| count).sum(),
            regions,
        }
    }

    /// Renders the row as `2 (#3 tweets - 2gsyd, 1gmel)`.
    ///
    /// Each region loses its leading state digit.
    pub fn message(&self) -> String {
        let regions = self.regions.iter().format_with(", ", |(code, count), f| {
            f(&format_args!("{count}{}", code.get(1..).unwrap_or_default()))
        });
        format!(
            "{} (#{} tweets - {regions})",
            self.region_count, self.total_count
        )
    }
}

/// Region count first, then total tweets. Stable.
fn rank(rows: &mut [DiversityRow]) {
    rows.sort_by(|a, b| {
        b.region_count
            .cmp(&a.region_count)
            .then_with(|| b.total_count.cmp(&a.total_count))
    });
}

/// The worker's `top_k` most widely travelled authors.
///
/// Only capital regions count. Equal rows stay in author id order.
pub fn local(joined: &[ResolvedRecord], top_k: usize) -> Vec<DiversityRow> {
    let mut pairs: Vec<(AuthorId, &str)> = joined
        .iter()
        .filter(|r| is_capital_code(&r.region_code))
        .map(|r| (r.author_id, r.region_code.as_str()))
        .collect();
    pairs.sort_unstable();

    let mut rows = Vec::new();
    for (author_id, group) in &pairs.into_iter().chunk_by(|&(author_id, _)| author_id) {
        let regions = group
            .map(|(_, code)| code)
            .dedup_with_count()
            .map(|(count, code)| (code.to_string(), count as u64))
            .collect();
        rows.push(DiversityRow::new(author_id, regions));
    }
    rank(&mut rows);
    rows.truncate(top_k);
    rows
}

/// Concatenates partial lists in arrival order.
#[derive(Debug, Clone)]
pub struct Merge {
    rows: Vec<DiversityRow>,
}

impl Merge {
    pub fn new(own: Vec<DiversityRow>) -> Self {
        Self { rows: own }
    }

    pub fn add(&mut self, mut partial: Vec<DiversityRow>) {
        self.rows.append(&mut partial);
    }

    pub fn finish(self, top_k: usize) -> Vec<DiversityRow> {
        let mut rows = self.rows;
        rank(&mut rows);
        rows.truncate(top_k);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(pairs: &[(u64, &str)]) -> Vec<ResolvedRecord> {
        pairs
            .iter()
            .map(|&(author, code)| ResolvedRecord::new(author, code))
            .collect()
    }

    #[test]
    fn test_message_format() {
        let row = DiversityRow::new(
            9,
            vec![("2gmel".into(), 1), ("1gsyd".into(), 2), ("5gper".into(), 1)],
        );
        assert_eq!(row.message(), "3 (#4 tweets - 2gsyd, 1gmel, 1gper)");
    }

    #[test]
    fn test_local_counts_capitals_only() {
        let rows = local(
            &joined(&[
                (1, "1gsyd"),
                (1, "1rnsw"),
                (2, "1gsyd"),
                (2, "2gmel"),
                (1, "1gsyd"),
            ]),
            10,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].author_id, 2);
        assert_eq!(rows[0].message(), "2 (#2 tweets - 1gsyd, 1gmel)");
        assert_eq!(rows[1].author_id, 1);
        assert_eq!(rows[1].message(), "1 (#2 tweets - 2gsyd)");
    }

    #[test]
    fn test_local_ties_stay_in_author_order() {
        let rows = local(&joined(&[(30, "1gsyd"), (10, "2gmel"), (20, "3gbri")]), 2);
        let authors: Vec<_> = rows.iter().map(|r| r.author_id).collect();
        assert_eq!(authors, vec![10, 20]);
    }

    #[test]
    fn test_merge_keeps_duplicate_authors() {
        let a = DiversityRow::new(5, vec![("1gsyd".into(), 3)]);
        let b = DiversityRow::new(5, vec![("2gmel".into(), 1), ("3gbri".into(), 1)]);
        let mut merge = Merge::new(vec![a.clone()]);
        merge.add(vec![b.clone()]);
        assert_eq!(merge.finish(10), vec![b, a]);
    }

    #[test]
    fn test_merge_ties_keep_arrival_order() {
        let a = DiversityRow::new(8, vec![("1gsyd".into(), 1)]);
        let b = DiversityRow::new(3, vec![("2gmel".into(), 1)]);
        let mut merge = Merge::new(vec![a.clone()]);
        merge.add(vec![b.clone()]);
        assert_eq!(merge.finish(1), vec![a]);
    }
}
