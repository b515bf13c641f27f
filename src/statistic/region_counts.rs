//! Q1: the number of tweets made in each Greater Capital City.

use super::Tally;
use crate::ResolvedRecord;

/// Report labels of the capital regions. Other codes are not reported.
const DISPLAY_NAMES: [(&str, &str); 9] = [
    ("1gsyd", "1gsyd (Greater Sydney)"),
    ("2gmel", "2gmel (Greater Melbourne)"),
    ("3gbri", "3gbri (Greater Brisbane)"),
    ("4gade", "4gade (Greater Adelaide)"),
    ("5gper", "5gper (Greater Perth)"),
    ("6ghob", "6ghob (Greater Hobart)"),
    ("7gdar", "7gdar (Greater Darwin)"),
    ("8acte", "8acte (Australian Capital Territory)"),
    ("9oter", "9oter (Other Territories)"),
];

pub fn display_name(code: &str) -> Option<&'static str> {
    DISPLAY_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRow {
    /// Display label, e.g. `"1gsyd (Greater Sydney)"`.
    pub region: String,
    pub count: u64,
}

/// The worker's full region histogram, ranked.
pub fn local(joined: &[ResolvedRecord]) -> Vec<(String, u64)> {
    let mut tally = Tally::new();
    for record in joined {
        tally.add(record.region_code.clone(), 1);
    }
    tally.ranked()
}

/// Sums histograms by region code.
#[derive(Debug, Clone)]
pub struct Merge {
    tally: Tally<String>,
}

impl Merge {
    pub fn new(own: Vec<(String, u64)>) -> Self {
        Self {
            tally: own.into_iter().collect(),
        }
    }

    pub fn add(&mut self, partial: Vec<(String, u64)>) {
        self.tally.extend(partial);
    }

    pub fn finish(self, top_k: usize) -> Vec<RegionRow> {
        let mut named = Tally::new();
        for (code, count) in self.tally.into_entries() {
            if let Some(name) = display_name(&code) {
                named.add(name.to_string(), count);
            }
        }
        named
            .ranked()
            .into_iter()
            .take(top_k)
            .map(|(region, count)| RegionRow { region, count })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(codes: &[&str]) -> Vec<ResolvedRecord> {
        codes
            .iter()
            .enumerate()
            .map(|(i, c)| ResolvedRecord::new(i as u64, *c))
            .collect()
    }

    #[test]
    fn test_local_histogram_is_ranked() {
        let counts = local(&resolved(&["2gmel", "1gsyd", "1gsyd", "3rout"]));
        assert_eq!(
            counts,
            vec![
                ("1gsyd".to_string(), 2),
                ("2gmel".to_string(), 1),
                ("3rout".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_merge_sums_and_reports_only_capitals() {
        let mut merge = Merge::new(local(&resolved(&["1gsyd", "2gmel", "3rout"])));
        merge.add(local(&resolved(&["2gmel", "2gmel", "8acte"])));
        assert_eq!(
            merge.finish(10),
            vec![
                RegionRow {
                    region: "2gmel (Greater Melbourne)".into(),
                    count: 3
                },
                RegionRow {
                    region: "1gsyd (Greater Sydney)".into(),
                    count: 1
                },
                RegionRow {
                    region: "8acte (Australian Capital Territory)".into(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_merge_order_does_not_change_counts() {
        let a = vec![("1gsyd".to_string(), 4), ("2gmel".to_string(), 1)];
        let b = vec![("2gmel".to_string(), 2), ("5gper".to_string(), 7)];
        let c = vec![("1gsyd".to_string(), 1)];

        let mut forward = Merge::new(a.clone());
        forward.add(b.clone());
        forward.add(c.clone());
        let mut backward = Merge::new(c);
        backward.add(b);
        backward.add(a);

        let sorted = |mut rows: Vec<RegionRow>| {
            rows.sort_by(|x, y| x.region.cmp(&y.region));
            rows
        };
        assert_eq!(sorted(forward.finish(10)), sorted(backward.finish(10)));
    }
}
