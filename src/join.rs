//! Applies the location matcher to a worker's bucket.

use crate::error::MatchStage;
use crate::matcher::{LocationMatcher, Resolution};
use crate::{Record, ResolvedRecord};

/// Attrition counters for one join.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JoinStats {
    pub direct: u64,
    pub capital_by_state: u64,
    pub capital_by_city: u64,
    /// Dropped by the false-positive filters.
    pub excluded: u64,
    /// Matched nothing. Expected and common.
    pub unresolved: u64,
}

impl JoinStats {
    pub fn resolved(&self) -> u64 {
        self.direct + self.capital_by_state + self.capital_by_city
    }

    pub fn dropped(&self) -> u64 {
        self.excluded + self.unresolved
    }
}

/// Joins raw records against the region catalog.
#[derive(Debug)]
pub struct JoinStage<'m> {
    matcher: &'m LocationMatcher,
}

impl<'m> JoinStage<'m> {
    pub fn new(matcher: &'m LocationMatcher) -> Self {
        Self { matcher }
    }

    /// Resolves every record, dropping the ones that do not resolve.
    ///
    /// Output is grouped by the cascade step that matched (direct matches
    /// first, then state->capital, then city->capital), each group in bucket
    /// order.
    pub fn run<I>(&self, bucket: I) -> (Vec<ResolvedRecord>, JoinStats)
    where
        I: IntoIterator<Item = Record>,
    {
        let mut stats = JoinStats::default();
        let mut direct = Vec::new();
        let mut by_state = Vec::new();
        let mut by_city = Vec::new();

        for record in bucket {
            match self.matcher.resolve(&record.raw_place) {
                Resolution::Matched { region_code, stage } => {
                    let resolved = ResolvedRecord::new(record.author_id, region_code);
                    match stage {
                        MatchStage::Direct => {
                            stats.direct += 1;
                            direct.push(resolved);
                        }
                        MatchStage::CapitalByState => {
                            stats.capital_by_state += 1;
                            by_state.push(resolved);
                        }
                        MatchStage::CapitalByCity => {
                            stats.capital_by_city += 1;
                            by_city.push(resolved);
                        }
                    }
                }
                Resolution::Excluded => stats.excluded += 1,
                Resolution::Unresolved => stats.unresolved += 1,
            }
        }

        direct.append(&mut by_state);
        direct.append(&mut by_city);
        (direct, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{RegionCatalog, RegionEntry};

    #[test]
    fn test_join_groups_by_stage_and_counts_attrition() {
        let catalog = RegionCatalog::from_entries(vec![
            RegionEntry::new("sydney", Some("nsw"), "1gsyd"),
            RegionEntry::new("melbourne", Some("vic."), "2gmel"),
        ]);
        let matcher = LocationMatcher::new(&catalog).unwrap();
        let bucket = vec![
            Record::new(1, "Melbourne"),
            Record::new(2, "Sydney, New South Wales"),
            Record::new(3, "Unknown Place, Nowhere"),
            Record::new(4, "Victoria, Australia"),
            Record::new(5, "Surry Hills, Sydney"),
        ];

        let (resolved, stats) = JoinStage::new(&matcher).run(bucket);
        assert_eq!(
            resolved,
            vec![
                ResolvedRecord::new(2, "1gsyd"),
                ResolvedRecord::new(5, "1gsyd"),
                ResolvedRecord::new(1, "2gmel"),
            ]
        );
        assert_eq!(
            stats,
            JoinStats {
                direct: 1,
                capital_by_state: 1,
                capital_by_city: 1,
                excluded: 1,
                unresolved: 1,
            }
        );
        assert_eq!(stats.resolved(), 3);
        assert_eq!(stats.dropped(), 2);
    }
}
