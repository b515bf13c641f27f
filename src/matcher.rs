//! Resolves free-text tweet places to region codes.
//!
//! A place such as `"Sydney, New South Wales"` is first split into a
//! [`PlaceQuery`] (`city = "sydney"`, `state = "nsw"`), then run through the
//! cascade:
//!
//! 1. `(city, state)` against every catalog entry,
//! 2. `state` against the capital subset's city (tweets that give `"Sydney"`
//!    where a state would be),
//! 3. `city` against the capital subset's city.
//!
//! The first step that matches wins. Each lookup index is checked to be
//! one-to-one when the matcher is built, so a match is never ambiguous.

use fnv::FnvHashMap;

use crate::catalog::RegionCatalog;
use crate::error::{Error, MatchStage, Result};

/// Full state names as they appear in tweet places.
const STATE_ALIASES: [(&str, &str); 8] = [
    ("victoria", "vic."),
    ("new south wales", "nsw"),
    ("queensland", "qld"),
    ("western australia", "wa"),
    ("south australia", "sa"),
    ("tasmania", "tas."),
    ("northern territory", "nt"),
    ("australian capital territory", "act"),
];

/// Cities that are really a country or a state.
const CITY_FALSE_POSITIVES: [&str; 9] = [
    "australia",
    "new south wales",
    "victoria",
    "queensland",
    "western australia",
    "south australia",
    "northern territory",
    "australian capital territory",
    "tasmania",
];

/// States seen on tweets that are actually abroad.
const STATE_FALSE_POSITIVES: [&str; 2] = ["ontario", "denver"];

/// A preprocessed place string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceQuery {
    pub city: String,
    pub state: Option<String>,
}

impl PlaceQuery {
    /// Splits a raw place into city and state.
    ///
    /// Returns `None` for places on the false-positive lists.
    pub fn parse(raw_place: &str) -> Option<Self> {
        let mut parts = raw_place.split(", ");
        let city_part = parts.next().unwrap_or_default().to_lowercase();
        let state_part = parts.next().map(str::to_lowercase);

        let city = city_part.split(" - ").next().unwrap_or_default();
        let city = city.split('(').next().unwrap_or_default().trim().to_string();

        let state = state_part.map(|state| {
            let state = state.rsplit('(').next().unwrap_or_default().trim();
            let state = state.replace(')', "");
            match STATE_ALIASES.iter().find(|(name, _)| *name == state) {
                Some((_, abbrev)) => abbrev.to_string(),
                None => state,
            }
        });

        if CITY_FALSE_POSITIVES.contains(&city.as_str()) {
            return None;
        }
        if let Some(state) = &state {
            if STATE_FALSE_POSITIVES.contains(&state.as_str()) {
                return None;
            }
        }
        Some(Self { city, state })
    }
}

/// Outcome of resolving one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Matched { region_code: String, stage: MatchStage },
    /// Dropped by the false-positive filters before matching.
    Excluded,
    /// No cascade step matched.
    Unresolved,
}

impl Resolution {
    pub fn region_code(&self) -> Option<&str> {
        match self {
            Resolution::Matched { region_code, .. } => Some(region_code),
            _ => None,
        }
    }
}

/// A lookup table whose keys are known to be unique.
#[derive(Debug, Default)]
struct UniqueIndex<K> {
    codes: FnvHashMap<K, String>,
}

impl<K> UniqueIndex<K>
where
    K: std::hash::Hash + Eq + std::fmt::Debug,
{
    /// Builds the index, failing if a key maps to more than one region code.
    fn build(stage: MatchStage, rows: impl IntoIterator<Item = (K, String)>) -> Result<Self> {
        let mut codes = FnvHashMap::default();
        let mut duplicates: Vec<(String, usize)> = Vec::new();
        for (key, code) in rows {
            if codes.contains_key(&key) {
                let shown = format!("{key:?}");
                match duplicates.iter_mut().find(|(k, _)| *k == shown) {
                    Some((_, count)) => *count += 1,
                    None => duplicates.push((shown, 2)),
                }
            } else {
                codes.insert(key, code);
            }
        }
        if let Some((key, count)) = duplicates.into_iter().next() {
            return Err(Error::MatchCardinality { stage, key, count });
        }
        Ok(Self { codes })
    }

    fn get(&self, key: &K) -> Option<&String> {
        self.codes.get(key)
    }
}

/// The matching cascade over one catalog.
#[derive(Debug)]
pub struct LocationMatcher {
    direct: UniqueIndex<(String, String)>,
    capitals: UniqueIndex<String>,
}

impl LocationMatcher {
    /// Indexes `catalog` for matching.
    ///
    /// Fails with [`Error::MatchCardinality`] if a direct `(city, state)` key
    /// or a capital city name maps to more than one catalog row.
    pub fn new(catalog: &RegionCatalog) -> Result<Self> {
        let direct = UniqueIndex::build(
            MatchStage::Direct,
            catalog.entries().iter().filter_map(|e| {
                e.state_code
                    .as_ref()
                    .map(|state| ((e.canonical_city.clone(), state.clone()), e.region_code.clone()))
            }),
        )?;
        let capitals = UniqueIndex::build(
            MatchStage::CapitalByState,
            catalog
                .capitals()
                .map(|e| (e.canonical_city.clone(), e.region_code.clone())),
        )?;
        Ok(Self { direct, capitals })
    }

    /// Resolves a raw place string.
    pub fn resolve(&self, raw_place: &str) -> Resolution {
        match PlaceQuery::parse(raw_place) {
            Some(query) => self.resolve_query(&query),
            None => Resolution::Excluded,
        }
    }

    /// Runs the cascade on an already parsed place.
    pub fn resolve_query(&self, query: &PlaceQuery) -> Resolution {
        let matched = |region_code: &String, stage| Resolution::Matched {
            region_code: region_code.clone(),
            stage,
        };

        if let Some(state) = &query.state {
            if let Some(code) = self.direct.get(&(query.city.clone(), state.clone())) {
                return matched(code, MatchStage::Direct);
            }
            if let Some(code) = self.capitals.get(state) {
                return matched(code, MatchStage::CapitalByState);
            }
        }
        match self.capitals.get(&query.city) {
            Some(code) => matched(code, MatchStage::CapitalByCity),
            None => Resolution::Unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RegionEntry;

    fn catalog() -> RegionCatalog {
        RegionCatalog::from_entries(vec![
            RegionEntry::new("sydney", Some("nsw"), "1gsyd"),
            RegionEntry::new("melbourne", Some("vic."), "2gmel"),
            RegionEntry::new("parramatta", Some("nsw"), "1gsyd"),
            RegionEntry::new("geelong", Some("vic."), "2rvic"),
            RegionEntry::new("perth", Some("wa"), "5gper"),
            RegionEntry::new("perth", Some("tas."), "6rtas"),
        ])
    }

    #[test]
    fn test_parse_place() {
        assert_eq!(
            PlaceQuery::parse("Sydney, New South Wales"),
            Some(PlaceQuery {
                city: "sydney".into(),
                state: Some("nsw".into())
            })
        );
        assert_eq!(
            PlaceQuery::parse("Hobart - Glenorchy (TAS), Tasmania (Tas.)"),
            Some(PlaceQuery {
                city: "hobart".into(),
                state: Some("tas.".into())
            })
        );
        assert_eq!(
            PlaceQuery::parse("Brisbane"),
            Some(PlaceQuery {
                city: "brisbane".into(),
                state: None
            })
        );
    }

    #[test]
    fn test_false_positives_are_excluded() {
        assert_eq!(PlaceQuery::parse("Victoria, Australia"), None);
        assert_eq!(PlaceQuery::parse("Australia"), None);
        assert_eq!(PlaceQuery::parse("Toronto, Ontario"), None);
        assert_eq!(PlaceQuery::parse("Aurora, Denver"), None);
    }

    #[test]
    fn test_direct_match_wins_over_capital_matches() {
        let matcher = LocationMatcher::new(&catalog()).unwrap();
        assert_eq!(
            matcher.resolve("Sydney, New South Wales"),
            Resolution::Matched {
                region_code: "1gsyd".into(),
                stage: MatchStage::Direct
            }
        );
        // perth/tas. exists directly and must not fall through to capital perth
        assert_eq!(
            matcher.resolve("Perth, Tasmania").region_code(),
            Some("6rtas")
        );
    }

    #[test]
    fn test_capital_state_then_city() {
        let matcher = LocationMatcher::new(&catalog()).unwrap();
        assert_eq!(
            matcher.resolve("Bondi Beach, Sydney"),
            Resolution::Matched {
                region_code: "1gsyd".into(),
                stage: MatchStage::CapitalByState
            }
        );
        assert_eq!(
            matcher.resolve("Melbourne, Somewhere"),
            Resolution::Matched {
                region_code: "2gmel".into(),
                stage: MatchStage::CapitalByCity
            }
        );
        assert_eq!(
            matcher.resolve("Melbourne").region_code(),
            Some("2gmel")
        );
    }

    #[test]
    fn test_unresolved_and_excluded() {
        let matcher = LocationMatcher::new(&catalog()).unwrap();
        assert_eq!(matcher.resolve("Unknown Place, Nowhere"), Resolution::Unresolved);
        assert_eq!(matcher.resolve("Geelong"), Resolution::Unresolved);
        assert_eq!(matcher.resolve("Queensland, Australia"), Resolution::Excluded);
    }

    #[test]
    fn test_ambiguous_catalog_is_rejected() {
        let catalog = RegionCatalog::from_entries(vec![
            RegionEntry::new("springfield", Some("qld"), "3gbri"),
            RegionEntry::new("springfield", Some("qld"), "3rips"),
        ]);
        let err = LocationMatcher::new(&catalog).unwrap_err();
        match err {
            Error::MatchCardinality { stage, count, .. } => {
                assert_eq!(stage, MatchStage::Direct);
                assert_eq!(count, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_capital_named_under_two_states_is_rejected() {
        // Distinct direct keys, but one capital name.
        let catalog = RegionCatalog::from_entries(vec![
            RegionEntry::new("sydney", Some("nsw"), "1gsyd"),
            RegionEntry::new("sydney", Some("vic."), "1gsyd"),
        ]);
        match LocationMatcher::new(&catalog).unwrap_err() {
            Error::MatchCardinality { stage, key, count } => {
                assert_eq!(stage, MatchStage::CapitalByState);
                assert_eq!(key, "\"sydney\"");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
