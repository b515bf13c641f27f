//! The canonical locality -> Greater Capital City table.
//!
//! The region source is a JSON object keyed by locality name:
//!
//! ```json
//! { "mount archer (rockhampton - qld)": { "ste": "3", "gcc": "3rcwe", "sal": "31937" } }
//! ```
//!
//! Loading normalizes every row into a [`RegionEntry`], applies the
//! [`CatalogPatch`] override table, and drops duplicate rows.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};

/// The nine Greater Capital City codes, in report order.
pub const CAPITAL_CODES: [&str; 9] = [
    "1gsyd", "2gmel", "3gbri", "4gade", "5gper", "6ghob", "7gdar", "8acte", "9oter",
];

/// Capital city names, plus the localities of the offshore territories.
pub const CAPITAL_CITIES: [&str; 13] = [
    "canberra",
    "sydney",
    "darwin",
    "brisbane",
    "adelaide",
    "hobart",
    "melbourne",
    "perth",
    "christmas island",
    "home island",
    "jervis bay",
    "norfolk island",
    "west island",
];

/// Maps a numeric state code to the abbreviation used by tweet place names.
pub fn state_abbreviation(code: &str) -> Option<&'static str> {
    let abbrev = match code.trim() {
        "1" => "nsw",
        "2" => "vic.",
        "3" => "qld",
        "4" => "sa",
        "5" => "wa",
        "6" => "tas.",
        "7" => "nt",
        "8" => "act",
        "9" => "oter",
        _ => return None,
    };
    Some(abbrev)
}

/// Whether `code` is one of [`CAPITAL_CODES`].
#[inline]
pub fn is_capital_code(code: &str) -> bool {
    CAPITAL_CODES.contains(&code)
}

/// A documented correction to the region source, applied by external id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPatch {
    /// The `sal` id of the row to correct.
    pub sal: String,
    /// The city name the row must end up with.
    pub city: String,
}

impl CatalogPatch {
    pub fn new(sal: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            sal: sal.into(),
            city: city.into(),
        }
    }

    /// The two known data-quality fixes for the ABS suburb file.
    pub fn defaults() -> Vec<CatalogPatch> {
        vec![
            CatalogPatch::new("31937", "mount archer"),
            CatalogPatch::new("32621", "spring creek"),
        ]
    }
}

/// One canonical place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionEntry {
    /// Lowercased city name.
    pub canonical_city: String,
    /// State abbreviation (`nsw`, `vic.`, ...). Absent for unknown codes.
    pub state_code: Option<String>,
    pub region_code: String,
    /// Row of a capital city inside its own capital region.
    pub is_capital: bool,
}

impl RegionEntry {
    pub fn new(city: &str, state_code: Option<&str>, region_code: &str) -> Self {
        let canonical_city = normalize_city(city);
        let region_code = region_code.trim().to_lowercase();
        let is_capital = is_capital_code(&region_code)
            && CAPITAL_CITIES.contains(&canonical_city.as_str());
        Self {
            canonical_city,
            state_code: state_code.map(|s| s.trim().to_lowercase()),
            region_code,
            is_capital,
        }
    }

    /// Re-applies normalization. Normalized entries are fixed points.
    pub fn normalized(&self) -> Self {
        Self::new(
            &self.canonical_city,
            self.state_code.as_deref(),
            &self.region_code,
        )
    }

    fn dedup_key(&self) -> (Option<String>, String, String) {
        (
            self.state_code.clone(),
            self.canonical_city.clone(),
            self.region_code.clone(),
        )
    }
}

/// Extracts the city from an ABS locality name.
///
/// The name is split on `" ("`, `" - "` and `") "`. Exactly three pieces
/// means `"<suburb> (<city> - <state>)"` and the middle piece is kept;
/// otherwise the first piece is. The result is lowercased with any
/// parenthesised remainder removed.
pub fn normalize_city(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let pieces = split_locality(&lowered);
    let city = if pieces.len() == 3 { pieces[1] } else { pieces[0] };
    let city = city.split('(').next().unwrap_or(city);
    city.trim_end_matches(')').trim().to_string()
}

fn split_locality(name: &str) -> Vec<&str> {
    const SEPARATORS: [&str; 3] = [" (", " - ", ") "];
    let mut pieces = Vec::new();
    let mut rest = name;
    loop {
        let next = SEPARATORS
            .iter()
            .filter_map(|sep| rest.find(sep).map(|at| (at, sep.len())))
            .min_by_key(|(at, _)| *at);
        match next {
            Some((at, len)) => {
                pieces.push(&rest[..at]);
                rest = &rest[at + len..];
            }
            None => {
                pieces.push(rest);
                return pieces;
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLocality {
    #[serde(default)]
    ste: Option<serde_json::Value>,
    #[serde(default)]
    gcc: Option<String>,
    #[serde(default)]
    sal: Option<serde_json::Value>,
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The loaded, normalized catalog.
#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    entries: Vec<RegionEntry>,
}

impl RegionCatalog {
    /// Loads the region source at `path`.
    pub fn load(path: impl AsRef<Path>, patches: &[CatalogPatch]) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::Catalog {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        Self::from_reader(BufReader::new(file), patches).map_err(|e| match e {
            Error::Catalog { details, .. } => Error::Catalog {
                path: path.to_path_buf(),
                details,
            },
            other => other,
        })
    }

    /// Loads a region source from any reader.
    pub fn from_reader<R: Read>(reader: R, patches: &[CatalogPatch]) -> Result<Self> {
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_reader(reader)
            .map_err(|e| Error::Catalog {
                path: Default::default(),
                details: e.to_string(),
            })?;

        let mut applied = HashSet::new();
        let mut entries = IndexMap::new();
        let mut skipped = 0usize;

        for (name, value) in raw {
            let locality: RawLocality =
                serde_json::from_value(value).map_err(|e| Error::Catalog {
                    path: Default::default(),
                    details: format!("locality {name:?}: {e}"),
                })?;
            let Some(gcc) = locality.gcc.filter(|g| !g.trim().is_empty()) else {
                skipped += 1;
                continue;
            };
            let sal = locality.sal.as_ref().and_then(value_to_string);
            let state = locality
                .ste
                .as_ref()
                .and_then(value_to_string)
                .and_then(|code| state_abbreviation(&code));

            let mut entry = RegionEntry::new(&name, state, &gcc);
            if let Some(patch) = sal
                .as_deref()
                .and_then(|id| patches.iter().find(|p| p.sal == id))
            {
                tracing::debug!(sal = %patch.sal, from = %entry.canonical_city, to = %patch.city, "patched locality");
                entry = RegionEntry::new(&patch.city, entry.state_code.as_deref(), &gcc);
                applied.insert(patch.sal.clone());
            }

            entries.entry(entry.dedup_key()).or_insert(entry);
        }

        for patch in patches.iter().filter(|p| !applied.contains(&p.sal)) {
            tracing::warn!(sal = %patch.sal, "catalog patch did not match any locality");
        }
        tracing::debug!(entries = entries.len(), skipped, "loaded region catalog");

        Ok(Self {
            entries: entries.into_values().collect(),
        })
    }

    /// Builds a catalog from already constructed entries, dropping duplicates.
    pub fn from_entries(entries: impl IntoIterator<Item = RegionEntry>) -> Self {
        let mut unique = IndexMap::new();
        for entry in entries {
            unique.entry(entry.dedup_key()).or_insert(entry);
        }
        Self {
            entries: unique.into_values().collect(),
        }
    }

    pub fn entries(&self) -> &[RegionEntry] {
        &self.entries
    }

    /// Rows that identify a capital city itself, in load order.
    ///
    /// A capital code alone is not enough: suburbs share their capital's code.
    pub fn capitals(&self) -> impl Iterator<Item = &RegionEntry> {
        self.entries.iter().filter(|e| e.is_capital)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SOURCE: &str = r#"{
        "sydney": {"ste": "1", "gcc": "1gsyd", "sal": "13001"},
        "sydney (nsw)": {"ste": "1", "gcc": "1gsyd", "sal": "13002"},
        "melbourne": {"ste": "2", "gcc": "2gmel", "sal": "21001"},
        "mount archer (rockhampton - qld)": {"ste": "3", "gcc": "3rcwe", "sal": "31937"},
        "spring creek (toowoomba - qld)": {"ste": "3", "gcc": "3rdar", "sal": "32621"},
        "perth (tas.)": {"ste": "6", "gcc": "6rtas", "sal": "60001"},
        "perth (wa)": {"ste": "5", "gcc": "5gper", "sal": "50001"},
        "nowhere": {"ste": "0", "gcc": "0none", "sal": "1"},
        "no gcc here": {"ste": "1", "sal": "2"}
    }"#;

    fn load() -> RegionCatalog {
        RegionCatalog::from_reader(SOURCE.as_bytes(), &CatalogPatch::defaults()).unwrap()
    }

    #[test]
    fn test_normalize_city() {
        assert_eq!(normalize_city("Sydney (NSW)"), "sydney");
        assert_eq!(normalize_city("Mount Archer (Rockhampton - Qld)"), "rockhampton");
        assert_eq!(normalize_city("melbourne"), "melbourne");
        assert_eq!(normalize_city("St Kilda (Vic.)"), "st kilda");
    }

    #[test]
    fn test_load_deduplicates_and_maps_states() {
        let catalog = load();
        let sydneys: Vec<_> = catalog
            .entries()
            .iter()
            .filter(|e| e.canonical_city == "sydney")
            .collect();
        assert_eq!(sydneys.len(), 1);
        assert_eq!(sydneys[0].state_code.as_deref(), Some("nsw"));

        let nowhere = catalog
            .entries()
            .iter()
            .find(|e| e.canonical_city == "nowhere")
            .unwrap();
        assert_eq!(nowhere.state_code, None);
        assert!(!catalog.entries().iter().any(|e| e.canonical_city == "no gcc here"));
    }

    #[test]
    fn test_patches_override_city() {
        let catalog = load();
        let archer = catalog
            .entries()
            .iter()
            .find(|e| e.region_code == "3rcwe")
            .unwrap();
        assert_eq!(archer.canonical_city, "mount archer");
        let creek = catalog
            .entries()
            .iter()
            .find(|e| e.region_code == "3rdar")
            .unwrap();
        assert_eq!(creek.canonical_city, "spring creek");
    }

    #[test]
    fn test_capital_subset_needs_code_and_city() {
        let catalog = load();
        let capitals: Vec<_> = catalog
            .capitals()
            .map(|e| (e.canonical_city.as_str(), e.region_code.as_str()))
            .collect();
        assert_eq!(
            capitals,
            vec![("sydney", "1gsyd"), ("melbourne", "2gmel"), ("perth", "5gper")]
        );
    }

    #[test]
    fn test_from_entries_keeps_first_of_each_duplicate() {
        let catalog = RegionCatalog::from_entries([
            RegionEntry::new("Hobart", Some("tas."), "6ghob"),
            RegionEntry::new("Perth", Some("wa"), "5gper"),
            RegionEntry::new("Hobart (Tas.)", Some("tas."), "6ghob"),
            RegionEntry::new("Perth", Some("tas."), "6rtas"),
        ]);
        let rows: Vec<_> = catalog
            .entries()
            .iter()
            .map(|e| (e.canonical_city.as_str(), e.region_code.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![("hobart", "6ghob"), ("perth", "5gper"), ("perth", "6rtas")]
        );
    }

    #[test]
    fn test_malformed_source_is_a_catalog_error() {
        let err = RegionCatalog::from_reader("[1, 2]".as_bytes(), &[]).unwrap_err();
        assert!(matches!(err, Error::Catalog { .. }));
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(
            name in "[A-Za-z ]{1,12}( \\([A-Za-z]{1,8}( - [A-Za-z]{2,4})?\\))?",
            ste in 0u8..12,
            gcc in "[1-9][a-z]{4}",
        ) {
            let code = ste.to_string();
            let entry = RegionEntry::new(&name, state_abbreviation(&code), &gcc);
            prop_assert_eq!(entry.normalized(), entry.clone());
        }
    }
}
