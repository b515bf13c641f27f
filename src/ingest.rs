//! Reads tweets from the raw feed without loading it into memory.
//!
//! The feed is either one large JSON array or line-delimited JSON. Each item
//! looks like
//!
//! ```json
//! {"data": {"author_id": "1234"}, "includes": {"places": [{"full_name": "Sydney, New South Wales"}]}}
//! ```
//!
//! and only the author and the first place name are kept.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use glob::glob;
use serde::de::{self, DeserializeSeed, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::{AuthorId, Record};

#[derive(Debug, Deserialize)]
struct RawTweet {
    data: RawData,
    #[serde(default)]
    includes: Option<RawIncludes>,
}

#[derive(Debug, Deserialize)]
struct RawData {
    #[serde(deserialize_with = "author_id")]
    author_id: AuthorId,
}

#[derive(Debug, Deserialize)]
struct RawIncludes {
    #[serde(default)]
    places: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    full_name: String,
}

impl RawTweet {
    fn into_record(self) -> Option<Record> {
        let place = self.includes?.places.into_iter().next()?;
        Some(Record::new(self.data.author_id, place.full_name))
    }
}

/// Twitter sends ids as strings; accept plain numbers too.
fn author_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<AuthorId, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }
    match Id::deserialize(deserializer)? {
        Id::Number(n) => Ok(n),
        Id::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

/// Counters for one pass over the feed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Items turned into records.
    pub records: u64,
    /// Items without any place.
    pub placeless: u64,
}

/// Visits every array item in order, handing each record to a callback.
struct ItemSeed<'a, F> {
    sink: &'a mut F,
    stats: &'a mut IngestStats,
}

impl<'de, 'a, F> DeserializeSeed<'de> for ItemSeed<'a, F>
where
    F: FnMut(Record) -> Result<()>,
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 'a, F> Visitor<'de> for ItemSeed<'a, F>
where
    F: FnMut(Record) -> Result<()>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of tweets")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while let Some(tweet) = seq.next_element::<RawTweet>()? {
            match tweet.into_record() {
                Some(record) => {
                    self.stats.records += 1;
                    (self.sink)(record).map_err(<A::Error as de::Error>::custom)?;
                }
                None => self.stats.placeless += 1,
            }
        }
        Ok(())
    }
}

/// Streams the records of one feed file into `sink`.
///
/// Errors returned by `sink` come back as custom [`serde_json::Error`]s.
pub fn for_each_record<R, F>(
    reader: R,
    mut sink: F,
) -> Result<IngestStats, serde_json::Error>
where
    R: Read,
    F: FnMut(Record) -> Result<()>,
{
    let mut reader = BufReader::new(reader);
    let mut stats = IngestStats::default();

    let is_array = loop {
        let buf = reader.fill_buf().map_err(serde_json::Error::io)?;
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(at) => {
                let first = buf[at];
                reader.consume(at);
                break first == b'[';
            }
            None if buf.is_empty() => return Ok(stats),
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    };

    if is_array {
        let mut de = serde_json::Deserializer::from_reader(reader);
        ItemSeed {
            sink: &mut sink,
            stats: &mut stats,
        }
        .deserialize(&mut de)?;
        de.end()?;
    } else {
        for tweet in serde_json::Deserializer::from_reader(reader).into_iter::<RawTweet>() {
            let tweet = tweet?;
            match tweet.into_record() {
                Some(record) => {
                    stats.records += 1;
                    sink(record).map_err(<serde_json::Error as de::Error>::custom)?;
                }
                None => stats.placeless += 1,
            }
        }
    }
    Ok(stats)
}

/// Expands the input glob into files, in sorted path order.
pub fn input_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).map_err(|e| Error::Input {
        path: PathBuf::from(pattern),
        details: e.to_string(),
    })?;
    let mut files: Vec<PathBuf> = paths.flatten().filter(|p| p.is_file()).collect();
    files.sort();
    if files.is_empty() {
        return Err(Error::Input {
            path: PathBuf::from(pattern),
            details: "no input files matched".to_string(),
        });
    }
    Ok(files)
}

/// Streams every record of every file matched by `pattern` into `sink`.
///
/// Errors returned by `sink` abort the scan and are returned unchanged.
pub fn scan<F>(pattern: &str, mut sink: F) -> Result<IngestStats>
where
    F: FnMut(Record) -> Result<()>,
{
    let mut total = IngestStats::default();
    for path in input_files(pattern)? {
        let stats = scan_file(&path, &mut sink)?;
        total.records += stats.records;
        total.placeless += stats.placeless;
    }
    Ok(total)
}

fn scan_file<F>(path: &Path, sink: &mut F) -> Result<IngestStats>
where
    F: FnMut(Record) -> Result<()>,
{
    let input_error = |details: String| Error::Input {
        path: path.to_path_buf(),
        details,
    };
    let file = File::open(path).map_err(|e| input_error(e.to_string()))?;

    // Sink errors cross the serde boundary as strings; keep the original.
    let mut failure = None;
    let result = for_each_record(file, |record| match sink(record) {
        Ok(()) => Ok(()),
        Err(e) => {
            let message = e.to_string();
            failure = Some(e);
            Err(Error::Input {
                path: PathBuf::new(),
                details: message,
            })
        }
    });
    match (result, failure) {
        (_, Some(e)) => Err(e),
        (Ok(stats), None) => Ok(stats),
        (Err(e), None) => Err(input_error(e.to_string())),
    }
}
