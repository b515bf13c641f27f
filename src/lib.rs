//! A distributed (lite) tweet-by-region pipeline.
//!
//! N workers each scan the whole geotagged tweet stream, keep the records
//! whose author hashes to their own bucket, resolve free-text place names to
//! Greater Capital City codes, and compute three top-K statistics. Every
//! non-coordinator worker sends its partial results to worker 0, which merges
//! them and writes the reports. Intermediate data is kept in a per-worker
//! record store on the local filesystem.

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod channel;
pub mod cmd;
pub mod error;
pub mod ingest;
pub mod join;
pub mod matcher;
pub mod partition;
pub mod report;
pub mod standalone;
pub mod statistic;
pub mod store;
pub mod worker;

pub use error::{Error, Result};

/// Index of a worker (and of the bucket it owns).
pub type Rank = usize;

/// The worker that gathers partial aggregates and writes the reports.
pub const COORDINATOR: Rank = 0;

/// Twitter author ids are 64-bit snowflakes.
pub type AuthorId = u64;

/////////////////////////////////////////////////////////////////////////////
// Records
/////////////////////////////////////////////////////////////////////////////

/// A single geotagged tweet, reduced to what the pipeline needs.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Record {
    /// The tweet's author.
    pub author_id: AuthorId,
    /// The first listed place's `full_name`, e.g. `"Sydney, New South Wales"`.
    #[serde(rename = "full_name")]
    pub raw_place: String,
}

impl Record {
    /// Construct a new record from an author and a raw place name.
    pub fn new(author_id: AuthorId, raw_place: impl Into<String>) -> Self {
        Self {
            author_id,
            raw_place: raw_place.into(),
        }
    }

    /// The bucket this record belongs to when there are `bucket_count` workers.
    #[inline]
    pub fn bucket(&self, bucket_count: usize) -> Rank {
        partition(self.author_id, bucket_count)
    }
}

/// A record whose place resolved to a region code.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub author_id: AuthorId,
    #[serde(rename = "gcc")]
    pub region_code: String,
}

impl ResolvedRecord {
    pub fn new(author_id: AuthorId, region_code: impl Into<String>) -> Self {
        Self {
            author_id,
            region_code: region_code.into(),
        }
    }
}

/// Computes the bucket for an author: `author_id % bucket_count`.
///
/// This must stay pure. Every worker filters the same global stream with it
/// and relies on all other workers computing the same answer.
///
/// # Panics
///
/// Panics if `bucket_count` is zero.
#[inline]
pub fn partition(author_id: AuthorId, bucket_count: usize) -> Rank {
    assert!(bucket_count > 0, "bucket count must be positive");
    (author_id % bucket_count as u64) as Rank
}
