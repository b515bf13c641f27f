//! Q2: the authors who made the most tweets.
//!
//! Counted over the partitioned bucket, before the join, so tweets from
//! places outside the catalog still count.

use super::Tally;
use crate::{AuthorId, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRow {
    pub author_id: AuthorId,
    pub count: u64,
}

/// The worker's `top_k` most active authors.
pub fn local(bucket: &[Record], top_k: usize) -> Vec<(AuthorId, u64)> {
    let mut tally = Tally::new();
    for record in bucket {
        tally.add(record.author_id, 1);
    }
    let mut ranked = tally.ranked();
    ranked.truncate(top_k);
    ranked
}

/// Sums local top lists by author.
///
/// Exact as long as each author lives in a single bucket, which the
/// partitioning guarantees.
#[derive(Debug, Clone)]
pub struct Merge {
    tally: Tally<AuthorId>,
}

impl Merge {
    pub fn new(own: Vec<(AuthorId, u64)>) -> Self {
        Self {
            tally: own.into_iter().collect(),
        }
    }

    pub fn add(&mut self, partial: Vec<(AuthorId, u64)>) {
        self.tally.extend(partial);
    }

    pub fn finish(self, top_k: usize) -> Vec<AuthorRow> {
        self.tally
            .ranked()
            .into_iter()
            .take(top_k)
            .map(|(author_id, count)| AuthorRow { author_id, count })
            .collect()
    }
}
