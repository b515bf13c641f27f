//! Splits the global tweet stream into per-worker buckets.
//!
//! There is no distributor: every worker scans the *whole* input and keeps
//! the records that [`partition`](crate::partition) assigns to it. That costs
//! N scans of the source but needs no shuffle between workers.

use crate::error::{Error, Result};
use crate::ingest;
use crate::store::RecordStore;
use crate::{Rank, Record};

/// Counters for one worker's partition pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PartitionStats {
    /// Records seen in the global stream.
    pub scanned: u64,
    /// Records written to this worker's bucket.
    pub kept: u64,
    /// Stream items skipped for having no place.
    pub placeless: u64,
}

/// One worker's partition pass.
#[derive(Debug)]
pub struct Partitioner<'a> {
    store: &'a RecordStore,
    rank: Rank,
    bucket_count: usize,
}

impl<'a> Partitioner<'a> {
    pub fn new(store: &'a RecordStore, rank: Rank, bucket_count: usize) -> Self {
        Self {
            store,
            rank,
            bucket_count,
        }
    }

    /// Streams every input file and writes this worker's records to its
    /// staging bucket, then seals the bucket in the store's format.
    ///
    /// The store scaffold must already exist.
    pub fn run(&self, input: &str) -> Result<PartitionStats> {
        let mut writer = self.store.staging_writer(self.rank)?;
        let mut kept = 0u64;
        let ingest = ingest::scan(input, |record| {
            if record.bucket(self.bucket_count) == self.rank {
                writer.append(&record)?;
                kept += 1;
            }
            Ok(())
        })?;
        let written = writer.finish()?;
        debug_assert_eq!(written, kept);
        self.store.seal_bucket(self.rank)?;

        Ok(PartitionStats {
            scanned: ingest.records,
            kept,
            placeless: ingest.placeless,
        })
    }

    /// Reads this worker's bucket back and checks it only holds its own authors.
    pub fn load_bucket(&self) -> Result<Vec<Record>> {
        let records = self.store.read_bucket(self.rank)?;
        check_bucket(self.rank, self.bucket_count, &records)?;
        Ok(records)
    }
}

/// Fails on the first record that belongs to another worker's bucket.
pub fn check_bucket(rank: Rank, bucket_count: usize, records: &[Record]) -> Result<()> {
    match records.iter().find(|r| r.bucket(bucket_count) != rank) {
        Some(stray) => Err(Error::PartitionIntegrity {
            rank,
            author_id: stray.author_id,
            expected: stray.bucket(bucket_count),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BucketFormat;
    use std::fs;
    use tempfile::TempDir;

    const FEED: &str = r#"[
        {"data": {"author_id": "10"}, "includes": {"places": [{"full_name": "Sydney, New South Wales"}]}},
        {"data": {"author_id": "11"}, "includes": {"places": [{"full_name": "Melbourne, Victoria"}]}},
        {"data": {"author_id": "12"}, "includes": {"places": [{"full_name": "Perth, Western Australia"}]}},
        {"data": {"author_id": "13"}},
        {"data": {"author_id": "14"}, "includes": {"places": [{"full_name": "Hobart, Tasmania"}]}}
    ]"#;

    #[test]
    fn test_every_worker_keeps_its_own_records() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path().join("data"), BucketFormat::Parquet);
        store.scaffold(2).unwrap();
        let input = tmp.path().join("data/raw/tweets.json");
        fs::write(&input, FEED).unwrap();
        let input = input.to_str().unwrap();

        let even = Partitioner::new(&store, 0, 2);
        let odd = Partitioner::new(&store, 1, 2);
        let stats = even.run(input).unwrap();
        odd.run(input).unwrap();

        assert_eq!(
            stats,
            PartitionStats {
                scanned: 4,
                kept: 3,
                placeless: 1
            }
        );
        let authors = |p: &Partitioner| -> Vec<u64> {
            p.load_bucket().unwrap().iter().map(|r| r.author_id).collect()
        };
        assert_eq!(authors(&even), vec![10, 12, 14]);
        assert_eq!(authors(&odd), vec![11]);
    }

    #[test]
    fn test_stray_record_is_an_integrity_error() {
        let records = vec![Record::new(4, "a"), Record::new(7, "b")];
        match check_bucket(0, 2, &records) {
            Err(Error::PartitionIntegrity {
                rank: 0,
                author_id: 7,
                expected: 1,
            }) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert!(check_bucket(1, 3, &[Record::new(4, "a")]).is_ok());
    }
}
