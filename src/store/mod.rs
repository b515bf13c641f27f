//! The per-worker record store.
//!
//! Every worker owns one partition path per stage and only ever reads or
//! writes its own, so nothing here needs locking:
//!
//! ```text
//! <root>/raw/
//! <root>/curated/csv_buckets/bucket_authorID_<rank>.csv        staging (append during scan)
//! <root>/curated/parquet_buckets/bucket_authorID_<rank>.parquet partitioned bucket
//! <root>/curated/joint_buckets/bucket_joint_<rank>.parquet      joined bucket
//! ```
//!
//! With [`BucketFormat::Csv`] the staging file doubles as the partitioned
//! bucket and the joined bucket is written as CSV.

use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result, StoreError};
use crate::{Rank, Record, ResolvedRecord};

pub mod columnar;
pub mod rows;

pub use rows::BucketRow;

/// On-disk format of the partitioned and joined buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketFormat {
    #[default]
    Parquet,
    Csv,
}

impl BucketFormat {
    fn extension(self) -> &'static str {
        match self {
            BucketFormat::Parquet => "parquet",
            BucketFormat::Csv => "csv",
        }
    }
}

impl FromStr for BucketFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parquet" => Ok(BucketFormat::Parquet),
            "csv" => Ok(BucketFormat::Csv),
            other => Err(format!("unknown bucket format `{other}` (expected parquet or csv)")),
        }
    }
}

/// Paths and formats of one run's intermediate data.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
    format: BucketFormat,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>, format: BucketFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> BucketFormat {
        self.format
    }

    fn curated(&self) -> PathBuf {
        self.root.join("curated")
    }

    pub fn staging_path(&self, rank: Rank) -> PathBuf {
        self.curated()
            .join("csv_buckets")
            .join(format!("bucket_authorID_{rank}.csv"))
    }

    pub fn bucket_path(&self, rank: Rank) -> PathBuf {
        match self.format {
            BucketFormat::Csv => self.staging_path(rank),
            BucketFormat::Parquet => self
                .curated()
                .join("parquet_buckets")
                .join(format!("bucket_authorID_{rank}.parquet")),
        }
    }

    pub fn joint_path(&self, rank: Rank) -> PathBuf {
        self.curated()
            .join("joint_buckets")
            .join(format!("bucket_joint_{rank}.{}", self.format.extension()))
    }

    /// Creates the directory tree and every worker's staging bucket.
    ///
    /// Only the initializer calls this; the others wait at the barrier.
    pub fn scaffold(&self, workers: usize) -> Result<()> {
        let curated = self.curated();
        let dirs = [
            self.root.join("raw"),
            curated.join("csv_buckets"),
            curated.join("parquet_buckets"),
            curated.join("joint_buckets"),
        ];
        for dir in &dirs {
            fs::create_dir_all(dir).map_err(|source| Error::Setup {
                path: dir.clone(),
                source,
            })?;
        }
        for rank in 0..workers {
            let path = self.staging_path(rank);
            rows::create_with_header::<Record>(&path).map_err(|e| match e {
                StoreError::Io { path, source } => Error::Setup { path, source },
                other => Error::Store(other),
            })?;
        }
        tracing::debug!(root = %self.root.display(), workers, "record store scaffold created");
        Ok(())
    }

    /// Opens this worker's staging bucket for appending.
    pub fn staging_writer(&self, rank: Rank) -> Result<StagingWriter> {
        let path = self.staging_path(rank);
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        Ok(StagingWriter {
            path,
            writer,
            written: 0,
        })
    }

    /// Converts the staging bucket into the configured bucket format.
    pub fn seal_bucket(&self, rank: Rank) -> Result<()> {
        match self.format {
            BucketFormat::Csv => Ok(()),
            BucketFormat::Parquet => {
                let from = self.staging_path(rank);
                let to = self.bucket_path(rank);
                let rows = rows::read_all::<Record>(&from)?;
                columnar::write_rows(&to, &rows)?;
                Ok(())
            }
        }
    }

    /// Reads this worker's partitioned bucket.
    pub fn read_bucket(&self, rank: Rank) -> Result<Vec<Record>> {
        self.read(&self.bucket_path(rank))
    }

    pub fn write_joint(&self, rank: Rank, resolved: &[ResolvedRecord]) -> Result<()> {
        let path = self.joint_path(rank);
        match self.format {
            BucketFormat::Csv => rows::write_all(&path, resolved)?,
            BucketFormat::Parquet => columnar::write_rows(&path, resolved)?,
        }
        Ok(())
    }

    pub fn read_joint(&self, rank: Rank) -> Result<Vec<ResolvedRecord>> {
        self.read(&self.joint_path(rank))
    }

    fn read<T: BucketRow>(&self, path: &Path) -> Result<Vec<T>> {
        let rows = match self.format {
            BucketFormat::Csv => rows::read_all(path)?,
            BucketFormat::Parquet => columnar::read_rows(path)?,
        };
        Ok(rows)
    }
}

/// Appends records to a staging bucket during the partition scan.
pub struct StagingWriter {
    path: PathBuf,
    writer: csv::Writer<BufWriter<File>>,
    written: u64,
}

impl StagingWriter {
    pub fn append(&mut self, record: &Record) -> Result<()> {
        self.writer
            .serialize(record)
            .map_err(|source| StoreError::Csv {
                path: self.path.clone(),
                source,
            })?;
        self.written += 1;
        Ok(())
    }

    /// Flushes the bucket and returns how many records were appended.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush().map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn round_trip(format: BucketFormat) {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path().join("data"), format);
        store.scaffold(2).unwrap();

        let mut writer = store.staging_writer(1).unwrap();
        writer.append(&Record::new(3, "Sydney, New South Wales")).unwrap();
        writer.append(&Record::new(5, "Hobart, Tasmania")).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);
        store.seal_bucket(0).unwrap();
        store.seal_bucket(1).unwrap();

        assert!(store.read_bucket(0).unwrap().is_empty());
        assert_eq!(
            store.read_bucket(1).unwrap(),
            vec![
                Record::new(3, "Sydney, New South Wales"),
                Record::new(5, "Hobart, Tasmania"),
            ]
        );

        let joined = vec![ResolvedRecord::new(3, "1gsyd"), ResolvedRecord::new(5, "6ghob")];
        store.write_joint(1, &joined).unwrap();
        assert_eq!(store.read_joint(1).unwrap(), joined);
    }

    #[test]
    fn test_parquet_buckets() {
        round_trip(BucketFormat::Parquet);
    }

    #[test]
    fn test_csv_buckets() {
        round_trip(BucketFormat::Csv);
    }

    #[test]
    fn test_scaffold_fails_under_a_file() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("data");
        fs::write(&blocker, b"not a directory").unwrap();
        let store = RecordStore::new(&blocker, BucketFormat::Parquet);
        assert!(matches!(store.scaffold(1), Err(Error::Setup { .. })));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("CSV".parse::<BucketFormat>(), Ok(BucketFormat::Csv));
        assert!("orc".parse::<BucketFormat>().is_err());
    }
}
