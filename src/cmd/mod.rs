//! Command-line arguments and the run configuration they produce.

use std::path::PathBuf;

use crate::catalog::CatalogPatch;
use crate::statistic::DEFAULT_TOP_K;
use crate::store::{BucketFormat, RecordStore};

pub mod pipeline;

/// Everything one run needs. Built from [`pipeline::Args`] by the binary,
/// or directly by tests.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of workers, at least 1.
    pub workers: usize,
    pub data_root: PathBuf,
    /// Glob of tweet files.
    pub input: String,
    pub regions: PathBuf,
    pub report_dir: PathBuf,
    pub format: BucketFormat,
    pub top_k: usize,
    /// Corrections applied to the region source while loading it.
    pub patches: Vec<CatalogPatch>,
}

impl PipelineConfig {
    /// A configuration with the usual defaults, rooted at `data_root`.
    pub fn new(data_root: impl Into<PathBuf>, workers: usize) -> Self {
        let data_root = data_root.into();
        Self {
            workers,
            input: data_root
                .join("raw")
                .join("bigTwitter.json")
                .to_string_lossy()
                .into_owned(),
            regions: data_root.join("raw").join("sal.json"),
            report_dir: PathBuf::from("."),
            format: BucketFormat::default(),
            top_k: DEFAULT_TOP_K,
            patches: CatalogPatch::defaults(),
            data_root,
        }
    }

    pub fn store(&self) -> RecordStore {
        RecordStore::new(&self.data_root, self.format)
    }
}
