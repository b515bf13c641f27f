//! Errors raised by the pipeline.
//!
//! Every error here is fatal to the whole run: there is no partial-success
//! mode. Unresolved places are not errors, they are counted and dropped.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::{AuthorId, Rank};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which step of the matching cascade an error or a match refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStage {
    /// (city, state) against the full catalog.
    Direct,
    /// state field against the capital subset's city.
    CapitalByState,
    /// city field against the capital subset's city.
    CapitalByCity,
}

impl std::fmt::Display for MatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MatchStage::Direct => "direct",
            MatchStage::CapitalByState => "capital state->city",
            MatchStage::CapitalByCity => "capital city->city",
        };
        f.write_str(name)
    }
}

/// Failures of the worker-to-worker message channel.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("worker {peer} is gone (channel closed)")]
    PeerGone { peer: Rank },
    #[error("worker {peer} is out of range for a mesh of {size}")]
    NoSuchPeer { peer: Rank, size: usize },
    #[error("message to worker {peer} was never taken")]
    Unacknowledged { peer: Rank },
    #[error("expected message format v{expected}, got v{actual}")]
    VersionMismatch { expected: u16, actual: u16 },
    #[error("expected a {expected} partial aggregate, got {actual}")]
    KindMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("failed to encode or decode a message: {0}")]
    Codec(#[from] bincode::Error),
}

/// Failures of the on-disk record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("{path}: unexpected bucket layout: {details}")]
    Layout { path: PathBuf, details: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to set up {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("worker {rank}: the initializer failed to set up the record store")]
    SetupAborted { rank: Rank },
    #[error(
        "worker {rank}: author {author_id} belongs to bucket {expected} but was found in bucket {rank}"
    )]
    PartitionIntegrity {
        rank: Rank,
        author_id: AuthorId,
        expected: Rank,
    },
    #[error("{stage} match: key {key} matches {count} catalog entries")]
    MatchCardinality {
        stage: MatchStage,
        key: String,
        count: usize,
    },
    #[error("worker {rank}: illegal phase transition {from} -> {to}")]
    IllegalTransition {
        rank: Rank,
        from: &'static str,
        to: &'static str,
    },
    #[error(transparent)]
    Communication(#[from] CommError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("region source {path}: {details}")]
    Catalog { path: PathBuf, details: String },
    #[error("tweet stream {path}: {details}")]
    Input { path: PathBuf, details: String },
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Whether this error was caused by another worker's failure rather
    /// than by something this worker did.
    pub fn is_secondary(&self) -> bool {
        matches!(
            self,
            Error::SetupAborted { .. }
                | Error::Communication(
                    CommError::PeerGone { .. } | CommError::Unacknowledged { .. }
                )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_peer_failures_are_secondary() {
        assert!(Error::SetupAborted { rank: 2 }.is_secondary());
        assert!(Error::Communication(CommError::PeerGone { peer: 0 }).is_secondary());
        assert!(Error::Communication(CommError::Unacknowledged { peer: 0 }).is_secondary());

        assert!(!Error::Communication(CommError::NoSuchPeer { peer: 4, size: 2 }).is_secondary());
        assert!(!Error::Input {
            path: PathBuf::from("feed.json"),
            details: "no input files matched".into(),
        }
        .is_secondary());
    }
}
