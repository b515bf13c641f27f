//! Partial aggregates as they travel from a worker to the coordinator.
//!
//! A partial is framed as `{version, body}` and encoded with `bincode`, so a
//! worker built with a different layout is rejected instead of merged.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{DiversityRow, Statistic};
use crate::error::CommError;
use crate::AuthorId;

/// Bumped whenever [`PartialAggregate`] changes shape.
pub const MESSAGE_VERSION: u16 = 1;

/// One worker's not-yet-merged result for one statistic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartialAggregate {
    /// Full region histogram, ranked.
    RegionCounts(Vec<(String, u64)>),
    /// Local top-K authors by tweet count.
    TopAuthors(Vec<(AuthorId, u64)>),
    /// Local top-K authors by region diversity.
    AuthorDiversity(Vec<DiversityRow>),
}

impl PartialAggregate {
    pub fn statistic(&self) -> Statistic {
        match self {
            PartialAggregate::RegionCounts(_) => Statistic::RegionCounts,
            PartialAggregate::TopAuthors(_) => Statistic::TopAuthors,
            PartialAggregate::AuthorDiversity(_) => Statistic::AuthorDiversity,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PartialAggregate::RegionCounts(rows) => rows.len(),
            PartialAggregate::TopAuthors(rows) => rows.len(),
            PartialAggregate::AuthorDiversity(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn encode(&self) -> Result<Bytes, CommError> {
        let frame = FrameRef {
            version: MESSAGE_VERSION,
            body: self,
        };
        Ok(Bytes::from(bincode::serialize(&frame)?))
    }

    /// Decodes a frame, checking its version and that it holds `expected`.
    pub fn decode(bytes: &[u8], expected: Statistic) -> Result<Self, CommError> {
        let header: FrameHeader = bincode::deserialize(bytes)?;
        if header.version != MESSAGE_VERSION {
            return Err(CommError::VersionMismatch {
                expected: MESSAGE_VERSION,
                actual: header.version,
            });
        }
        let frame: Frame = bincode::deserialize(bytes)?;
        let actual = frame.body.statistic();
        if actual != expected {
            return Err(CommError::KindMismatch {
                expected: expected.name(),
                actual: actual.name(),
            });
        }
        Ok(frame.body)
    }
}

#[derive(Serialize)]
struct FrameRef<'a> {
    version: u16,
    body: &'a PartialAggregate,
}

#[derive(Deserialize)]
struct Frame {
    #[allow(dead_code)]
    version: u16,
    body: PartialAggregate,
}

/// Just the version, read before trusting the rest of a frame.
#[derive(Deserialize)]
struct FrameHeader {
    version: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_crosses_the_wire() {
        let partial = PartialAggregate::TopAuthors(vec![(42, 5), (7, 1)]);
        let bytes = partial.encode().unwrap();
        assert_eq!(
            PartialAggregate::decode(&bytes, Statistic::TopAuthors).unwrap(),
            partial
        );
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let bytes = PartialAggregate::RegionCounts(vec![]).encode().unwrap();
        assert!(matches!(
            PartialAggregate::decode(&bytes, Statistic::AuthorDiversity),
            Err(CommError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        let mut bytes = PartialAggregate::TopAuthors(vec![]).encode().unwrap().to_vec();
        bytes[0] = bytes[0].wrapping_add(1);
        assert!(matches!(
            PartialAggregate::decode(&bytes, Statistic::TopAuthors),
            Err(CommError::VersionMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_garbage_is_a_codec_error() {
        assert!(matches!(
            PartialAggregate::decode(&[0x01], Statistic::TopAuthors),
            Err(CommError::Codec(_))
        ));
    }
}
