//! An in-process mesh: one tokio channel per ordered pair of workers.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Barrier, Mutex};

use super::{Envelope, Inbox, RecvRequest, ReduceChannel, SendRequest, Tag};
use crate::error::CommError;
use crate::Rank;

/// Builds the endpoints of a fully connected mesh.
pub struct LocalMesh;

impl LocalMesh {
    /// Creates `size` connected endpoints; endpoint `i` has rank `i`.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Vec<MeshEndpoint> {
        assert!(size > 0, "a mesh needs at least one worker");
        let barrier = Arc::new(Barrier::new(size));

        let mut outboxes: Vec<Vec<mpsc::UnboundedSender<Envelope>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut inboxes: Vec<Vec<Mutex<Inbox>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();

        // inboxes[dest][source] must line up with outboxes[source][dest]
        for dest in 0..size {
            for source in 0..size {
                let (tx, rx) = mpsc::unbounded_channel();
                outboxes[source].push(tx);
                inboxes[dest].push(Mutex::new(Inbox::new(rx)));
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| MeshEndpoint {
                rank,
                outboxes,
                inboxes,
                barrier: barrier.clone(),
            })
            .collect()
    }
}

/// One worker's view of a [`LocalMesh`].
pub struct MeshEndpoint {
    rank: Rank,
    /// Indexed by destination.
    outboxes: Vec<mpsc::UnboundedSender<Envelope>>,
    /// Indexed by source.
    inboxes: Vec<Mutex<Inbox>>,
    barrier: Arc<Barrier>,
}

impl MeshEndpoint {
    fn check_peer(&self, peer: Rank) -> Result<(), CommError> {
        if peer < self.outboxes.len() {
            Ok(())
        } else {
            Err(CommError::NoSuchPeer {
                peer,
                size: self.outboxes.len(),
            })
        }
    }
}

impl std::fmt::Debug for MeshEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshEndpoint")
            .field("rank", &self.rank)
            .field("size", &self.outboxes.len())
            .finish()
    }
}

impl ReduceChannel for MeshEndpoint {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.outboxes.len()
    }

    fn barrier(&self) -> impl Future<Output = Result<(), CommError>> + Send {
        async move {
            self.barrier.wait().await;
            Ok(())
        }
    }

    fn isend(&self, dest: Rank, tag: Tag, payload: Bytes) -> Result<SendRequest, CommError> {
        self.check_peer(dest)?;
        let (envelope, request) = Envelope::new(dest, tag, payload);
        self.outboxes[dest]
            .send(envelope)
            .map_err(|_| CommError::PeerGone { peer: dest })?;
        Ok(request)
    }

    fn irecv(&self, source: Rank, tag: Tag) -> Result<RecvRequest<'_>, CommError> {
        self.check_peer(source)?;
        Ok(RecvRequest::new(source, tag, &self.inboxes[source]))
    }
}
