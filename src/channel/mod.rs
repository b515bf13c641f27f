//! Point-to-point messaging between workers.
//!
//! The pipeline only needs three things from its transport: a barrier, a
//! non-blocking tagged send whose completion can be awaited, and a tagged
//! receive from one named peer. [`ReduceChannel`] captures exactly that;
//! [`LocalMesh`] implements it for workers running as tasks of one process.
//!
//! Messages between a pair of workers are delivered in send order. A receive
//! for tag `t` skips over (and keeps) earlier messages with other tags.

use std::future::Future;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::error::CommError;
use crate::{Rank, COORDINATOR};

pub mod local;

pub use local::{LocalMesh, MeshEndpoint};

/// Distinguishes messages between the same pair of workers.
pub type Tag = u32;

/// Reserved for [`ReduceChannel::agree`].
pub const AGREE_TAG: Tag = Tag::MAX;

/// One message in flight.
#[derive(Debug)]
pub struct Envelope {
    pub tag: Tag,
    pub payload: Bytes,
    ack: oneshot::Sender<()>,
}

impl Envelope {
    /// Wraps a payload, returning it with the handle that completes on delivery.
    pub fn new(dest: Rank, tag: Tag, payload: Bytes) -> (Self, SendRequest) {
        let (ack, delivered) = oneshot::channel();
        let envelope = Self { tag, payload, ack };
        (envelope, SendRequest { dest, delivered })
    }

    fn open(self) -> Bytes {
        // The sender may have dropped its request without waiting.
        let _ = self.ack.send(());
        self.payload
    }
}

/// Completes once the receiver has taken the message.
#[derive(Debug)]
pub struct SendRequest {
    dest: Rank,
    delivered: oneshot::Receiver<()>,
}

impl SendRequest {
    pub fn dest(&self) -> Rank {
        self.dest
    }

    pub async fn wait(self) -> Result<(), CommError> {
        self.delivered
            .await
            .map_err(|_| CommError::Unacknowledged { peer: self.dest })
    }
}

/// Messages from one peer that have arrived but not yet been asked for.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
    stash: Vec<Envelope>,
}

impl Inbox {
    pub fn new(rx: mpsc::UnboundedReceiver<Envelope>) -> Self {
        Self {
            rx,
            stash: Vec::new(),
        }
    }
}

/// A pending receive of one tagged message from one peer.
#[derive(Debug)]
pub struct RecvRequest<'a> {
    source: Rank,
    tag: Tag,
    inbox: &'a Mutex<Inbox>,
}

impl<'a> RecvRequest<'a> {
    pub fn new(source: Rank, tag: Tag, inbox: &'a Mutex<Inbox>) -> Self {
        Self { source, tag, inbox }
    }

    pub fn source(&self) -> Rank {
        self.source
    }

    /// Blocks until the message arrives. There is no timeout.
    pub async fn wait(self) -> Result<Bytes, CommError> {
        let mut inbox = self.inbox.lock().await;
        if let Some(at) = inbox.stash.iter().position(|e| e.tag == self.tag) {
            return Ok(inbox.stash.remove(at).open());
        }
        loop {
            match inbox.rx.recv().await {
                Some(envelope) if envelope.tag == self.tag => return Ok(envelope.open()),
                Some(envelope) => inbox.stash.push(envelope),
                None => return Err(CommError::PeerGone { peer: self.source }),
            }
        }
    }
}

/// The messaging primitives one worker sees.
pub trait ReduceChannel: Send + Sync {
    /// This worker's index.
    fn rank(&self) -> Rank;

    /// Number of workers in the run.
    fn size(&self) -> usize;

    /// Returns once every worker has called `barrier`.
    ///
    /// The pipeline synchronizes through [`ReduceChannel::agree`] instead:
    /// a barrier waits forever on a peer that has already exited.
    fn barrier(&self) -> impl Future<Output = Result<(), CommError>> + Send;

    /// Starts sending `payload` to `dest`.
    fn isend(&self, dest: Rank, tag: Tag, payload: Bytes) -> Result<SendRequest, CommError>;

    /// Prepares to receive the next `tag` message from `source`.
    fn irecv(&self, source: Rank, tag: Tag) -> Result<RecvRequest<'_>, CommError>;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }

    /// A barrier that also agrees on a flag: returns `true` only if every
    /// worker passed `ok = true`.
    ///
    /// Flags are gathered at the coordinator and the verdict sent back, so a
    /// worker that failed its local step still has to call this.
    fn agree(&self, ok: bool) -> impl Future<Output = Result<bool, CommError>> + Send {
        async move {
            let flag = |ok: bool| Bytes::from_static(if ok { &[1] } else { &[0] });
            if self.is_coordinator() {
                let mut all = ok;
                for source in 1..self.size() {
                    let vote = self.irecv(source, AGREE_TAG)?.wait().await?;
                    all &= vote.first() == Some(&1);
                }
                for dest in 1..self.size() {
                    self.isend(dest, AGREE_TAG, flag(all))?.wait().await?;
                }
                Ok(all)
            } else {
                self.isend(COORDINATOR, AGREE_TAG, flag(ok))?.wait().await?;
                let verdict = self.irecv(COORDINATOR, AGREE_TAG)?.wait().await?;
                Ok(verdict.first() == Some(&1))
            }
        }
    }
}
