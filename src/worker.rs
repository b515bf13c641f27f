//! One worker's run from setup to report.
//!
//! ```text
//! Init -> Partition -> Join -> LocalAggregate -> Send ----------> Done
//!                                             \-> ReceiveMerge -> Report -> Done
//! ```
//!
//! Every worker except the coordinator ends after sending its partials.
//! Any failure ends the worker with an error; there are no retries.

use std::sync::Arc;
use std::time::Instant;

use tokio::task;
use tracing::{debug, info, warn};

use crate::catalog::RegionCatalog;
use crate::channel::ReduceChannel;
use crate::cmd::PipelineConfig;
use crate::error::{Error, Result};
use crate::join::JoinStage;
use crate::matcher::LocationMatcher;
use crate::partition::Partitioner;
use crate::report::FinalReport;
use crate::statistic::{Accumulator, PartialAggregate, Statistic};
use crate::store::RecordStore;
use crate::{Rank, Record, ResolvedRecord, COORDINATOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Partition,
    Join,
    LocalAggregate,
    Send,
    ReceiveMerge,
    Report,
    Done,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Partition => "partition",
            Phase::Join => "join",
            Phase::LocalAggregate => "local-aggregate",
            Phase::Send => "send",
            Phase::ReceiveMerge => "receive-merge",
            Phase::Report => "report",
            Phase::Done => "done",
        }
    }

    /// Whether a worker may go from `self` to `next`.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Init, Partition)
                | (Partition, Join)
                | (Join, LocalAggregate)
                | (LocalAggregate, Send)
                | (LocalAggregate, ReceiveMerge)
                | (Send, Done)
                | (ReceiveMerge, Report)
                | (Report, Done)
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs file-heavy work off the async threads.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    task::spawn_blocking(f).await?
}

pub struct Worker<C> {
    channel: C,
    config: Arc<PipelineConfig>,
    store: RecordStore,
    phase: Phase,
}

impl<C: ReduceChannel> Worker<C> {
    pub fn new(channel: C, config: Arc<PipelineConfig>) -> Self {
        let store = config.store();
        Self {
            channel,
            config,
            store,
            phase: Phase::Init,
        }
    }

    pub fn rank(&self) -> Rank {
        self.channel.rank()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn advance(&mut self, next: Phase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(Error::IllegalTransition {
                rank: self.rank(),
                from: self.phase.name(),
                to: next.name(),
            });
        }
        debug!(from = %self.phase, to = %next, "phase change");
        self.phase = next;
        Ok(())
    }

    /// Runs every phase. Only the coordinator returns a report.
    pub async fn run(mut self) -> Result<Option<FinalReport>> {
        self.setup().await?;

        self.advance(Phase::Partition)?;
        let bucket = self.partition().await?;

        self.advance(Phase::Join)?;
        let (bucket, joined) = self.join(bucket).await?;

        self.advance(Phase::LocalAggregate)?;
        let started = Instant::now();
        let partials: Vec<PartialAggregate> = Statistic::ALL
            .into_iter()
            .map(|s| s.local(&bucket, &joined, self.config.top_k))
            .collect();
        info!(elapsed = ?started.elapsed(), "local aggregation done");

        if !self.channel.is_coordinator() {
            self.advance(Phase::Send)?;
            self.send(partials).await?;
            self.advance(Phase::Done)?;
            return Ok(None);
        }

        self.advance(Phase::ReceiveMerge)?;
        let report = self.receive_merge(partials).await?;

        self.advance(Phase::Report)?;
        let written = report.write_csv(&self.config.report_dir)?;
        info!(files = ?written, "reports written");
        self.advance(Phase::Done)?;
        Ok(Some(report))
    }

    /// The coordinator lays out the record store; everyone then agrees on
    /// whether that worked before anyone writes to it.
    async fn setup(&self) -> Result<()> {
        let scaffolded = if self.channel.is_coordinator() {
            let store = self.store.clone();
            let workers = self.channel.size();
            blocking(move || store.scaffold(workers)).await
        } else {
            Ok(())
        };

        let agreed = self.channel.agree(scaffolded.is_ok()).await?;
        scaffolded?;
        if !agreed {
            warn!("initializer failed to set up the record store, aborting");
            return Err(Error::SetupAborted { rank: self.rank() });
        }
        debug!(root = %self.store.root().display(), "record store ready");
        Ok(())
    }

    async fn partition(&self) -> Result<Vec<Record>> {
        let started = Instant::now();
        let store = self.store.clone();
        let rank = self.rank();
        let workers = self.channel.size();
        let input = self.config.input.clone();

        let (bucket, stats) = blocking(move || {
            let partitioner = Partitioner::new(&store, rank, workers);
            let stats = partitioner.run(&input)?;
            Ok((partitioner.load_bucket()?, stats))
        })
        .await?;

        info!(
            scanned = stats.scanned,
            kept = stats.kept,
            placeless = stats.placeless,
            elapsed = ?started.elapsed(),
            "partition done"
        );
        Ok(bucket)
    }

    async fn join(&self, bucket: Vec<Record>) -> Result<(Vec<Record>, Vec<ResolvedRecord>)> {
        let started = Instant::now();
        let store = self.store.clone();
        let rank = self.rank();
        let config = self.config.clone();

        let (bucket, joined, stats) = blocking(move || {
            let catalog = RegionCatalog::load(&config.regions, &config.patches)?;
            let matcher = LocationMatcher::new(&catalog)?;
            let (resolved, stats) = JoinStage::new(&matcher).run(bucket.iter().cloned());
            store.write_joint(rank, &resolved)?;
            Ok((bucket, store.read_joint(rank)?, stats))
        })
        .await?;

        info!(
            direct = stats.direct,
            capital_by_state = stats.capital_by_state,
            capital_by_city = stats.capital_by_city,
            excluded = stats.excluded,
            unresolved = stats.unresolved,
            elapsed = ?started.elapsed(),
            "join done"
        );
        Ok((bucket, joined))
    }

    /// Sends every partial to the coordinator, tagged with this worker's rank.
    async fn send(&self, partials: Vec<PartialAggregate>) -> Result<()> {
        let started = Instant::now();
        let tag = self.rank() as u32;
        let mut pending = Vec::with_capacity(partials.len());
        for partial in &partials {
            pending.push(self.channel.isend(COORDINATOR, tag, partial.encode()?)?);
        }
        for request in pending {
            request.wait().await?;
        }
        info!(elapsed = ?started.elapsed(), "partials sent");
        Ok(())
    }

    /// Merges the partials of workers `1..N`, in that order, into the
    /// coordinator's own.
    async fn receive_merge(&self, own: Vec<PartialAggregate>) -> Result<FinalReport> {
        let started = Instant::now();
        let mut accumulators: Vec<Accumulator> = own.into_iter().map(Accumulator::new).collect();

        // Partials from one worker arrive in the order they were sent.
        for accumulator in accumulators.iter_mut() {
            let expected = accumulator.statistic();
            for source in 1..self.channel.size() {
                let bytes = self.channel.irecv(source, source as u32)?.wait().await?;
                let partial = PartialAggregate::decode(&bytes, expected)?;
                debug!(%source, statistic = %expected, rows = partial.len(), "partial received");
                accumulator.merge(partial)?;
            }
        }

        let top_k = self.config.top_k;
        let report =
            FinalReport::from_tables(accumulators.into_iter().map(|acc| acc.finish(top_k)));
        info!(elapsed = ?started.elapsed(), "merge done");
        Ok(report)
    }
}
