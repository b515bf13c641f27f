//! Runs all N workers as tasks of one process, connected by a [`LocalMesh`].

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::channel::{LocalMesh, ReduceChannel};
use crate::cmd::PipelineConfig;
use crate::error::{Error, Result};
use crate::report::FinalReport;
use crate::worker::Worker;

/// Runs the whole pipeline and returns the coordinator's report.
///
/// The first worker to fail on its own cancels the others. Errors that only
/// report another worker's failure ([`Error::is_secondary`]) do not cancel
/// anything, and the original failure is returned in their place.
///
/// # Panics
///
/// Panics if `config.workers` is zero.
pub async fn run(config: PipelineConfig) -> Result<FinalReport> {
    let run_id = Uuid::new_v4();
    let workers = config.workers;
    let config = Arc::new(config);
    info!(%run_id, workers, input = %config.input, "starting run");

    let mut set = JoinSet::new();
    for endpoint in LocalMesh::new(workers) {
        let span = info_span!("worker", %run_id, rank = endpoint.rank());
        let worker = Worker::new(endpoint, config.clone());
        set.spawn(worker.run().instrument(span));
    }

    let mut report = None;
    let mut failure: Option<Error> = None;
    while let Some(joined) = set.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => continue,
            Err(e) => Err(Error::Join(e)),
        };
        match outcome {
            Ok(Some(r)) => report = Some(r),
            Ok(None) => {}
            Err(e) => {
                error!(%run_id, error = %e, "worker failed");
                if !e.is_secondary() {
                    set.abort_all();
                }
                failure = match failure {
                    Some(first) if !first.is_secondary() || e.is_secondary() => Some(first),
                    _ => Some(e),
                };
            }
        }
    }

    match (failure, report) {
        (Some(e), _) => Err(e),
        (None, Some(report)) => {
            info!(%run_id, "run complete");
            Ok(report)
        }
        (None, None) => unreachable!("the coordinator finished without a report"),
    }
}
