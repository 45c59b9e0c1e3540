//! Background job worker.
//!
//! Runs file loads and analyses one at a time in a tokio task, doing the CPU
//! work on the blocking pool, and sends each [`Completion`] back through an
//! `mpsc` channel so the foreground loop can apply it without shared mutable
//! state.

use std::path::PathBuf;
use std::sync::Arc;

use cdr_core::error::{CdrError, Result};
use cdr_core::models::{AnalysisRequest, RawTable};
use cdr_data::analysis::{run_analysis, AnalysisOutcome};
use cdr_data::canonical::CanonicalSet;
use cdr_data::reader::load_table;
use tokio::sync::mpsc;

// ── Public types ──────────────────────────────────────────────────────────────

/// Identifier the session assigns to each submitted job.
pub type JobId = u64;

/// Work the worker can run.
#[derive(Debug, Clone)]
pub enum Job {
    /// Read a CDR file into a table.
    Load { path: PathBuf },
    /// Filter and aggregate an already canonicalized set.
    Analyze {
        set: Arc<CanonicalSet>,
        request: AnalysisRequest,
    },
}

impl Job {
    pub fn describe(&self) -> String {
        match self {
            Job::Load { path } => format!("load {}", path.display()),
            Job::Analyze { request, .. } => format!("analyze ({})", request.kind.label()),
        }
    }
}

/// What a successful job produced.
#[derive(Debug, Clone)]
pub enum JobOutput {
    Loaded {
        path: PathBuf,
        table: Arc<RawTable>,
    },
    Analyzed(AnalysisOutcome),
}

/// A finished job, successful or not.
#[derive(Debug)]
pub struct Completion {
    pub id: JobId,
    pub result: Result<JobOutput>,
}

// ── Worker ────────────────────────────────────────────────────────────────────

/// Spawns the worker task.
pub struct Worker;

impl Worker {
    /// Start the worker loop in a dedicated tokio task.
    ///
    /// Returns the submission side, the completion receiver the foreground
    /// polls, and a [`WorkerHandle`] that can stop the loop.
    pub fn start() -> (WorkerClient, mpsc::Receiver<Completion>, WorkerHandle) {
        let (job_tx, job_rx) = mpsc::channel(4);
        let (done_tx, done_rx) = mpsc::channel(4);

        let handle = tokio::spawn(async move {
            worker_loop(job_rx, done_tx).await;
        });

        (
            WorkerClient { tx: job_tx },
            done_rx,
            WorkerHandle { handle },
        )
    }
}

/// Submission side of the worker.
#[derive(Debug, Clone)]
pub struct WorkerClient {
    tx: mpsc::Sender<(JobId, Job)>,
}

impl WorkerClient {
    /// Queue `job` without waiting. Callable from synchronous code.
    pub fn submit(&self, id: JobId, job: Job) -> Result<()> {
        self.tx.try_send((id, job)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => CdrError::Busy,
            mpsc::error::TrySendError::Closed(_) => {
                CdrError::Other(anyhow::anyhow!("background worker has stopped"))
            }
        })
    }
}

/// A handle to the background worker task.
///
/// Drop or call [`WorkerHandle::abort`] to stop the loop.
pub struct WorkerHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl WorkerHandle {
    /// Immediately abort the worker loop.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

// ── Private implementation ────────────────────────────────────────────────────

/// Runs jobs in arrival order until either channel closes.
async fn worker_loop(mut jobs: mpsc::Receiver<(JobId, Job)>, done: mpsc::Sender<Completion>) {
    while let Some((id, job)) = jobs.recv().await {
        tracing::debug!(id, job = %job.describe(), "worker picked up job");

        let result = match tokio::task::spawn_blocking(move || execute(job)).await {
            Ok(result) => result,
            Err(e) => Err(CdrError::Other(anyhow::anyhow!("worker task failed: {e}"))),
        };

        if let Err(e) = done.send(Completion { id, result }).await {
            tracing::warn!(error = %e, "failed to deliver completion; receiver dropped");
            break;
        }
    }
    tracing::debug!("worker channel closed; exiting loop");
}

/// Run one job synchronously.
pub fn execute(job: Job) -> Result<JobOutput> {
    match job {
        Job::Load { path } => {
            let table = load_table(&path)?;
            Ok(JobOutput::Loaded {
                path,
                table: Arc::new(table),
            })
        }
        Job::Analyze { set, request } => run_analysis(&set, &request).map(JobOutput::Analyzed),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use cdr_core::error::LoadError;
    use std::time::Duration;

    async fn next(rx: &mut mpsc::Receiver<Completion>) -> Completion {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for completion")
            .expect("channel closed before completion")
    }

    #[test]
    fn test_execute_load_missing_file() {
        let err = execute(Job::Load {
            path: PathBuf::from("/nonexistent/calls.csv"),
        })
        .unwrap_err();
        assert!(matches!(err, CdrError::Load(LoadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_worker_runs_load_job() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("calls.csv");
        std::fs::write(&path, "Date,Number,Main City\n2024-03-01,A,X\n").unwrap();

        let (client, mut rx, handle) = Worker::start();
        client.submit(7, Job::Load { path: path.clone() }).unwrap();

        let completion = next(&mut rx).await;
        assert_eq!(completion.id, 7);
        match completion.result.unwrap() {
            JobOutput::Loaded { path: p, table } => {
                assert_eq!(p, path);
                assert_eq!(table.row_count(), 1);
            }
            other => panic!("unexpected output: {other:?}"),
        }
        handle.abort();
    }

    #[tokio::test]
    async fn test_worker_reports_failures_as_completions() {
        let (client, mut rx, handle) = Worker::start();
        client
            .submit(
                1,
                Job::Load {
                    path: PathBuf::from("/nonexistent/calls.csv"),
                },
            )
            .unwrap();

        let completion = next(&mut rx).await;
        assert_eq!(completion.id, 1);
        assert!(completion.result.is_err());
        handle.abort();
    }

    #[tokio::test]
    async fn test_worker_processes_jobs_in_order() {
        let (client, mut rx, handle) = Worker::start();
        for id in 1..=3 {
            client
                .submit(
                    id,
                    Job::Load {
                        path: PathBuf::from("/nonexistent/calls.csv"),
                    },
                )
                .unwrap();
        }
        for id in 1..=3 {
            assert_eq!(next(&mut rx).await.id, id);
        }
        handle.abort();
    }
}
