//! Bounded work queues in front of one [`Orchestrator`].
//!
//! Writes and queries go through separate channels. A writer task runs ingest
//! and clear jobs one at a time, in submission order. A dispatcher spawns each
//! query as soon as it arrives, so queries run concurrently with each other and
//! with whatever write is in progress; the index lock keeps each search
//! consistent with one corpus.

use std::path::PathBuf;
use std::sync::Arc;

use sage_index::IndexError;
use sage_llm::LlmProvider;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;
use crate::orchestrator::{IngestReport, Orchestrator, QueryResult};

enum WriteJob {
    Ingest {
        paths: Vec<PathBuf>,
        reply: oneshot::Sender<IngestReport>,
    },
    Clear {
        reply: oneshot::Sender<Result<(), IndexError>>,
    },
}

struct QueryJob {
    question: String,
    include_system_info: bool,
    cancel: CancellationToken,
    reply: oneshot::Sender<QueryResult>,
}

/// A query accepted by the queue.
pub struct PendingQuery {
    cancel: CancellationToken,
    rx: oneshot::Receiver<QueryResult>,
}

impl PendingQuery {
    /// Abort the model call. The query still completes, as degraded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// # Errors
    ///
    /// `Closed` if the worker stopped before answering.
    pub async fn wait(self) -> Result<QueryResult, QueueError> {
        self.rx.await.map_err(|_| QueueError::Closed)
    }
}

/// `capacity` bounds pending writes and pending queries separately.
pub struct TaskQueue {
    writes: mpsc::Sender<WriteJob>,
    queries: mpsc::Sender<QueryJob>,
    shutdown: CancellationToken,
    writer: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

fn rejected<T>(e: TrySendError<T>) -> QueueError {
    match e {
        TrySendError::Full(_) => QueueError::Full,
        TrySendError::Closed(_) => QueueError::Closed,
    }
}

impl TaskQueue {
    /// Start the writer and the query dispatcher on the current runtime.
    #[must_use]
    pub fn spawn<P: LlmProvider + 'static>(
        orchestrator: Arc<Orchestrator<P>>,
        capacity: usize,
    ) -> Self {
        let (writes, write_rx) = mpsc::channel(capacity.max(1));
        let (queries, query_rx) = mpsc::channel(capacity.max(1));
        let writer = tokio::spawn(run_writes(Arc::clone(&orchestrator), write_rx));
        let dispatcher = tokio::spawn(run_queries(orchestrator, query_rx));
        Self {
            writes,
            queries,
            shutdown: CancellationToken::new(),
            writer,
            dispatcher,
        }
    }

    /// # Errors
    ///
    /// `Full` when the write queue is at capacity, `Closed` after shutdown.
    pub fn submit_ingest(
        &self,
        paths: Vec<PathBuf>,
    ) -> Result<oneshot::Receiver<IngestReport>, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.writes
            .try_send(WriteJob::Ingest { paths, reply })
            .map_err(rejected)?;
        Ok(rx)
    }

    /// # Errors
    ///
    /// `Full` when the query queue is at capacity, `Closed` after shutdown.
    pub fn submit_query(
        &self,
        question: impl Into<String>,
        include_system_info: bool,
    ) -> Result<PendingQuery, QueueError> {
        let cancel = self.shutdown.child_token();
        let (reply, rx) = oneshot::channel();
        self.queries
            .try_send(QueryJob {
                question: question.into(),
                include_system_info,
                cancel: cancel.clone(),
                reply,
            })
            .map_err(rejected)?;
        Ok(PendingQuery { cancel, rx })
    }

    /// # Errors
    ///
    /// `Full` when the write queue is at capacity, `Closed` after shutdown.
    pub fn submit_clear(&self) -> Result<oneshot::Receiver<Result<(), IndexError>>, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.writes
            .try_send(WriteJob::Clear { reply })
            .map_err(rejected)?;
        Ok(rx)
    }

    /// Stop accepting work, cancel in-flight queries, and wait for queued
    /// writes to finish.
    pub async fn shutdown(self) {
        let Self {
            writes,
            queries,
            shutdown,
            writer,
            dispatcher,
        } = self;
        shutdown.cancel();
        drop(queries);
        drop(writes);
        for (name, handle) in [("query dispatcher", dispatcher), ("index writer", writer)] {
            if let Err(e) = handle.await {
                tracing::error!("{name} panicked: {e}");
            }
        }
    }
}

async fn run_writes<P: LlmProvider + 'static>(
    orchestrator: Arc<Orchestrator<P>>,
    mut rx: mpsc::Receiver<WriteJob>,
) {
    while let Some(job) = rx.recv().await {
        match job {
            WriteJob::Ingest { paths, reply } => {
                let report = orchestrator.ingest(&paths).await;
                let _ = reply.send(report);
            }
            WriteJob::Clear { reply } => {
                let _ = reply.send(orchestrator.clear().await);
            }
        }
    }
    tracing::debug!("index writer stopped");
}

async fn run_queries<P: LlmProvider + 'static>(
    orchestrator: Arc<Orchestrator<P>>,
    mut rx: mpsc::Receiver<QueryJob>,
) {
    let mut running = JoinSet::new();

    loop {
        tokio::select! {
            job = rx.recv() => {
                let Some(job) = job else { break };
                let orchestrator = Arc::clone(&orchestrator);
                running.spawn(async move {
                    let result = orchestrator
                        .query_with_cancel(&job.question, job.include_system_info, &job.cancel)
                        .await;
                    let _ = job.reply.send(result);
                });
            }
            Some(joined) = running.join_next(), if !running.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!("query task failed: {e}");
                }
            }
        }
    }

    while let Some(joined) = running.join_next().await {
        if let Err(e) = joined {
            tracing::error!("query task failed: {e}");
        }
    }
    tracing::debug!("query dispatcher stopped");
}
