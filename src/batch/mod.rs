//! Batched external-write coordination.
//!
//! Some attached sources cannot hang callbacks off an ambient
//! transaction, or must submit a set of statements atomically through a
//! side-channel executor instead of one by one. The coordinator makes
//! both look like ordinary sequential statement execution: reads pass
//! through immediately, writes queue while a batch is open and flush as
//! one ordered unit, and post-commit callbacks replay after the flush.
//!
//! State machine per coordinator: `Idle -> Batching -> Flushing -> Idle`.
//!
//! Invariant: a write statement is never executed twice. Either it runs
//! once immediately (no batch open) or once inside the single batched
//! submission.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Result type for coordinator operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors raised by the write coordinator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BatchError {
    /// A queued statement reached the flush without its captured SQL
    /// text. It is rejected instead of silently routed through a path
    /// that would double-execute it.
    #[error("batched statement has no captured text")]
    TextMissing,

    /// The batched submission failed; every pending statement was
    /// rejected with this error.
    #[error("batch flush failed: {0}")]
    FlushFailed(String),

    /// The statement's result channel was dropped before resolution.
    #[error("batched statement was abandoned")]
    Abandoned,
}

/// The classification of a submitted statement, by leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Raw,
}

impl StatementKind {
    /// Classify a statement by its leading keyword.
    pub fn classify(sql: &str) -> StatementKind {
        let head = sql.trim_start().to_lowercase();
        if head.starts_with("select") {
            StatementKind::Select
        } else if head.starts_with("insert") {
            StatementKind::Insert
        } else if head.starts_with("update") {
            StatementKind::Update
        } else if head.starts_with("delete") {
            StatementKind::Delete
        } else {
            StatementKind::Raw
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, StatementKind::Select)
    }
}

/// The side-channel executor owning atomic submission to the external
/// source.
#[async_trait]
pub trait ExternalExecutor: Send + Sync {
    /// Execute one statement immediately.
    async fn run(&self, sql: &str) -> Result<Value, String>;

    /// Execute an ordered set of statements as one atomic unit, returning
    /// one result per statement in submission order.
    async fn run_batch(&self, statements: &[String]) -> Result<Vec<Value>, String>;
}

/// A callback run after a successful flush, in registration order.
type CommitCallback = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send>;

struct QueuedStatement {
    text: Option<String>,
    kind: StatementKind,
    reply: oneshot::Sender<BatchResult<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Batching,
    Flushing,
}

#[derive(Default)]
struct CoordinatorState {
    mode: Option<Mode>,
    queue: Vec<QueuedStatement>,
    callbacks: Vec<CommitCallback>,
}

impl CoordinatorState {
    fn mode(&self) -> Mode {
        self.mode.unwrap_or(Mode::Idle)
    }
}

/// Batched external-write coordinator over one executor.
pub struct BatchCoordinator<E> {
    executor: E,
    state: Mutex<CoordinatorState>,
}

impl<E: ExternalExecutor> BatchCoordinator<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    /// The wrapped executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Whether a batch bracket is currently open.
    pub fn is_batching(&self) -> bool {
        self.lock_state().mode() == Mode::Batching
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CoordinatorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Open a batch bracket: `Idle -> Batching`.
    ///
    /// Re-opening while already batching resets the queued state, like
    /// the underlying source's begin semantics.
    pub fn begin_batch_mode(&self) {
        let mut state = self.lock_state();
        if !state.queue.is_empty() {
            warn!(
                dropped = state.queue.len(),
                "begin_batch_mode discarded a previously queued batch"
            );
            for statement in state.queue.drain(..) {
                let _ = statement.reply.send(Err(BatchError::Abandoned));
            }
        }
        state.callbacks.clear();
        state.mode = Some(Mode::Batching);
        debug!("batch mode opened");
    }

    /// Execute a statement, or queue it if a batch is open.
    ///
    /// SELECTs always execute immediately: validation logic inside a
    /// bracket depends on reading current state (read-your-writes within
    /// a batch is not guaranteed). Non-SELECT statements queue with
    /// their SQL text captured verbatim.
    pub async fn execute(&self, sql: &str, kind: Option<StatementKind>) -> BatchResult<Value> {
        let kind = kind.unwrap_or_else(|| StatementKind::classify(sql));

        let receiver = {
            let mut state = self.lock_state();
            if state.mode() != Mode::Batching || !kind.is_write() {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.queue.push(QueuedStatement {
                    text: Some(sql.to_string()),
                    kind,
                    reply: tx,
                });
                Some(rx)
            }
        };

        match receiver {
            None => self
                .executor
                .run(sql)
                .await
                .map_err(BatchError::FlushFailed),
            Some(rx) => rx.await.unwrap_or(Err(BatchError::Abandoned)),
        }
    }

    /// Queue a deferred statement without going through [`execute`].
    ///
    /// Adapters that render SQL lazily use this; a `None` text is
    /// rejected with [`BatchError::TextMissing`] at flush time rather
    /// than silently re-executed.
    ///
    /// [`execute`]: BatchCoordinator::execute
    pub fn defer(
        &self,
        kind: StatementKind,
        text: Option<String>,
    ) -> oneshot::Receiver<BatchResult<Value>> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock_state();
        state.queue.push(QueuedStatement {
            text,
            kind,
            reply: tx,
        });
        rx
    }

    /// Register a callback to run after the batch flushes (or
    /// immediately when no batch is open). Callback failures are logged
    /// and otherwise ignored; they are secondary effects, not the write.
    pub async fn on_before_commit<F, Fut>(&self, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let immediate = {
            let mut state = self.lock_state();
            if state.mode() == Mode::Batching {
                state
                    .callbacks
                    .push(Box::new(move || Box::pin(callback())));
                None
            } else {
                Some(callback)
            }
        };
        if let Some(callback) = immediate {
            if let Err(err) = callback().await {
                error!(error = %err, "commit callback failed");
            }
        }
    }

    /// Close the bracket and flush: `Batching -> Flushing -> Idle`.
    ///
    /// Every queued statement with captured text is submitted as one
    /// ordered unit; per-statement results are distributed back to each
    /// caller in submission order. If the flush fails, every pending
    /// statement is rejected with the flush error before it propagates.
    pub async fn end_batch_mode(&self) -> BatchResult<()> {
        let (queue, callbacks) = {
            let mut state = self.lock_state();
            if state.mode() != Mode::Batching {
                return Ok(());
            }
            state.mode = Some(Mode::Flushing);
            (
                std::mem::take(&mut state.queue),
                std::mem::take(&mut state.callbacks),
            )
        };

        let mut texts: Vec<String> = Vec::with_capacity(queue.len());
        let mut submitted: Vec<QueuedStatement> = Vec::with_capacity(queue.len());
        for statement in queue {
            match &statement.text {
                Some(text) => {
                    texts.push(text.clone());
                    submitted.push(statement);
                }
                None => {
                    warn!(kind = ?statement.kind, "rejecting batched statement without text");
                    let _ = statement.reply.send(Err(BatchError::TextMissing));
                }
            }
        }

        let flush_result = if texts.is_empty() {
            Ok(Vec::new())
        } else {
            self.executor.run_batch(&texts).await
        };

        let outcome = match flush_result {
            Ok(results) => {
                for (index, statement) in submitted.into_iter().enumerate() {
                    let result = results.get(index).cloned().ok_or_else(|| {
                        BatchError::FlushFailed(format!(
                            "executor returned {} results for {} statements",
                            results.len(),
                            texts.len()
                        ))
                    });
                    let _ = statement.reply.send(result);
                }
                debug!(statements = texts.len(), "batch flushed");
                Ok(())
            }
            Err(err) => {
                let failure = BatchError::FlushFailed(err);
                for statement in submitted {
                    let _ = statement.reply.send(Err(failure.clone()));
                }
                Err(failure)
            }
        };

        if outcome.is_ok() {
            for callback in callbacks {
                if let Err(err) = callback().await {
                    error!(error = %err, "commit callback failed");
                }
            }
        }

        let mut state = self.lock_state();
        state.mode = Some(Mode::Idle);
        state.queue.clear();
        state.callbacks.clear();
        outcome
    }
}
