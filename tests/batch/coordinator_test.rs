//! Batched external-write coordination invariants.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use trellis::batch::{BatchCoordinator, BatchError, ExternalExecutor, StatementKind};

/// Records every submission so tests can assert exactly-once execution.
#[derive(Default)]
struct RecordingExecutor {
    single_runs: Mutex<Vec<String>>,
    batch_runs: Mutex<Vec<Vec<String>>>,
    fail_batch: bool,
}

#[async_trait]
impl ExternalExecutor for RecordingExecutor {
    async fn run(&self, sql: &str) -> Result<Value, String> {
        self.single_runs.lock().unwrap().push(sql.to_string());
        Ok(json!({ "immediate": sql }))
    }

    async fn run_batch(&self, statements: &[String]) -> Result<Vec<Value>, String> {
        self.batch_runs
            .lock()
            .unwrap()
            .push(statements.to_vec());
        if self.fail_batch {
            return Err("executor unavailable".to_string());
        }
        Ok(statements
            .iter()
            .enumerate()
            .map(|(i, sql)| json!({ "index": i, "sql": sql }))
            .collect())
    }
}

#[tokio::test]
async fn writes_queue_and_flush_exactly_once_in_order() {
    let coordinator = BatchCoordinator::new(RecordingExecutor::default());
    coordinator.begin_batch_mode();
    assert!(coordinator.is_batching());

    let statements = [
        "INSERT INTO t (a) VALUES (1)",
        "UPDATE t SET a = 2",
        "DELETE FROM t WHERE a = 3",
    ];

    let handles: Vec<_> = statements
        .iter()
        .map(|sql| coordinator.execute(sql, None))
        .collect();

    // All three enqueue on first poll; the flush then distributes
    // positional results back to each caller.
    let (results, flushed) = tokio::join!(futures::future::join_all(handles), async {
        // Let the executes enqueue first.
        tokio::task::yield_now().await;
        coordinator.end_batch_mode().await
    });
    flushed.unwrap();

    for (i, result) in results.into_iter().enumerate() {
        let value = result.unwrap();
        assert_eq!(value["index"], i as u64);
        assert_eq!(value["sql"], statements[i]);
    }

    let executor = coordinator.executor();
    assert!(executor.single_runs.lock().unwrap().is_empty());
    let batches = executor.batch_runs.lock().unwrap();
    assert_eq!(batches.len(), 1, "one submission for the whole batch");
    assert_eq!(batches[0], statements);
    assert!(!coordinator.is_batching());
}

#[tokio::test]
async fn selects_bypass_the_queue() {
    let coordinator = BatchCoordinator::new(RecordingExecutor::default());
    coordinator.begin_batch_mode();

    let result = coordinator
        .execute("SELECT count(*) FROM t", None)
        .await
        .unwrap();
    assert_eq!(result["immediate"], "SELECT count(*) FROM t");

    assert_eq!(
        coordinator.executor().single_runs.lock().unwrap().len(),
        1
    );
    coordinator.end_batch_mode().await.unwrap();
    // An empty queue never reaches the external executor.
    assert!(coordinator.executor().batch_runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn statements_outside_a_bracket_run_immediately() {
    let coordinator = BatchCoordinator::new(RecordingExecutor::default());
    coordinator
        .execute("INSERT INTO t (a) VALUES (1)", None)
        .await
        .unwrap();
    assert_eq!(
        coordinator.executor().single_runs.lock().unwrap().len(),
        1
    );
    assert!(coordinator.executor().batch_runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn flush_failure_rejects_every_pending_statement() {
    let executor = RecordingExecutor {
        fail_batch: true,
        ..Default::default()
    };
    let coordinator = BatchCoordinator::new(executor);
    coordinator.begin_batch_mode();

    let first = coordinator.execute("INSERT INTO t VALUES (1)", None);
    let second = coordinator.execute("DELETE FROM t", None);

    let (first, second, flushed) = tokio::join!(first, second, async {
        tokio::task::yield_now().await;
        coordinator.end_batch_mode().await
    });

    assert!(matches!(flushed, Err(BatchError::FlushFailed(_))));
    assert!(matches!(first, Err(BatchError::FlushFailed(_))));
    assert!(matches!(second, Err(BatchError::FlushFailed(_))));
    assert!(!coordinator.is_batching());
}

#[tokio::test]
async fn missing_text_is_rejected_not_reexecuted() {
    let coordinator = BatchCoordinator::new(RecordingExecutor::default());
    coordinator.begin_batch_mode();

    let orphan = coordinator.defer(StatementKind::Raw, None);
    let ok = coordinator.execute("UPDATE t SET a = 1", None);

    let (orphan, ok, flushed) = tokio::join!(orphan, ok, async {
        tokio::task::yield_now().await;
        coordinator.end_batch_mode().await
    });
    flushed.unwrap();

    assert!(matches!(orphan.unwrap(), Err(BatchError::TextMissing)));
    assert!(ok.is_ok());

    // The orphan never reached the executor.
    let batches = coordinator.executor().batch_runs.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], vec!["UPDATE t SET a = 1".to_string()]);
}

#[tokio::test]
async fn callbacks_replay_in_order_after_flush() {
    let coordinator = Arc::new(BatchCoordinator::new(RecordingExecutor::default()));
    coordinator.begin_batch_mode();

    let order = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));

    for tag in ["first", "second", "third"] {
        let order = order.clone();
        let calls = calls.clone();
        coordinator
            .on_before_commit(move || async move {
                order.lock().unwrap().push(tag.to_string());
                calls.fetch_add(1, Ordering::SeqCst);
                // one failing callback must not fail the flush
                if tag == "second" {
                    return Err("webhook down".to_string());
                }
                Ok(())
            })
            .await;
    }

    // Callbacks are deferred while batching.
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    coordinator.end_batch_mode().await.unwrap();
    assert_eq!(
        order.lock().unwrap().as_slice(),
        &["first", "second", "third"]
    );
}

#[tokio::test]
async fn end_without_begin_is_a_no_op() {
    let coordinator = BatchCoordinator::new(RecordingExecutor::default());
    coordinator.end_batch_mode().await.unwrap();
    assert!(coordinator.executor().batch_runs.lock().unwrap().is_empty());
}
