//! Bounded concurrent execution with per-task failure isolation.
//!
//! 各タスクは独立に実行され、タイムアウト・panic は該当タスクの失敗として
//! 記録されるだけで他のタスクには波及しない。

use std::{future::Future, num::NonZeroUsize, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{sync::Semaphore, time::timeout};
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    #[error("task timed out after {0:?}")]
    TimedOut(Duration),
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("task was cancelled")]
    Cancelled,
}

/// Runs every task to completion with at most `max_concurrency` in flight.
///
/// Results come back in input order, each paired with its key. The timeout
/// starts once a task holds its permit.
pub async fn settle_all<K, T, F>(
    tasks: Vec<(K, F)>,
    max_concurrency: NonZeroUsize,
    task_timeout: Duration,
) -> Vec<(K, Result<T, TaskFailure>)>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.get()));
    let mut keys = Vec::with_capacity(tasks.len());
    let mut handles = Vec::with_capacity(tasks.len());

    for (key, task) in tasks {
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return Err(TaskFailure::Cancelled);
            };
            timeout(task_timeout, task)
                .await
                .map_err(|_| TaskFailure::TimedOut(task_timeout))
        }));
        keys.push(key);
    }

    let joined = futures::future::join_all(handles).await;

    keys.into_iter()
        .zip(joined)
        .map(|(key, joined)| {
            let outcome = match joined {
                Ok(result) => result,
                Err(join_error) => match join_error.try_into_panic() {
                    Ok(panic_payload) => {
                        let panic_message = panic_payload
                            .downcast_ref::<&str>()
                            .map(|s| (*s).to_string())
                            .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic payload".to_string());
                        error!(panic_message, "fan-out task panicked");
                        Err(TaskFailure::Panicked(panic_message))
                    }
                    Err(join_error) => {
                        warn!(error = ?join_error, "fan-out task was cancelled");
                        Err(TaskFailure::Cancelled)
                    }
                },
            };
            (key, outcome)
        })
        .collect()
}
