//! Structured concurrent gather
//!
//! Runs every task to completion on the tokio runtime and returns one
//! settled outcome per task, tagged with the key it was submitted under.
//! A failing or panicking task never cancels its siblings.

use futures_util::future::join_all;
use std::any::Any;
use std::future::Future;
use tokio::task::JoinError;

/// Why a task produced no value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub message: String,
}

impl From<JoinError> for TaskFailure {
    fn from(err: JoinError) -> Self {
        let message = if err.is_panic() {
            format!("task panicked: {}", panic_message(err.into_panic()))
        } else {
            "task was cancelled".to_string()
        };
        Self { message }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// One task's outcome
#[derive(Debug)]
pub struct Settled<K, T> {
    /// Key the task was submitted with
    pub key: K,
    /// Task value, or why there is none
    pub outcome: Result<T, TaskFailure>,
}

/// Spawn every `(key, future)` pair and wait for all of them.
///
/// Results come back in submission order.
pub async fn gather<K, F, T>(tasks: impl IntoIterator<Item = (K, F)>) -> Vec<Settled<K, T>>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let pending = tasks.into_iter().map(|(key, task)| {
        let handle = tokio::spawn(task);
        async move {
            Settled {
                key,
                outcome: handle.await.map_err(TaskFailure::from),
            }
        }
    });

    join_all(pending).await
}
