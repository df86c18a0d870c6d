//! Send serializer
//!
//! The remote protocol requires strictly sequential writes: two sends must
//! never interleave, even when the application issues them concurrently.
//! [`SendSerializer`] is the single choke point enforcing that. It keeps one
//! process-wide FIFO of boxed futures consumed by a single worker task, so
//! at most one task body executes at any instant and tasks run in enqueue
//! order. A failing task rejects its own caller and nothing else; the chain
//! keeps moving.

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// FIFO, single-flight executor for outbound send operations
///
/// # Examples
///
/// ```rust
/// use chat_client_core::coordinator::SendSerializer;
///
/// # #[tokio::main]
/// # async fn main() {
/// let serializer = SendSerializer::new();
///
/// let n = serializer
///     .enqueue(|| async { Ok::<u32, chat_client_core::ClientError>(7) })
///     .await
///     .unwrap();
/// assert_eq!(n, 7);
/// # }
/// ```
#[derive(Debug)]
pub struct SendSerializer {
    queue_tx: mpsc::UnboundedSender<BoxFuture<'static, ()>>,
}

impl SendSerializer {
    /// Create the serializer and spawn its worker task
    ///
    /// Must be called within a Tokio runtime. The worker runs until the
    /// serializer is dropped and the queue drains.
    pub fn new() -> Self {
        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<BoxFuture<'static, ()>>();
        tokio::spawn(async move {
            while let Some(job) = queue_rx.recv().await {
                job.await;
            }
            debug!("send serializer worker stopped");
        });
        Self { queue_tx }
    }

    /// Append `task` to the send chain and wait for its own outcome
    ///
    /// `task` starts only after every previously enqueued task has settled,
    /// resolved or rejected. Two concurrent callers are ordered by the
    /// moment their `enqueue` call runs, not by task completion time.
    pub async fn enqueue<T, F, Fut>(&self, task: F) -> ClientResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ClientResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: BoxFuture<'static, ()> = Box::pin(async move {
            let outcome = task().await;
            // Receiver gone means the caller stopped waiting; the task
            // still ran in order, which is what the protocol needs.
            let _ = result_tx.send(outcome);
        });

        self.queue_tx
            .send(job)
            .map_err(|_| ClientError::SendQueueClosed)?;

        result_rx.await.map_err(|_| ClientError::SendQueueClosed)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::sleep;
    use tokio_test::{assert_err, assert_ok};

    // Timing-sensitive; keep it off a loaded scheduler
    #[tokio::test]
    #[serial]
    async fn test_tasks_run_in_enqueue_order_without_overlap() {
        let serializer = Arc::new(SendSerializer::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let in_flight = Arc::new(Mutex::new(0usize));

        let mut handles = Vec::new();
        // B sleeps longest; FIFO order must still hold
        for (name, delay_ms) in [("A", 10u64), ("B", 60), ("C", 5)] {
            let serializer = serializer.clone();
            let log = log.clone();
            let in_flight = in_flight.clone();
            handles.push(tokio::spawn(async move {
                serializer
                    .enqueue(move || async move {
                        {
                            let mut n = in_flight.lock().unwrap();
                            *n += 1;
                            assert_eq!(*n, 1, "two send tasks overlapped");
                        }
                        sleep(Duration::from_millis(delay_ms)).await;
                        log.lock().unwrap().push(name);
                        *in_flight.lock().unwrap() -= 1;
                        Ok::<(), ClientError>(())
                    })
                    .await
            }));
            // Give each spawned caller time to reach its enqueue call so
            // the intended ordering is the observed enqueue ordering
            sleep(Duration::from_millis(5)).await;
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_failed_task_does_not_poison_the_chain() {
        let serializer = SendSerializer::new();

        let first: ClientResult<u32> = serializer
            .enqueue(|| async { Err(ClientError::transport("send failed")) })
            .await;
        assert_err!(first);

        let second = serializer.enqueue(|| async { Ok::<u32, ClientError>(42) }).await;
        assert_eq!(assert_ok!(second), 42);
    }

    #[tokio::test]
    async fn test_result_value_propagates() {
        let serializer = SendSerializer::new();
        let out = serializer
            .enqueue(|| async { Ok::<String, ClientError>("sent".to_string()) })
            .await;
        assert_eq!(assert_ok!(out), "sent");
    }
}
