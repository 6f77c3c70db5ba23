use crate::prelude::*;

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(300);

struct Job {
    label: String,
    run: BoxFuture<'static, ()>,
}

/// Serializes every exchange on one half-duplex channel.
///
/// Jobs run one at a time in the order they were enqueued, with at least
/// `min_delay` between the end of one job and the start of the next. Cloning
/// shares the same queue.
#[derive(Clone)]
pub struct CommandQueue {
    inner: Arc<Inner>,
}

struct Inner {
    min_delay: Duration,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Resolves to the result of one enqueued operation.
///
/// If the queue is stopped before the operation finishes, the handle resolves
/// to an error instead of waiting forever.
pub struct QueueHandle<T> {
    label: String,
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> QueueHandle<T> {
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<T> Future for QueueHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => {
                Poll::Ready(Err(anyhow!("queue stopped before {} completed", self.label)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY)
    }
}

impl CommandQueue {
    pub fn new(min_delay: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                min_delay,
                sender: Mutex::new(Some(sender)),
                receiver: Mutex::new(Some(receiver)),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.inner.min_delay
    }

    /// Spawns the worker. Calling it again, or after `stop`, does nothing.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let receiver = match self.inner.receiver.lock() {
            Ok(mut r) => r.take(),
            Err(_) => None,
        };

        if let Some(receiver) = receiver {
            let handle = tokio::spawn(Self::worker(receiver, self.inner.min_delay));
            if let Ok(mut worker) = self.inner.worker.lock() {
                *worker = Some(handle);
            }
            info!("command queue started (min delay {:?})", self.inner.min_delay);
        }
    }

    /// Aborts the worker and refuses further jobs. Jobs still queued, and the
    /// one in flight, are dropped; their handles resolve to an error.
    pub fn stop(&self) {
        if let Ok(mut sender) = self.inner.sender.lock() {
            sender.take();
        }
        if let Ok(mut receiver) = self.inner.receiver.lock() {
            receiver.take();
        }
        let worker = match self.inner.worker.lock() {
            Ok(mut w) => w.take(),
            Err(_) => None,
        };
        if let Some(worker) = worker {
            worker.abort();
            info!("command queue stopped");
        }
    }

    /// Queues `operation` and returns a handle to its result.
    pub fn enqueue<F, Fut, T>(&self, operation: F, label: &str) -> QueueHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job_label = label.to_string();
        let job = Job {
            label: label.to_string(),
            run: Box::pin(async move {
                // a panicking operation only fails its own handle
                let result = match AssertUnwindSafe(async move { operation().await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        error!("queue: {} panicked", job_label);
                        Err(anyhow!("{} panicked", job_label))
                    }
                };
                // the caller may have dropped its handle; that is fine
                let _ = tx.send(result);
            }),
        };

        let sent = match self.inner.sender.lock() {
            Ok(sender) => sender.as_ref().map(|s| s.send(job).is_ok()),
            Err(_) => None,
        };
        if sent != Some(true) {
            warn!("command queue stopped, dropping {}", label);
        }

        QueueHandle {
            label: label.to_string(),
            receiver: rx,
        }
    }

    async fn worker(mut receiver: mpsc::UnboundedReceiver<Job>, min_delay: Duration) {
        while let Some(job) = receiver.recv().await {
            trace!("queue: running {}", job.label);
            job.run.await;
            tokio::time::sleep(min_delay).await;
        }
    }
}
