//! Callback-style access to the coordinator.
//!
//! Lookups run on the tokio runtime; their results travel back through a
//! [`DeliveryQueue`] owned by the calling context (typically a UI loop), and
//! callbacks run wherever that queue is drained. The hop between the two is
//! explicit: nothing is delivered until the owner dispatches.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, trace};

use crate::domain::entities::LoadedImage;
use crate::domain::errors::FetchResult;

use super::coordinator::FetchCoordinator;

type Callback = Box<dyn FnOnce(FetchResult<LoadedImage>) + Send + 'static>;

/// A finished lookup waiting to be handed to its callback.
struct Delivery {
    identifier: String,
    result: FetchResult<LoadedImage>,
    callback: Callback,
    detached: Arc<AtomicBool>,
}

/// Starts lookups off the calling context.
#[derive(Clone)]
pub struct ImageRequester {
    coordinator: FetchCoordinator,
    delivery_tx: mpsc::UnboundedSender<Delivery>,
    runtime: Handle,
}

impl std::fmt::Debug for ImageRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRequester")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl ImageRequester {
    /// Creates a requester that runs lookups on `runtime`, paired with the
    /// queue its results are delivered to.
    #[must_use]
    pub fn new(coordinator: FetchCoordinator, runtime: Handle) -> (Self, DeliveryQueue) {
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        (
            Self {
                coordinator,
                delivery_tx,
                runtime,
            },
            DeliveryQueue { rx: delivery_rx },
        )
    }

    /// Resolves `identifier` in the background and queues `on_result` for
    /// the [`DeliveryQueue`]. The callback runs at most once.
    pub fn request<F>(&self, identifier: impl Into<String>, on_result: F) -> RequestHandle
    where
        F: FnOnce(FetchResult<LoadedImage>) + Send + 'static,
    {
        let identifier = identifier.into();
        let detached = Arc::new(AtomicBool::new(false));

        let coordinator = self.coordinator.clone();
        let delivery_tx = self.delivery_tx.clone();
        let task_detached = Arc::clone(&detached);
        let task = self.runtime.spawn(async move {
            let result = coordinator.resolve(&identifier).await;
            if task_detached.load(Ordering::Acquire) {
                trace!(identifier = %identifier, "Dropping result of detached request");
                return;
            }
            let delivery = Delivery {
                identifier,
                result,
                callback: Box::new(on_result),
                detached: task_detached,
            };
            if delivery_tx.send(delivery).is_err() {
                debug!("Delivery queue closed, dropping image result");
            }
        });

        RequestHandle {
            detached,
            task: task.abort_handle(),
        }
    }

    /// Resolves `identifier` as a task the caller can await or abort.
    pub fn fetch(&self, identifier: impl Into<String>) -> JoinHandle<FetchResult<LoadedImage>> {
        let identifier = identifier.into();
        let coordinator = self.coordinator.clone();
        self.runtime
            .spawn(async move { coordinator.resolve(&identifier).await })
    }

    /// Warms the caches for several identifiers without callbacks.
    pub fn prefetch<I, S>(&self, identifiers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for identifier in identifiers {
            let identifier = identifier.into();
            let coordinator = self.coordinator.clone();
            self.runtime.spawn(async move {
                if let Err(e) = coordinator.resolve(&identifier).await {
                    debug!(identifier = %identifier, error = %e, "Prefetch failed");
                }
            });
        }
    }

    /// Returns the coordinator behind this requester.
    #[must_use]
    pub const fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }
}

/// Caller-side handle for one [`ImageRequester::request`].
///
/// Dropping the handle leaves the request running.
#[derive(Debug)]
pub struct RequestHandle {
    detached: Arc<AtomicBool>,
    task: AbortHandle,
}

impl RequestHandle {
    /// Withdraws interest: the callback will not run, even if the result is
    /// already queued. A download shared with other callers keeps going and
    /// still fills the caches.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::Release);
        self.task.abort();
    }

    /// Returns true once [`RequestHandle::detach`] has been called.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Returns true once the lookup finished (or was aborted).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Receives finished lookups and runs their callbacks on the draining thread.
pub struct DeliveryQueue {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("pending", &self.rx.len())
            .finish()
    }
}

impl DeliveryQueue {
    /// Runs callbacks for every result already queued, without waiting.
    /// Returns the number of callbacks invoked.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut invoked = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            if deliver(delivery) {
                invoked += 1;
            }
        }
        invoked
    }

    /// Waits for the next result and runs its callback (or drops it if the
    /// request was detached). Returns false once every requester is gone.
    pub async fn dispatch_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(delivery) => {
                deliver(delivery);
                true
            }
            None => false,
        }
    }

    /// Blocking form of [`DeliveryQueue::dispatch_next`] for threads outside
    /// the runtime.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_dispatch_next(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(delivery) => {
                deliver(delivery);
                true
            }
            None => false,
        }
    }

    /// Returns the number of results waiting for dispatch.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

fn deliver(delivery: Delivery) -> bool {
    if delivery.detached.load(Ordering::Acquire) {
        trace!(identifier = %delivery.identifier, "Skipping callback of detached request");
        return false;
    }
    (delivery.callback)(delivery.result);
    true
}
