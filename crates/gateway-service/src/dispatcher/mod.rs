//! Affinity dispatcher: runs work on a single owner context.
//!
//! Some resources may only be touched from one execution context. The
//! [`Dispatcher`] lets any number of concurrent tasks hand work to that
//! context and wait for the result:
//!
//! ```text
//! caller tasks ──submit──▶ bounded mpsc (FIFO) ──▶ owner thread ──▶ &mut R
//!      ▲                                               │
//!      └──────────────── oneshot reply ◀───────────────┘
//! ```
//!
//! - The owner is a dedicated OS thread spawned by [`Dispatcher::bind`]. The
//!   resource is built on that thread by a factory and never leaves it, so
//!   `R` does not need to be `Send`.
//! - Items execute in enqueue order, one at a time. Mutual exclusion is
//!   structural: only the owner thread holds `&mut R`.
//! - An item that returns `Err` or panics fails only its own caller with
//!   `ExecutionFailed`; the owner loop keeps going.
//! - A full queue applies backpressure. Waiting callers are admitted in
//!   arrival order.
//!
//! # Lifecycle
//!
//! ```text
//! Unbound ──bind──▶ Bound ──unbind──▶ Draining ──(queue empty)──▶ Stopped
//!                     ▲                                              │
//!                     └──────────────────bind────────────────────────┘
//! ```
//!
//! Only `Bound` accepts work. Every other state rejects submissions with
//! `Unavailable` without blocking.

pub mod monitor;

use crate::observability::metrics::{record_dispatch, record_owner_execution};
use monitor::{ItemOutcome, QueueMonitor};
use std::any::Any;
use std::error::Error as StdError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default bounded queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Boxed error carried by `DispatchError::ExecutionFailed`.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Dispatcher error type.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No owner is bound, or the dispatcher is draining or stopped.
    #[error("No owner context is available")]
    Unavailable,

    /// `bind` was called while an owner is bound or draining.
    #[error("An owner context is already bound")]
    AlreadyBound,

    /// The owner ran the item and it failed. The cause is passed through
    /// unmodified and can be downcast by the caller.
    #[error("Owner execution failed: {0}")]
    ExecutionFailed(#[source] BoxError),

    /// The caller's deadline passed before the owner produced a result.
    #[error("Owner did not respond within {0:?}")]
    TimedOut(Duration),

    /// The owner thread could not be started.
    #[error("Failed to start owner thread: {0}")]
    OwnerSpawn(String),
}

/// Cause attached to `ExecutionFailed` when the work panicked.
#[derive(Debug, Error)]
#[error("owner panicked while executing '{operation}': {message}")]
pub struct OwnerPanic {
    pub operation: &'static str,
    pub message: String,
}

/// Dispatcher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Unbound,
    Bound,
    Draining,
    Stopped,
}

impl DispatcherState {
    /// Returns the state as a string for health output and log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DispatcherState::Unbound => "unbound",
            DispatcherState::Bound => "bound",
            DispatcherState::Draining => "draining",
            DispatcherState::Stopped => "stopped",
        }
    }
}

type Job<R> = Box<dyn FnOnce(&mut R) -> ItemOutcome + Send + 'static>;

/// One unit of work waiting for the owner.
struct WorkItem<R> {
    operation: &'static str,
    enqueued_at: Instant,
    job: Job<R>,
}

/// Binding-specific handles, present only while an owner exists.
struct Binding<R> {
    sender: mpsc::Sender<WorkItem<R>>,
    draining: CancellationToken,
    done: oneshot::Receiver<()>,
}

struct Inner<R> {
    state: DispatcherState,
    binding: Option<Binding<R>>,
}

/// Serializes work onto a single owner context holding an `R`.
///
/// Shared by reference (typically `Arc<Dispatcher<R>>`); all methods take
/// `&self`.
pub struct Dispatcher<R> {
    name: String,
    capacity: usize,
    inner: Mutex<Inner<R>>,
    monitor: Arc<QueueMonitor>,
}

impl<R: 'static> std::fmt::Debug for Dispatcher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("state", &self.state())
            .field("queue_depth", &self.queue_depth())
            .finish()
    }
}

impl<R: 'static> Dispatcher<R> {
    /// Create an unbound dispatcher.
    ///
    /// `name` labels the owner thread and log output. A `capacity` of zero is
    /// raised to one.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let name = name.into();
        let monitor = Arc::new(QueueMonitor::new(name.clone()));
        Self {
            name,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                state: DispatcherState::Unbound,
                binding: None,
            }),
            monitor,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> DispatcherState {
        self.lock().state
    }

    /// Whether submissions are currently accepted.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.state() == DispatcherState::Bound
    }

    /// Items enqueued but not yet taken by the owner.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.monitor.current_depth()
    }

    #[must_use]
    pub fn monitor(&self) -> &QueueMonitor {
        &self.monitor
    }

    /// Bind an owner context.
    ///
    /// Spawns the owner thread and builds the resource on it by calling
    /// `factory`. Returns once the thread is running; items submitted from
    /// now on queue up behind the factory call.
    ///
    /// # Errors
    ///
    /// - `AlreadyBound` if an owner is bound or still draining.
    /// - `OwnerSpawn` if the OS refuses to create the thread.
    pub fn bind<F>(&self, factory: F) -> Result<(), DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let mut inner = self.lock();
        match inner.state {
            DispatcherState::Bound | DispatcherState::Draining => {
                return Err(DispatchError::AlreadyBound);
            }
            DispatcherState::Unbound | DispatcherState::Stopped => {}
        }

        let (sender, receiver) = mpsc::channel(self.capacity);
        let (done_tx, done_rx) = oneshot::channel();
        let monitor = Arc::clone(&self.monitor);
        let owner_name = self.name.clone();

        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                run_owner(&owner_name, factory, receiver, &monitor);
                let _ = done_tx.send(());
            })
            .map_err(|e| DispatchError::OwnerSpawn(e.to_string()))?;

        inner.binding = Some(Binding {
            sender,
            draining: CancellationToken::new(),
            done: done_rx,
        });
        inner.state = DispatcherState::Bound;

        info!(
            target: "gateway.dispatcher",
            owner = %self.name,
            capacity = self.capacity,
            "Owner context bound"
        );

        Ok(())
    }

    /// Stop accepting work, let queued and in-flight items finish, then
    /// release the owner.
    ///
    /// Returns once the owner thread has exited. Calling this when nothing is
    /// bound (or while another caller is already draining) is a no-op.
    pub async fn unbind(&self) {
        let binding = {
            let mut inner = self.lock();
            if inner.state != DispatcherState::Bound {
                debug!(
                    target: "gateway.dispatcher",
                    owner = %self.name,
                    state = inner.state.as_str(),
                    "Unbind ignored"
                );
                return;
            }
            inner.state = DispatcherState::Draining;
            inner.binding.take()
        };

        info!(
            target: "gateway.dispatcher",
            owner = %self.name,
            queue_depth = self.queue_depth(),
            "Draining owner context"
        );

        if let Some(binding) = binding {
            binding.draining.cancel();
            drop(binding.sender);
            // Err means the owner thread died without signalling; it is gone
            // either way.
            let _ = binding.done.await;
        }

        self.lock().state = DispatcherState::Stopped;

        info!(
            target: "gateway.dispatcher",
            owner = %self.name,
            processed = self.monitor.items_processed(),
            "Owner context stopped"
        );
    }

    /// Run `work` on the owner and wait for its result without a deadline.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::submit_with_deadline`].
    pub async fn submit<T, E, F>(&self, operation: &'static str, work: F) -> Result<T, DispatchError>
    where
        F: FnOnce(&mut R) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + 'static,
    {
        self.submit_with_deadline(operation, None, work).await
    }

    /// Run `work` on the owner and wait for its result.
    ///
    /// With `Some(deadline)` the wait (queueing plus execution) is bounded; an
    /// item whose caller gave up is skipped if the owner has not started it.
    ///
    /// # Errors
    ///
    /// - `Unavailable` immediately if the dispatcher is not `Bound`, or if
    ///   the owner went away before replying.
    /// - `ExecutionFailed` if `work` returned `Err` or panicked.
    /// - `TimedOut` if the deadline passed first.
    #[instrument(skip_all, name = "gateway.dispatcher.submit", fields(operation = operation))]
    pub async fn submit_with_deadline<T, E, F>(
        &self,
        operation: &'static str,
        deadline: Option<Duration>,
        work: F,
    ) -> Result<T, DispatchError>
    where
        F: FnOnce(&mut R) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let started = Instant::now();
        let (sender, draining) = match self.lock().binding.as_ref() {
            Some(binding) => (binding.sender.clone(), binding.draining.clone()),
            None => {
                record_dispatch(operation, "unavailable", started.elapsed());
                return Err(DispatchError::Unavailable);
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel::<Result<T, DispatchError>>();
        let job: Job<R> = Box::new(move |resource: &mut R| execute(operation, work, resource, reply_tx));

        let rendezvous = async move {
            let permit = tokio::select! {
                biased;
                () = draining.cancelled() => return Err(DispatchError::Unavailable),
                permit = sender.reserve() => permit.map_err(|_| DispatchError::Unavailable)?,
            };
            if draining.is_cancelled() {
                return Err(DispatchError::Unavailable);
            }

            self.monitor.record_enqueue();
            permit.send(WorkItem {
                operation,
                enqueued_at: Instant::now(),
                job,
            });
            drop(sender);

            reply_rx.await.map_err(|_| DispatchError::Unavailable)?
        };

        let result = match deadline {
            Some(limit) => tokio::time::timeout(limit, rendezvous)
                .await
                .unwrap_or(Err(DispatchError::TimedOut(limit))),
            None => rendezvous.await,
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(DispatchError::Unavailable) => "unavailable",
            Err(DispatchError::TimedOut(_)) => {
                warn!(
                    target: "gateway.dispatcher",
                    owner = %self.name,
                    operation = operation,
                    "Caller deadline elapsed before owner replied"
                );
                "timeout"
            }
            Err(_) => "execution_failed",
        };
        record_dispatch(operation, outcome, started.elapsed());

        result
    }

    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Execute one item on the owner and deliver the result to its caller.
fn execute<R, T, E, F>(
    operation: &'static str,
    work: F,
    resource: &mut R,
    reply_tx: oneshot::Sender<Result<T, DispatchError>>,
) -> ItemOutcome
where
    F: FnOnce(&mut R) -> Result<T, E>,
    E: Into<BoxError>,
{
    if reply_tx.is_closed() {
        return ItemOutcome::Abandoned;
    }

    let (reply, outcome) = match catch_unwind(AssertUnwindSafe(|| work(resource))) {
        Ok(Ok(value)) => (Ok(value), ItemOutcome::Completed),
        Ok(Err(cause)) => (
            Err(DispatchError::ExecutionFailed(cause.into())),
            ItemOutcome::Failed,
        ),
        Err(payload) => {
            let panic = OwnerPanic {
                operation,
                message: panic_message(payload.as_ref()),
            };
            error!(
                target: "gateway.dispatcher",
                operation = operation,
                error = %panic,
                "Work item panicked on owner thread"
            );
            (
                Err(DispatchError::ExecutionFailed(Box::new(panic))),
                ItemOutcome::Panicked,
            )
        }
    };

    // The caller may have timed out while the item ran.
    let _ = reply_tx.send(reply);
    outcome
}

/// Owner thread body: build the resource, then drain the queue until every
/// sender is gone.
fn run_owner<R, F>(
    name: &str,
    factory: F,
    mut receiver: mpsc::Receiver<WorkItem<R>>,
    monitor: &QueueMonitor,
) where
    F: FnOnce() -> R,
{
    let mut resource = match catch_unwind(AssertUnwindSafe(factory)) {
        Ok(resource) => resource,
        Err(payload) => {
            error!(
                target: "gateway.dispatcher",
                owner = %name,
                error = %panic_message(payload.as_ref()),
                "Owner resource factory panicked; owner context unavailable"
            );
            return;
        }
    };

    debug!(target: "gateway.dispatcher", owner = %name, "Owner loop started");

    while let Some(item) = receiver.blocking_recv() {
        monitor.record_dequeue();
        let queue_wait = item.enqueued_at.elapsed();
        let started = Instant::now();

        let outcome = (item.job)(&mut resource);
        monitor.record_outcome(outcome);

        debug!(
            target: "gateway.dispatcher",
            owner = %name,
            operation = item.operation,
            outcome = outcome.as_str(),
            queue_wait_ms = queue_wait.as_millis(),
            execution_ms = started.elapsed().as_millis(),
            "Work item finished"
        );
        record_owner_execution(
            item.operation,
            outcome.as_str(),
            queue_wait,
            started.elapsed(),
        );
    }

    debug!(target: "gateway.dispatcher", owner = %name, "Owner loop exited");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
