//! Bounded-parallel work queue.
//!
//! [`WorkQueue`] runs a worker function over every distinct enqueued item on a
//! dedicated rayon pool. Workers may enqueue more items while running.
//!
//! Completion is tracked by a pending counter that starts at one: the extra
//! token stands for "the owner may still enqueue" and is released by
//! [`WorkQueue::wait_for_completion`]. Every accepted item adds one and every
//! finished item removes one; the queue is complete when the counter hits zero.
//!
//! Failures do not stop the queue. The first worker error (or panic) is
//! recorded, everything already admitted still runs, and the error is returned
//! from `wait_for_completion` once the queue has drained. Items admitted after
//! the failure was recorded only go through the bookkeeping.

use std::{
    any::Any,
    collections::HashSet,
    hash::Hash,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, trace};

/// Scheduler errors.
#[derive(Debug, Error)]
pub enum WorkError<E> {
    /// The first error returned by a worker.
    #[error("{0}")]
    Worker(E),

    /// A worker panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),

    /// `start` was called more than once.
    #[error("work queue already started")]
    AlreadyStarted,

    /// Items are waiting but no worker was registered.
    #[error("work queue has pending items but no worker was started")]
    NotStarted,

    /// The thread pool could not be created.
    #[error("failed to create worker pool: {0}")]
    Pool(String),
}

type WorkerFn<T, E> = dyn Fn(&WorkQueue<T, E>, T) -> Result<(), E> + Send + Sync;
type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

struct QueueState<T> {
    seen: HashSet<T>,
    /// Items accepted before `start`, with their admitted-before-fault flag.
    backlog: Vec<(T, bool)>,
}

struct Shared<T, E> {
    pool: rayon::ThreadPool,
    state: Mutex<QueueState<T>>,
    worker: OnceLock<Arc<WorkerFn<T, E>>>,
    progress: OnceLock<Box<ProgressFn>>,
    pending: AtomicUsize,
    processed: AtomicUsize,
    total: AtomicUsize,
    released: AtomicBool,
    faulted: AtomicBool,
    first_error: Mutex<Option<WorkError<E>>>,
    completed: Mutex<bool>,
    completion: Condvar,
}

/// Deduplicating work queue with a fixed concurrency cap.
///
/// `wait_for_completion` must not be called from inside a worker.
pub struct WorkQueue<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for WorkQueue<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> WorkQueue<T, E> {
    /// Number of finished items.
    pub fn processed(&self) -> usize {
        self.shared.processed.load(Ordering::SeqCst)
    }

    /// Number of distinct items accepted so far.
    pub fn total(&self) -> usize {
        self.shared.total.load(Ordering::SeqCst)
    }
}

impl<T, E> std::fmt::Debug for WorkQueue<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("threads", &self.shared.pool.current_num_threads())
            .field("processed", &self.processed())
            .field("total", &self.total())
            .finish()
    }
}

impl<T, E> WorkQueue<T, E>
where
    T: Eq + Hash + Clone + Send + 'static,
    E: Send + 'static,
{
    /// Create a queue running at most `parallelism` workers at once.
    pub fn new(parallelism: usize) -> Result<Self, WorkError<E>> {
        if parallelism == 0 {
            return Err(WorkError::Pool("parallelism must be at least 1".to_string()));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|index| format!("docweave-worker-{index}"))
            .build()
            .map_err(|e| WorkError::Pool(e.to_string()))?;

        Ok(Self {
            shared: Arc::new(Shared {
                pool,
                state: Mutex::new(QueueState {
                    seen: HashSet::new(),
                    backlog: Vec::new(),
                }),
                worker: OnceLock::new(),
                progress: OnceLock::new(),
                pending: AtomicUsize::new(1),
                processed: AtomicUsize::new(0),
                total: AtomicUsize::new(0),
                released: AtomicBool::new(false),
                faulted: AtomicBool::new(false),
                first_error: Mutex::new(None),
                completed: Mutex::new(false),
                completion: Condvar::new(),
            }),
        })
    }

    /// Report `(processed, total_seen)` after every finished item.
    #[must_use]
    pub fn with_progress(self, progress: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        if self.shared.progress.set(Box::new(progress)).is_err() {
            debug!("work queue progress callback already set");
        }
        self
    }

    /// Accept `item` unless it was seen before or the queue has completed.
    pub fn enqueue(&self, item: T) -> bool {
        let mut state = self.shared.state.lock();
        if state.seen.contains(&item) {
            return false;
        }

        // Never resurrect a queue whose counter already reached zero.
        let admitted = self
            .shared
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                (pending > 0).then_some(pending + 1)
            })
            .is_ok();
        if !admitted {
            trace!("work queue completed, rejecting item");
            return false;
        }

        state.seen.insert(item.clone());
        self.shared.total.fetch_add(1, Ordering::SeqCst);
        let clean = !self.shared.faulted.load(Ordering::SeqCst);

        match self.shared.worker.get() {
            Some(worker) => {
                let worker = Arc::clone(worker);
                drop(state);
                self.dispatch(item, clean, worker);
            }
            None => state.backlog.push((item, clean)),
        }
        true
    }

    /// Register the worker and dispatch everything enqueued so far.
    pub fn start(
        &self,
        worker: impl Fn(&WorkQueue<T, E>, T) -> Result<(), E> + Send + Sync + 'static,
    ) -> Result<(), WorkError<E>> {
        let worker: Arc<WorkerFn<T, E>> = Arc::new(worker);

        let backlog = {
            let mut state = self.shared.state.lock();
            if self.shared.worker.set(Arc::clone(&worker)).is_err() {
                return Err(WorkError::AlreadyStarted);
            }
            std::mem::take(&mut state.backlog)
        };

        debug!(
            items = backlog.len(),
            threads = self.shared.pool.current_num_threads(),
            "work queue started"
        );

        for (item, clean) in backlog {
            self.dispatch(item, clean, Arc::clone(&worker));
        }
        Ok(())
    }

    /// Block until every accepted item has finished, then report the first failure.
    pub fn wait_for_completion(&self) -> Result<(), WorkError<E>> {
        {
            let state = self.shared.state.lock();
            if self.shared.worker.get().is_none() && !state.backlog.is_empty() {
                return Err(WorkError::NotStarted);
            }
        }

        if !self.shared.released.swap(true, Ordering::SeqCst) {
            self.release_one();
        }

        let mut completed = self.shared.completed.lock();
        while !*completed {
            self.shared.completion.wait(&mut completed);
        }
        drop(completed);

        debug!(
            processed = self.processed(),
            total = self.total(),
            "work queue drained"
        );

        match self.shared.first_error.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn dispatch(&self, item: T, clean: bool, worker: Arc<WorkerFn<T, E>>) {
        let queue = self.clone();
        self.shared.pool.spawn(move || {
            queue.run(item, clean, worker.as_ref());
        });
    }

    fn run(&self, item: T, clean: bool, worker: &WorkerFn<T, E>) {
        if clean {
            match catch_unwind(AssertUnwindSafe(|| worker(self, item))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => self.record(WorkError::Worker(error)),
                Err(payload) => self.record(WorkError::Panicked(panic_message(payload))),
            }
        } else {
            trace!("skipping item admitted after a failure");
        }

        let processed = self.shared.processed.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total();
        if let Some(progress) = self.shared.progress.get() {
            progress(processed, total);
        }
        trace!(processed, total, "work item finished");

        self.release_one();
    }

    fn record(&self, error: WorkError<E>) {
        if self.shared.faulted.swap(true, Ordering::SeqCst) {
            debug!("suppressing worker failure after the first one");
            return;
        }
        *self.shared.first_error.lock() = Some(error);
    }

    fn release_one(&self) {
        if self.shared.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            let mut completed = self.shared.completed.lock();
            *completed = true;
            self.shared.completion.notify_all();
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
