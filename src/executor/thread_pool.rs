//! The thread-pool executor.
//!
//! A fixed roster of worker slots (see [`worker`](super::worker)) fed by a
//! three-rule placement algorithm:
//!
//! 1. prefer a worker that is idle right now,
//! 2. otherwise, a worker enqueuing into its own pool keeps the task local,
//! 3. otherwise, round-robin across the roster.
//!
//! Threads are spawned lazily when placement selects a dormant slot and
//! reclaimed after `max_idle_time` of inactivity, so the pool breathes
//! between zero and `max_concurrency_level` threads with load.

use super::panic_handler::{payload_message, PanicHandler};
use super::result::{result_channel, ResultReceiver};
use super::task::{ResumeHandle, Task};
use super::worker::{self, WorkerSlot};
use super::Executor;
use crate::config::Config;
use crate::error::{EnqueueError, Error, Result};
use crate::telemetry::{Metrics, MetricsSnapshot};
use crate::util::CachePadded;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Shared pool state; worker threads hold an `Arc` to it.
pub(crate) struct PoolCore {
    pub(crate) name: String,
    pub(crate) max_idle_time: Duration,
    stack_size: Option<usize>,
    pub(crate) slots: Box<[CachePadded<WorkerSlot>]>,
    /// Indices of workers currently blocked on their condition variable.
    /// Guarded separately from the slots; lock order is slot-then-idle.
    pub(crate) idle: Mutex<BTreeSet<usize>>,
    round_robin: AtomicUsize,
    pub(crate) shutdown: AtomicBool,
    pub(crate) panic_handler: PanicHandler,
    pub(crate) metrics: Metrics,
}

/// Why a task could not be handed to a worker queue. Carries the task back
/// so handle-based entry points can return it to the caller.
enum PlaceError {
    Shutdown(Task),
    Spawn(Task, std::io::Error),
}

impl PlaceError {
    fn into_parts(self) -> (Task, Option<std::io::Error>) {
        match self {
            PlaceError::Shutdown(task) => (task, None),
            PlaceError::Spawn(task, source) => (task, Some(source)),
        }
    }

    fn into_error(self) -> Error {
        match self {
            PlaceError::Shutdown(_) => Error::Shutdown,
            PlaceError::Spawn(_, source) => Error::Spawn(source),
        }
    }
}

fn into_handle(task: Task) -> ResumeHandle {
    match task {
        Task::Resume(handle) => handle,
        Task::Invoke(_) => unreachable!("callable task in handle path"),
    }
}

/// A dynamically-sized pool of worker threads executing opaque callables
/// and resumable handles.
///
/// Dropping the executor forces [`shutdown`](ThreadPoolExecutor::shutdown)
/// if it was not already requested.
pub struct ThreadPoolExecutor {
    core: Arc<PoolCore>,
}

impl ThreadPoolExecutor {
    /// Create a pool with the given diagnostic name, slot count and worker
    /// idle timeout.
    pub fn new<S: Into<String>>(
        name: S,
        max_workers: usize,
        max_idle_time: Duration,
    ) -> Result<Self> {
        Self::with_config(
            Config::builder()
                .name(name)
                .max_workers(max_workers)
                .max_idle_time(max_idle_time)
                .build()?,
        )
    }

    /// Create a pool from a full [`Config`].
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;

        let worker_count = config.worker_count();
        let slots: Vec<CachePadded<WorkerSlot>> = (0..worker_count)
            .map(|_| CachePadded::new(WorkerSlot::new()))
            .collect();

        Ok(Self {
            core: Arc::new(PoolCore {
                name: config.name,
                max_idle_time: config.max_idle_time,
                stack_size: config.stack_size,
                slots: slots.into_boxed_slice(),
                idle: Mutex::new(BTreeSet::new()),
                round_robin: AtomicUsize::new(0),
                shutdown: AtomicBool::new(false),
                panic_handler: PanicHandler::new(config.panic_strategy),
                metrics: Metrics::new(),
            }),
        })
    }

    /// The name captured at construction.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The fixed worker slot count.
    pub fn max_concurrency_level(&self) -> usize {
        self.core.slots.len()
    }

    /// True once the shutdown transition has happened.
    pub fn shutdown_requested(&self) -> bool {
        self.core.shutdown.load(Ordering::SeqCst)
    }

    /// Run a callable on the pool, discarding its output. Panics escaping
    /// the callable go to the pool's panic sink; the worker survives.
    pub fn post<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.place(Task::invoke(f)).map_err(PlaceError::into_error)
    }

    /// Run a callable on the pool and hand its value (or captured panic)
    /// back through a one-shot result channel.
    pub fn submit<F, T>(&self, f: F) -> Result<ResultReceiver<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (promise, receiver) = result_channel();

        let wrapped = move || match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => promise.fulfill(value),
            Err(payload) => promise.fail(Error::Panicked(payload_message(payload.as_ref()))),
        };

        self.place(Task::invoke(wrapped))
            .map_err(PlaceError::into_error)?;
        Ok(receiver)
    }

    /// Post an ordered batch. Each task is placed independently; acceptance
    /// is checked once up front, so after shutdown nothing is placed.
    pub fn bulk_post<F>(&self, tasks: Vec<F>) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shutdown_requested() {
            return Err(Error::Shutdown);
        }

        for f in tasks {
            self.place(Task::invoke(f)).map_err(PlaceError::into_error)?;
        }
        Ok(())
    }

    /// Submit an ordered batch; the returned receivers match the input
    /// order and length.
    pub fn bulk_submit<F, T>(&self, tasks: Vec<F>) -> Result<Vec<ResultReceiver<T>>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.shutdown_requested() {
            return Err(Error::Shutdown);
        }

        let mut receivers = Vec::with_capacity(tasks.len());
        for f in tasks {
            receivers.push(self.submit(f)?);
        }
        Ok(receivers)
    }

    /// Enqueue a resumable handle. On rejection the handle is returned to
    /// the caller inside the error.
    pub fn enqueue(
        &self,
        handle: ResumeHandle,
    ) -> std::result::Result<(), EnqueueError<ResumeHandle>> {
        match self.place(Task::Resume(handle)) {
            Ok(()) => Ok(()),
            Err(err) => {
                let (task, source) = err.into_parts();
                let handle = into_handle(task);
                Err(match source {
                    None => EnqueueError::Shutdown(handle),
                    Some(source) => EnqueueError::Spawn {
                        rejected: handle,
                        source,
                    },
                })
            }
        }
    }

    /// Enqueue a batch of resumable handles. On rejection every handle not
    /// yet enqueued travels back inside the error.
    pub fn enqueue_many(
        &self,
        handles: Vec<ResumeHandle>,
    ) -> std::result::Result<(), EnqueueError<Vec<ResumeHandle>>> {
        if self.shutdown_requested() {
            return Err(EnqueueError::Shutdown(handles));
        }

        let mut pending = handles.into_iter();
        while let Some(handle) = pending.next() {
            if let Err(err) = self.place(Task::Resume(handle)) {
                let (task, source) = err.into_parts();
                let mut rejected = vec![into_handle(task)];
                rejected.extend(pending);
                return Err(match source {
                    None => EnqueueError::Shutdown(rejected),
                    Some(source) => EnqueueError::Spawn { rejected, source },
                });
            }
        }
        Ok(())
    }

    /// Shut the pool down: wake every worker, join every thread, destroy
    /// every task that never started. Idempotent; only the first caller
    /// does the work, and it blocks until the pool is quiesced.
    ///
    /// Must not be called from a task running on this pool; the caller
    /// would join its own thread.
    pub fn shutdown(&self) {
        if self.core.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        // Signal under the slot mutex: a worker that checked the flag but
        // has not started waiting yet still holds its mutex, so the notify
        // below cannot slip into that window and get lost.
        for slot in self.core.slots.iter() {
            let _state = slot.state.lock();
            slot.cond.notify_all();
        }

        for (index, slot) in self.core.slots.iter().enumerate() {
            let join = slot.state.lock().join.take();
            if let Some(handle) = join {
                if handle.join().is_err() {
                    eprintln!(
                        "karma: worker {index} of pool \"{}\" died outside task execution",
                        self.core.name
                    );
                }
            }
        }

        // Workers drain their own queues on the way out; this pass catches
        // tasks a racing caller slipped in after a worker had already gone.
        for slot in self.core.slots.iter() {
            let orphans = {
                let mut state = slot.state.lock();
                state.active = false;
                std::mem::take(&mut state.queue)
            };
            self.core.metrics.record_tasks_dropped(orphans.len() as u64);
            drop(orphans);
        }

        self.core.idle.lock().clear();
    }

    /// Snapshot of the pool's telemetry counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }

    /// Apply the placement rules and hand the task to a worker queue.
    fn place(&self, task: Task) -> std::result::Result<(), PlaceError> {
        let core = &self.core;

        if core.shutdown.load(Ordering::Acquire) {
            return Err(PlaceError::Shutdown(task));
        }

        // Rule 1: a worker waiting right now. Take the lowest index and
        // release the idle lock before touching the slot.
        let idle_choice = core.idle.lock().pop_first();
        if let Some(index) = idle_choice {
            return self.push_task(index, task, true);
        }

        // Rule 2: recursive submission from one of our own workers stays
        // on the calling worker; it will see the task on its next loop
        // iteration, so no signal is needed.
        if let Some(token) = worker::current_worker() {
            if token.belongs_to(core) {
                return self.push_task(token.index, task, false);
            }
        }

        // Rule 3: round-robin.
        let index = core.round_robin.fetch_add(1, Ordering::Relaxed) % core.slots.len();
        self.push_task(index, task, true)
    }

    /// Push into one slot's queue, respawning its thread if the slot is
    /// dormant. The shutdown flag is re-checked under the slot mutex: the
    /// shutdown drain also runs under it, so a racing enqueue either sees
    /// the flag here or its task is picked up by the drain.
    fn push_task(
        &self,
        index: usize,
        task: Task,
        signal: bool,
    ) -> std::result::Result<(), PlaceError> {
        let core = &self.core;
        let slot = &core.slots[index];
        let mut state = slot.state.lock();

        if core.shutdown.load(Ordering::Acquire) {
            return Err(PlaceError::Shutdown(task));
        }

        if !state.active {
            // Dormant slot: the previous thread (if any) has already
            // flipped `active` off under this mutex and will not touch the
            // slot again, so joining it here is deadlock-free and brief.
            if let Some(old) = state.join.take() {
                let _ = old.join();
            }

            let thread_core = Arc::clone(core);
            let builder = self.worker_thread_builder(index);
            match builder.spawn(move || worker::worker_main(thread_core, index)) {
                Ok(handle) => {
                    state.active = true;
                    state.join = Some(handle);
                    core.metrics.record_thread_spawned();
                }
                Err(source) => return Err(PlaceError::Spawn(task, source)),
            }
        }

        state.queue.push_back(task);
        if signal {
            slot.cond.notify_one();
        }
        Ok(())
    }

    fn worker_thread_builder(&self, index: usize) -> thread::Builder {
        // Thread names may not contain interior nul bytes; the pool name is
        // an arbitrary string, so filter rather than reject.
        let base: String = self.core.name.chars().filter(|c| *c != '\0').collect();
        let mut builder = thread::Builder::new().name(format!("{base}-{index}"));

        if let Some(stack_size) = self.core.stack_size {
            builder = builder.stack_size(stack_size);
        }
        builder
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("name", &self.core.name)
            .field("max_concurrency_level", &self.core.slots.len())
            .field("max_idle_time", &self.core.max_idle_time)
            .field("shutdown_requested", &self.shutdown_requested())
            .finish()
    }
}

impl Executor for ThreadPoolExecutor {
    fn name(&self) -> &str {
        ThreadPoolExecutor::name(self)
    }

    fn max_concurrency_level(&self) -> usize {
        ThreadPoolExecutor::max_concurrency_level(self)
    }

    fn enqueue(
        &self,
        handle: ResumeHandle,
    ) -> std::result::Result<(), EnqueueError<ResumeHandle>> {
        ThreadPoolExecutor::enqueue(self, handle)
    }

    fn enqueue_many(
        &self,
        handles: Vec<ResumeHandle>,
    ) -> std::result::Result<(), EnqueueError<Vec<ResumeHandle>>> {
        ThreadPoolExecutor::enqueue_many(self, handles)
    }

    fn shutdown(&self) {
        ThreadPoolExecutor::shutdown(self)
    }

    fn shutdown_requested(&self) -> bool {
        ThreadPoolExecutor::shutdown_requested(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_invalid_construction() {
        assert!(ThreadPoolExecutor::new("pool", 0, Duration::from_secs(1)).is_err());
        assert!(ThreadPoolExecutor::new("pool", 1, Duration::ZERO).is_err());
    }

    #[test]
    fn test_debug_format_mentions_name() {
        let pool = ThreadPoolExecutor::new("debug-pool", 2, Duration::from_secs(5)).unwrap();
        let rendered = format!("{pool:?}");
        assert!(rendered.contains("debug-pool"));
        pool.shutdown();
    }

    #[test]
    fn test_executor_trait_object() {
        let pool: Arc<dyn Executor> =
            Arc::new(ThreadPoolExecutor::new("trait-pool", 2, Duration::from_secs(5)).unwrap());

        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        pool.enqueue(ResumeHandle::new(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        while hits.load(Ordering::SeqCst) == 0 {
            thread::yield_now();
        }

        assert_eq!(pool.name(), "trait-pool");
        assert_eq!(pool.max_concurrency_level(), 2);
        pool.shutdown();
        assert!(pool.shutdown_requested());
    }

    #[test]
    fn test_drop_forces_shutdown() {
        let pool = ThreadPoolExecutor::new("drop-pool", 1, Duration::from_secs(60)).unwrap();
        let receiver = pool.submit(|| 11u32).unwrap();
        assert_eq!(receiver.get().unwrap(), 11);
        drop(pool);
    }

    #[test]
    fn test_post_panic_does_not_kill_worker() {
        let pool = ThreadPoolExecutor::with_config(
            Config::builder()
                .name("panicky")
                .max_workers(1)
                .max_idle_time(Duration::from_secs(10))
                .panic_strategy(crate::executor::PanicStrategy::Isolate)
                .build()
                .unwrap(),
        )
        .unwrap();

        pool.post(|| panic!("ouch")).unwrap();

        // The same (sole) worker must still be able to run this.
        let receiver = pool.submit(|| 5u32).unwrap();
        assert_eq!(receiver.get().unwrap(), 5);
        pool.shutdown();
    }
}
