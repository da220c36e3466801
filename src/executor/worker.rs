//! Worker slots and the worker thread loop.
//!
//! A slot is a persistent identity: its queue, mutex and condition variable
//! outlive any particular OS thread. The attached thread comes and goes —
//! it exits after sitting idle for the pool's `max_idle_time` and a fresh
//! one is spawned when placement next selects the slot.

use super::task::Task;
use super::thread_pool::PoolCore;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Per-slot state guarded by the slot mutex.
pub(crate) struct SlotState {
    /// Tasks waiting to run on this slot, in FIFO order
    pub(crate) queue: VecDeque<Task>,
    /// True iff an OS thread is currently attached to the slot
    pub(crate) active: bool,
    /// Handle of the attached (or most recently exited) thread
    pub(crate) join: Option<JoinHandle<()>>,
}

/// A worker slot: queue + mutex + condition variable.
pub(crate) struct WorkerSlot {
    pub(crate) state: Mutex<SlotState>,
    pub(crate) cond: Condvar,
}

impl WorkerSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                queue: VecDeque::new(),
                active: false,
                join: None,
            }),
            cond: Condvar::new(),
        }
    }
}

/// Identity of the worker currently running on this thread, if any.
///
/// Set on worker entry and cleared on exit; the self-enqueue placement rule
/// compares the pool field against the dispatching pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorkerToken {
    pool: usize,
    pub(crate) index: usize,
}

impl WorkerToken {
    pub(crate) fn belongs_to(&self, core: &Arc<PoolCore>) -> bool {
        self.pool == Arc::as_ptr(core) as usize
    }
}

thread_local! {
    static CURRENT_WORKER: Cell<Option<WorkerToken>> = const { Cell::new(None) };
}

pub(crate) fn current_worker() -> Option<WorkerToken> {
    CURRENT_WORKER.with(Cell::get)
}

struct TokenGuard;

impl TokenGuard {
    fn install(core: &Arc<PoolCore>, index: usize) -> Self {
        CURRENT_WORKER.with(|cell| {
            cell.set(Some(WorkerToken {
                pool: Arc::as_ptr(core) as usize,
                index,
            }))
        });
        TokenGuard
    }
}

impl Drop for TokenGuard {
    fn drop(&mut self) {
        CURRENT_WORKER.with(|cell| cell.set(None));
    }
}

/// Main loop for the thread attached to `core.slots[index]`.
pub(crate) fn worker_main(core: Arc<PoolCore>, index: usize) {
    let _token = TokenGuard::install(&core, index);
    let slot = &core.slots[index];
    let mut state = slot.state.lock();

    loop {
        if core.shutdown.load(Ordering::Acquire) {
            drain_on_shutdown(&core, &mut state);
            return;
        }

        if let Some(task) = state.queue.pop_front() {
            // The mutex is never held across user code.
            MutexGuard::unlocked(&mut state, || run_task(&core, task));
            continue;
        }

        // Queue empty and not shutting down: advertise as idle and wait.
        // Lock order is always slot-then-idle; the dispatcher releases the
        // idle lock before touching any slot, so this cannot deadlock.
        core.idle.lock().insert(index);
        let timed_out = slot
            .cond
            .wait_for(&mut state, core.max_idle_time)
            .timed_out();
        core.idle.lock().remove(&index);

        if timed_out && state.queue.is_empty() && !core.shutdown.load(Ordering::Acquire) {
            // Idle too long: detach. The flag flips under the slot mutex,
            // so a dispatcher deciding whether to respawn sees either an
            // attached thread or a dormant slot, never something between.
            state.active = false;
            return;
        }
    }
}

fn run_task(core: &PoolCore, task: Task) {
    let start = Instant::now();
    let outcome = core.panic_handler.run(&core.name, || task.run());
    core.metrics
        .record_task_execution(start.elapsed().as_nanos() as u64);
    if outcome.is_err() {
        core.metrics.record_task_panic();
    }
}

/// Destroy every queued task without running it. Result-bearing tasks
/// break their channels as they drop.
fn drain_on_shutdown(core: &PoolCore, state: &mut MutexGuard<'_, SlotState>) {
    let orphans = std::mem::take(&mut state.queue);
    state.active = false;
    core.metrics.record_tasks_dropped(orphans.len() as u64);
    MutexGuard::unlocked(state, || drop(orphans));
}
