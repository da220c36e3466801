//! Shared helpers for the executor integration tests.

#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[derive(Default)]
struct ObserverState {
    executed: usize,
    destroyed: usize,
    per_thread: HashMap<ThreadId, usize>,
}

#[derive(Default)]
struct ObserverInner {
    state: Mutex<ObserverState>,
    cond: Condvar,
}

impl ObserverInner {
    fn record_execution(&self) {
        let mut state = self.state.lock();
        state.executed += 1;
        *state.per_thread.entry(thread::current().id()).or_insert(0) += 1;
        drop(state);
        self.cond.notify_all();
    }

    fn record_destruction(&self) {
        self.state.lock().destroyed += 1;
        self.cond.notify_all();
    }
}

/// Counts executions and destructions of the task stubs it hands out, and
/// remembers which thread ran each one.
///
/// A stub's destruction fires when the closure is dropped: after running,
/// or without running when the shutdown drain destroys it.
#[derive(Clone, Default)]
pub struct Observer {
    inner: Arc<ObserverInner>,
}

struct StubGuard {
    inner: Arc<ObserverInner>,
}

impl Drop for StubGuard {
    fn drop(&mut self) {
        self.inner.record_destruction();
    }
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A counting task with no result.
    pub fn stub(&self) -> impl FnOnce() + Send + 'static {
        let guard = StubGuard {
            inner: self.inner.clone(),
        };
        move || guard.inner.record_execution()
    }

    /// A counting task that occupies its worker for `busy` first.
    pub fn sleeping_stub(&self, busy: Duration) -> impl FnOnce() + Send + 'static {
        let guard = StubGuard {
            inner: self.inner.clone(),
        };
        move || {
            thread::sleep(busy);
            guard.inner.record_execution()
        }
    }

    /// A counting task producing `value`.
    pub fn value_stub(&self, value: usize) -> impl FnOnce() -> usize + Send + 'static {
        let guard = StubGuard {
            inner: self.inner.clone(),
        };
        move || {
            guard.inner.record_execution();
            value
        }
    }

    pub fn execution_count(&self) -> usize {
        self.inner.state.lock().executed
    }

    pub fn destruction_count(&self) -> usize {
        self.inner.state.lock().destroyed
    }

    /// Thread identities that executed stubs, with per-thread tallies.
    pub fn execution_map(&self) -> HashMap<ThreadId, usize> {
        self.inner.state.lock().per_thread.clone()
    }

    pub fn wait_execution_count(&self, target: usize, timeout: Duration) -> bool {
        self.wait_counter(target, timeout, |state| state.executed)
    }

    pub fn wait_destruction_count(&self, target: usize, timeout: Duration) -> bool {
        self.wait_counter(target, timeout, |state| state.destroyed)
    }

    fn wait_counter<F>(&self, target: usize, timeout: Duration, counter: F) -> bool
    where
        F: Fn(&ObserverState) -> usize,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while counter(&state) < target {
            if self.inner.cond.wait_until(&mut state, deadline).timed_out() {
                return counter(&state) >= target;
            }
        }
        true
    }
}

/// A manually released barrier for parking pool workers inside a task.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the gate opens.
    pub fn wait(&self) {
        let (lock, cond) = &*self.inner;
        let mut open = lock.lock();
        while !*open {
            cond.wait(&mut open);
        }
    }

    /// Release every waiter, past and future.
    pub fn open(&self) {
        let (lock, cond) = &*self.inner;
        *lock.lock() = true;
        cond.notify_all();
    }
}
