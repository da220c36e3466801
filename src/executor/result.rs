//! One-shot result channels connecting a task to its waiter.
//!
//! A channel has exactly one producer (the executing task) and at most one
//! consumer. It moves through a small state machine: pending, then ready or
//! failed, then taken. If the producer half is destroyed before it delivers
//! anything the channel fails with [`Error::BrokenTask`]; this is how tasks
//! drained at shutdown report back to their waiters.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Consumer-visible state of a result channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    /// The task has not produced anything yet
    Pending,
    /// A value is waiting to be taken
    Ready,
    /// The task failed (panic or broken task)
    Failed,
}

enum State<T> {
    Pending,
    Ready(T),
    Failed(Error),
    Taken,
}

struct Channel<T> {
    state: Mutex<State<T>>,
    cond: Condvar,
}

impl<T> Channel<T> {
    fn complete(&self, next: State<T>) {
        let mut state = self.state.lock();
        // One-shot: only the first completion wins. The drop path calls in
        // unconditionally, so a fulfilled channel must not regress.
        if matches!(*state, State::Pending) {
            *state = next;
        }
        drop(state);
        self.cond.notify_all();
    }
}

/// Create a connected promise/receiver pair.
pub fn result_channel<T>() -> (ResultPromise<T>, ResultReceiver<T>) {
    let chan = Arc::new(Channel {
        state: Mutex::new(State::Pending),
        cond: Condvar::new(),
    });

    (
        ResultPromise {
            chan: chan.clone(),
            fulfilled: false,
        },
        ResultReceiver { chan },
    )
}

/// Producer half of a result channel.
///
/// Held inside the wrapped task. Dropping it without delivering a value
/// breaks the channel, which is exactly what happens to tasks destroyed by
/// the shutdown drain.
pub struct ResultPromise<T> {
    chan: Arc<Channel<T>>,
    fulfilled: bool,
}

impl<T> ResultPromise<T> {
    /// Deliver the task's value.
    pub fn fulfill(mut self, value: T) {
        self.fulfilled = true;
        self.chan.complete(State::Ready(value));
    }

    /// Deliver a failure.
    pub fn fail(mut self, error: Error) {
        self.fulfilled = true;
        self.chan.complete(State::Failed(error));
    }
}

impl<T> Drop for ResultPromise<T> {
    fn drop(&mut self) {
        if !self.fulfilled {
            self.chan.complete(State::Failed(Error::BrokenTask));
        }
    }
}

impl<T> std::fmt::Debug for ResultPromise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultPromise")
            .field("fulfilled", &self.fulfilled)
            .finish()
    }
}

/// Consumer half of a result channel.
pub struct ResultReceiver<T> {
    chan: Arc<Channel<T>>,
}

impl<T> ResultReceiver<T> {
    /// Current state without blocking.
    pub fn status(&self) -> ResultStatus {
        match *self.chan.state.lock() {
            State::Pending => ResultStatus::Pending,
            State::Ready(_) | State::Taken => ResultStatus::Ready,
            State::Failed(_) => ResultStatus::Failed,
        }
    }

    /// Block until the channel reaches a terminal state.
    pub fn wait(&self) {
        let mut state = self.chan.state.lock();
        while matches!(*state, State::Pending) {
            self.chan.cond.wait(&mut state);
        }
    }

    /// Block until the channel is terminal or the timeout elapses; returns
    /// the state observed on exit.
    pub fn wait_for(&self, timeout: Duration) -> ResultStatus {
        let deadline = Instant::now() + timeout;
        let mut state = self.chan.state.lock();
        while matches!(*state, State::Pending) {
            if self.chan.cond.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        match *state {
            State::Pending => ResultStatus::Pending,
            State::Ready(_) | State::Taken => ResultStatus::Ready,
            State::Failed(_) => ResultStatus::Failed,
        }
    }

    /// Block until the result arrives and take it, consuming the receiver.
    ///
    /// Returns [`Error::BrokenTask`] if the task was destroyed before it
    /// could run, and [`Error::Panicked`] if it panicked while running.
    pub fn get(self) -> Result<T> {
        let mut state = self.chan.state.lock();
        while matches!(*state, State::Pending) {
            self.chan.cond.wait(&mut state);
        }

        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(value) => Ok(value),
            State::Failed(error) => Err(error),
            State::Pending | State::Taken => unreachable!("result taken twice"),
        }
    }
}

impl<T> std::fmt::Debug for ResultReceiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultReceiver")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fulfill_then_get() {
        let (promise, receiver) = result_channel();
        assert_eq!(receiver.status(), ResultStatus::Pending);

        promise.fulfill(42);

        assert_eq!(receiver.status(), ResultStatus::Ready);
        assert_eq!(receiver.get().unwrap(), 42);
    }

    #[test]
    fn test_fail_then_get() {
        let (promise, receiver) = result_channel::<u32>();
        promise.fail(Error::Panicked("boom".into()));

        assert_eq!(receiver.status(), ResultStatus::Failed);
        assert!(matches!(receiver.get(), Err(Error::Panicked(_))));
    }

    #[test]
    fn test_dropped_promise_breaks_channel() {
        let (promise, receiver) = result_channel::<u32>();
        drop(promise);

        assert_eq!(receiver.status(), ResultStatus::Failed);
        assert!(receiver.get().unwrap_err().is_broken_task());
    }

    #[test]
    fn test_dropped_receiver_does_not_block_producer() {
        let (promise, receiver) = result_channel();
        drop(receiver);
        promise.fulfill(1);
    }

    #[test]
    fn test_get_blocks_across_threads() {
        let (promise, receiver) = result_channel();

        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            promise.fulfill("done");
        });

        assert_eq!(receiver.get().unwrap(), "done");
        producer.join().unwrap();
    }

    #[test]
    fn test_wait_for_times_out_while_pending() {
        let (_promise, receiver) = result_channel::<u32>();
        let status = receiver.wait_for(Duration::from_millis(20));
        assert_eq!(status, ResultStatus::Pending);
    }

    #[test]
    fn test_wait_for_sees_value() {
        let (promise, receiver) = result_channel();

        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            promise.fulfill(7u32);
        });

        let status = receiver.wait_for(Duration::from_secs(5));
        assert_eq!(status, ResultStatus::Ready);
        producer.join().unwrap();
    }
}
