use std::{future::Future, rc::Rc};

use smol::{LocalExecutor, Task};

/// Single-threaded cooperative executor that every remote object and signal
/// schedules its work on.
///
/// Cloning a `Scheduler` yields another handle to the same executor.
#[derive(Clone)]
pub struct Scheduler {
    executor: Rc<LocalExecutor<'static>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            executor: Rc::new(LocalExecutor::new()),
        }
    }

    /// Spawns a task onto the executor. Dropping the returned [`Task`]
    /// cancels it; call `detach()` to let it run to completion.
    pub fn spawn<T: 'static>(&self, future: impl Future<Output = T> + 'static) -> Task<T> {
        self.executor.spawn(future)
    }

    /// Runs `callback` at the next tick rather than immediately
    pub fn defer(&self, callback: impl FnOnce() + 'static) {
        self.executor.spawn(async move { callback() }).detach();
    }

    /// Runs every task that is ready to make progress, until none are left.
    /// Returns the number of task polls performed.
    pub fn flush(&self) -> usize {
        let mut polls = 0;
        while self.executor.try_tick() {
            polls += 1;
        }
        polls
    }

    /// Drives the executor until `future` completes
    pub fn block_on<T>(&self, future: impl Future<Output = T>) -> T {
        smol::block_on(self.executor.run(future))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
