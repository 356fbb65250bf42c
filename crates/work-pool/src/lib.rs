//! Bounded worker pool that grows on demand and drains to zero.
//!
//! Workers are plain OS threads. The pool starts with none and spawns at most one
//! new worker per `submit`, only when no worker is idle and the configured maximum
//! has not been reached. All shared state sits behind a single mutex paired with
//! two condition variables:
//! - `work_ready`: idle workers wait here for new items or the drain signal
//! - `drained`: `drain` callers wait here until the last worker has exited
//!
//! Jobs always run with the lock released. A panicking job is caught and counted;
//! the worker that ran it keeps serving the queue.

use log::{debug, warn};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// A queued unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

const DEFAULT_THREAD_NAME: &str = "work-pool";

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("the worker pool is draining and not available to queue work items")]
    Unavailable,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub max_threads: usize,
    /// Workers currently alive
    pub thread_count: usize,
    /// Workers idle and waiting for work
    pub available_count: usize,
    pub queued: usize,
    pub draining: bool,
    /// Highest `thread_count` ever observed
    pub peak_threads: usize,
    pub executed: u64,
    pub panicked: u64,
}

struct PoolState {
    queue: VecDeque<Job>,
    thread_count: usize,
    available_count: usize,
    draining: bool,
    peak_threads: usize,
    spawned: usize,
    handles: Vec<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<PoolState>,
    work_ready: Condvar,
    drained: Condvar,
    max_threads: usize,
    name: String,
    executed: AtomicU64,
    panicked: AtomicU64,
}

impl Shared {
    // Jobs never run under the lock, so poisoning can only come from a bug in the
    // pool itself; the state is still consistent at every unlock point.
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Elastic thread pool with FIFO admission and a blocking drain.
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Create a pool that will run at most `max_threads` workers at once.
    ///
    /// No thread is spawned until work arrives. A maximum of zero is treated as one.
    pub fn new(max_threads: usize) -> Self {
        Self::named(DEFAULT_THREAD_NAME, max_threads)
    }

    /// Same as [`WorkerPool::new`], with worker threads named `<name>-<n>`.
    pub fn named(name: &str, max_threads: usize) -> Self {
        let max_threads = if max_threads == 0 {
            warn!("work_pool: max_threads=0 requested for {}, using 1", name);
            1
        } else {
            max_threads
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    thread_count: 0,
                    available_count: 0,
                    draining: false,
                    peak_threads: 0,
                    spawned: 0,
                    handles: Vec::new(),
                }),
                work_ready: Condvar::new(),
                drained: Condvar::new(),
                max_threads,
                name: name.to_string(),
                executed: AtomicU64::new(0),
                panicked: AtomicU64::new(0),
            }),
        }
    }

    pub fn max_threads(&self) -> usize {
        self.shared.max_threads
    }

    /// Queue a job for execution.
    ///
    /// Never blocks beyond the queue append. Fails without side effects once
    /// [`WorkerPool::drain`] has started.
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.lock_state();

        if state.draining {
            return Err(PoolError::Unavailable);
        }

        state.queue.push_back(Box::new(job));

        if state.available_count == 0 && state.thread_count < self.shared.max_threads {
            state.thread_count += 1;
            if let Err(e) = self.spawn_worker(&mut state) {
                state.thread_count -= 1;
                if state.thread_count == 0 {
                    // Nobody would ever run it
                    state.queue.pop_back();
                    return Err(PoolError::Spawn(e));
                }
                warn!(
                    "work_pool: spawn failed for {}, continuing with {} workers: {}",
                    self.shared.name, state.thread_count, e
                );
            }
            state.peak_threads = state.peak_threads.max(state.thread_count);
        }

        self.shared.work_ready.notify_one();
        Ok(())
    }

    /// Stop admitting work and block until every queued job has run and every
    /// worker has exited.
    ///
    /// Safe to call more than once and from several threads at the same time; all
    /// callers return once the pool is quiesced.
    pub fn drain(&self) {
        let handles = {
            let mut state = self.shared.lock_state();
            if !state.draining {
                debug!(
                    "work_pool: draining {} threads={} queued={}",
                    self.shared.name,
                    state.thread_count,
                    state.queue.len()
                );
                state.draining = true;
            }
            self.shared.work_ready.notify_all();

            while state.thread_count > 0 {
                state = self
                    .shared
                    .drained
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            std::mem::take(&mut state.handles)
        };

        for handle in handles {
            if handle.join().is_err() {
                warn!("work_pool: worker thread of {} exited abnormally", self.shared.name);
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock_state();
        PoolStats {
            max_threads: self.shared.max_threads,
            thread_count: state.thread_count,
            available_count: state.available_count,
            queued: state.queue.len(),
            draining: state.draining,
            peak_threads: state.peak_threads,
            executed: self.shared.executed.load(Ordering::SeqCst),
            panicked: self.shared.panicked.load(Ordering::SeqCst),
        }
    }

    fn spawn_worker(&self, state: &mut PoolState) -> std::io::Result<()> {
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("{}-{}", self.shared.name, state.spawned))
            .spawn(move || run_worker(shared))?;
        state.spawned += 1;
        state.handles.push(handle);
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.drain();
    }
}

fn run_worker(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut state = shared.lock_state();
            loop {
                if let Some(job) = state.queue.pop_front() {
                    break job;
                }

                if state.draining {
                    state.thread_count -= 1;
                    if state.thread_count == 0 {
                        shared.drained.notify_all();
                    }
                    shared.work_ready.notify_all();
                    return;
                }

                state.available_count += 1;
                state = shared
                    .work_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
                state.available_count -= 1;
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => {
                shared.executed.fetch_add(1, Ordering::SeqCst);
            }
            Err(_) => {
                shared.panicked.fetch_add(1, Ordering::SeqCst);
                warn!(
                    "work_pool: job panicked on {}",
                    thread::current().name().unwrap_or(&shared.name)
                );
            }
        }
    }
}
