/// Fixed-size worker pool with per-worker bounded queues
/// Fork-join over dynamically generated tasks: add(n), run tasks, wait()
use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;
use anyhow::{Context, Result};
use rand::Rng;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

/// Boxed argument handed to a `run_with_args` task.
pub type Arg = Box<dyn Any + Send>;

/// Picks a worker index in `[min, max)`.
pub type Randomizer = Arc<dyn Fn(usize, usize) -> usize + Send + Sync>;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

enum Job {
    Call(Box<dyn FnOnce() + Send + 'static>),
    WithArg(fn(Arg), Arg),
}

impl Job {
    #[inline]
    fn execute(self) {
        match self {
            Job::Call(f) => f(),
            Job::WithArg(f, arg) => f(arg),
        }
    }
}

/// Pool configuration
#[derive(Clone)]
pub struct PoolConfig {
    pub workers: usize,
    /// Capacity of each worker's queue. A full queue blocks the submitter.
    pub queue_capacity: usize,
    /// Worker selection. Uniform random when `None`.
    pub randomizer: Option<Randomizer>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(4, |n| n.get()),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            randomizer: None,
        }
    }
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("randomizer", &self.randomizer.as_ref().map(|_| "custom"))
            .finish()
    }
}

struct Barrier {
    running: AtomicU64,
    lock: Mutex<()>,
    done: Condvar,
}

impl Barrier {
    #[inline]
    fn complete(&self) {
        if self.running.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.done.notify_all();
        }
    }
}

pub struct Pool {
    senders: RwLock<Vec<SyncSender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    barrier: Arc<Barrier>,
    randomizer: Randomizer,
}

fn default_randomizer(min: usize, max: usize) -> usize {
    rand::rng().random_range(min..max)
}

impl Pool {
    /// Spawn `config.workers` worker threads.
    ///
    /// Panics if `workers` or `queue_capacity` is zero.
    pub fn new(config: PoolConfig) -> Result<Self> {
        assert!(config.workers > 0, "worker pool needs at least one worker");
        assert!(
            config.queue_capacity > 0,
            "worker queue capacity must be non-zero"
        );

        let barrier = Arc::new(Barrier {
            running: AtomicU64::new(0),
            lock: Mutex::new(()),
            done: Condvar::new(),
        });

        let mut senders = Vec::with_capacity(config.workers);
        let mut handles = Vec::with_capacity(config.workers);
        for i in 0..config.workers {
            let (tx, rx) = mpsc::sync_channel(config.queue_capacity);
            let barrier = Arc::clone(&barrier);
            let handle = thread::Builder::new()
                .name(format!("polyraster-worker-{i}"))
                .spawn(move || worker_loop(rx, barrier))
                .with_context(|| format!("failed to spawn worker thread {i}"))?;
            senders.push(tx);
            handles.push(handle);
        }

        log::debug!(
            "worker pool started: {} workers, queue capacity {}",
            config.workers,
            config.queue_capacity
        );

        Ok(Self {
            senders: RwLock::new(senders),
            handles: Mutex::new(handles),
            barrier,
            randomizer: config
                .randomizer
                .unwrap_or_else(|| Arc::new(default_randomizer)),
        })
    }

    pub fn with_workers(workers: usize) -> Result<Self> {
        Self::new(PoolConfig {
            workers,
            ..PoolConfig::default()
        })
    }

    pub fn workers(&self) -> usize {
        self.senders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Announce `n` tasks that are about to be submitted. Returns the new
    /// outstanding count.
    ///
    /// Must happen before the matching `run` calls, otherwise `wait` can
    /// return while tasks are still queued.
    #[inline]
    pub fn add(&self, n: u64) -> u64 {
        self.barrier.running.fetch_add(n, Ordering::AcqRel) + n
    }

    /// Number of announced tasks that have not completed yet.
    #[inline]
    pub fn running(&self) -> u64 {
        self.barrier.running.load(Ordering::Acquire)
    }

    /// Submit a task. Panics if the pool was released.
    pub fn run<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(Job::Call(Box::new(f)));
    }

    /// Submit several tasks; each one must already be covered by `add`.
    pub fn run_many<I>(&self, tasks: I)
    where
        I: IntoIterator<Item = Box<dyn FnOnce() + Send + 'static>>,
    {
        for task in tasks {
            self.dispatch(Job::Call(task));
        }
    }

    /// Submit a plain function with a boxed argument, skipping the closure box.
    pub fn run_with_args(&self, f: fn(Arg), arg: Arg) {
        self.dispatch(Job::WithArg(f, arg));
    }

    fn dispatch(&self, job: Job) {
        let senders = self.senders.read().unwrap_or_else(PoisonError::into_inner);
        assert!(!senders.is_empty(), "task submitted to a released pool");

        let n = senders.len();
        let mut idx = (self.randomizer)(0, n);
        if idx >= n {
            idx = default_randomizer(0, n);
        }

        if senders[idx].send(job).is_err() {
            panic!("worker {idx} exited; a previous task panicked");
        }
    }

    /// Block until every announced task has completed.
    pub fn wait(&self) {
        if self.running() == 0 {
            return;
        }
        let mut guard = self
            .barrier
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while self.barrier.running.load(Ordering::Acquire) != 0 {
            guard = self
                .barrier
                .done
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Close every queue and join the workers. Further submissions panic.
    pub fn release(&self) {
        let senders = std::mem::take(
            &mut *self.senders.write().unwrap_or_else(PoisonError::into_inner),
        );
        if senders.is_empty() {
            return;
        }
        drop(senders);

        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if handle.join().is_err() {
                log::warn!("worker thread terminated by a panicking task");
            }
        }
        log::debug!("worker pool released");
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.release();
    }
}

fn worker_loop(rx: Receiver<Job>, barrier: Arc<Barrier>) {
    for job in rx {
        job.execute();
        count_call!(FUNCTION_COUNTERS.pool_tasks_run);
        barrier.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn wait_without_tasks_returns_immediately() {
        let pool = Pool::with_workers(2).unwrap();
        pool.wait();
        assert_eq!(pool.running(), 0);
    }

    #[test]
    fn add_returns_new_count() {
        let pool = Pool::with_workers(1).unwrap();
        assert_eq!(pool.add(3), 3);
        assert_eq!(pool.add(2), 5);
        for _ in 0..5 {
            pool.run(|| {});
        }
        pool.wait();
        assert_eq!(pool.running(), 0);
    }

    #[test]
    fn run_with_args_passes_argument() {
        static SEEN: AtomicUsize = AtomicUsize::new(0);

        fn record(arg: Arg) {
            if let Ok(v) = arg.downcast::<usize>() {
                SEEN.fetch_add(*v, Ordering::SeqCst);
            }
        }

        let pool = Pool::with_workers(3).unwrap();
        pool.add(4);
        for i in 1..=4usize {
            pool.run_with_args(record, Box::new(i));
        }
        pool.wait();
        assert_eq!(SEEN.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn custom_randomizer_routes_to_chosen_worker() {
        let pool = Pool::new(PoolConfig {
            workers: 4,
            queue_capacity: 16,
            randomizer: Some(Arc::new(|_, _| 2)),
        })
        .unwrap();

        let names = Arc::new(Mutex::new(Vec::new()));
        pool.add(8);
        for _ in 0..8 {
            let names = Arc::clone(&names);
            pool.run(move || {
                let name = thread::current().name().map(str::to_owned);
                names.lock().unwrap().push(name);
            });
        }
        pool.wait();

        let names = names.lock().unwrap();
        assert_eq!(names.len(), 8);
        assert!(names
            .iter()
            .all(|n| n.as_deref() == Some("polyraster-worker-2")));
    }

    #[test]
    fn out_of_range_randomizer_falls_back() {
        let pool = Pool::new(PoolConfig {
            workers: 2,
            queue_capacity: 4,
            randomizer: Some(Arc::new(|_, max| max + 7)),
        })
        .unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        pool.add(6);
        for _ in 0..6 {
            let hits = Arc::clone(&hits);
            pool.run(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.wait();
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }

    #[test]
    #[should_panic(expected = "released pool")]
    fn run_after_release_panics() {
        let pool = Pool::with_workers(1).unwrap();
        pool.release();
        pool.run(|| {});
    }
}
