use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use log::debug;

use crate::config::{validate_max_group_work, PoolConfig, ScheduleStrategy};
use crate::error::ConfigError;
use crate::job::Job;
use crate::queue::JobQueue;
use crate::worker::spawn_worker;
use crate::{JobArgPointer, JobFnPointer};

/// State shared between the pool handle and its workers.
pub(crate) struct Shared {
    pub(crate) queue: JobQueue,
    /// Configured pool size, the divisor in the multi-job fair share.
    pub(crate) n_threads: usize,
    counts: Mutex<ThreadCounts>,
    /// Signaled on startup registration and whenever the working count drops
    /// to zero.
    all_idle: Condvar,
    pub(crate) keepalive: AtomicBool,
    verbose: AtomicBool,
    disabled: AtomicBool,
}

#[derive(Default)]
struct ThreadCounts {
    alive: usize,
    working: usize,
}

impl Shared {
    pub(crate) fn verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_alive(&self) {
        let mut counts = self.counts.lock().unwrap();
        counts.alive += 1;
        // construction waits for startup on the same condvar
        self.all_idle.notify_all();
    }

    pub(crate) fn mark_exited(&self) {
        self.counts.lock().unwrap().alive -= 1;
    }

    pub(crate) fn begin_work(&self) {
        self.counts.lock().unwrap().working += 1;
    }

    pub(crate) fn finish_work(&self) {
        let mut counts = self.counts.lock().unwrap();
        counts.working -= 1;
        if counts.working == 0 {
            self.all_idle.notify_all();
        }
    }

    fn wait_until_alive(&self, target: usize) {
        let mut counts = self.counts.lock().unwrap();
        while counts.alive < target {
            counts = self.all_idle.wait(counts).unwrap();
        }
    }
}

/// An adaptive worker pool for many small, independent compute jobs.
///
/// Workers pull work according to the configured [`ScheduleStrategy`],
/// optionally guided by per-job historical runtimes, and write fresh
/// thread-CPU-time measurements back into caller-owned slots. See the crate
/// docs for the submission contract.
pub struct TempoPool {
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
    time_meas: AtomicU32,
}

impl TempoPool {
    /// Pool with the default configuration: two workers, single-job
    /// scheduling.
    pub fn new() -> Self {
        TempoPool::with_config(PoolConfig::default())
    }

    /// Spawn the configured workers and return once every one of them has
    /// registered itself alive. A config with zero threads (or `disabled`)
    /// spawns nothing; such a pool executes submissions inline.
    pub fn with_config(config: PoolConfig) -> Self {
        let shared = Arc::new(Shared {
            queue: JobQueue::new(config.strategy, config.max_group_work),
            n_threads: config.threads,
            counts: Mutex::new(ThreadCounts::default()),
            all_idle: Condvar::new(),
            keepalive: AtomicBool::new(true),
            verbose: AtomicBool::new(config.verbose),
            disabled: AtomicBool::new(config.disabled || config.threads == 0),
        });

        let workers: Vec<JoinHandle<()>> = if config.disabled || config.threads == 0 {
            Vec::new()
        } else {
            (0..config.threads)
                .map(|id| spawn_worker(id, Arc::clone(&shared)))
                .collect()
        };

        if !workers.is_empty() {
            shared.wait_until_alive(workers.len());
        }
        if config.verbose {
            debug!("thread pool created with {} threads", workers.len());
        }

        TempoPool {
            workers,
            shared,
            time_meas: AtomicU32::new(config.time_meas),
        }
    }

    /// Enqueue one job.
    ///
    /// `avg_elapsed` is the job's historical mean runtime in seconds, used
    /// by the timing-aware strategies. When `elapsed` is given, the worker
    /// writes the job's measured thread CPU time into it; the slot must not
    /// be read or written by anyone else until [`wait`](TempoPool::wait)
    /// returns. On a disabled pool the job runs inline instead, without
    /// measurement.
    pub fn add_job(
        &self,
        function: JobFnPointer,
        arg: JobArgPointer,
        avg_elapsed: Option<f32>,
        elapsed: Option<&mut f32>,
    ) {
        if self.bypass() {
            function(arg);
            return;
        }

        self.shared.queue.push(Job {
            function,
            arg,
            avg_elapsed,
            elapsed: elapsed.map_or(ptr::null_mut(), |slot| slot as *mut f32),
        });
    }

    /// Enqueue a batch.
    ///
    /// Position `i` of the batch executes job `order[i]` when a permutation
    /// is given, so a ranking produced by [`update_order`](crate::update_order)
    /// runs expensive jobs first. `avg_elapsed` and `elapsed` are indexed by
    /// the original job index, not the permuted position.
    ///
    /// Under [`Static`](ScheduleStrategy::Static) scheduling with timing
    /// present the batch is pre-balanced into one group per worker;
    /// otherwise the jobs join the FIFO in one critical section.
    ///
    /// On a disabled pool the batch runs inline on the caller thread in
    /// permuted order, without measurement.
    pub fn add_jobs(
        &self,
        functions: &[JobFnPointer],
        args: &[JobArgPointer],
        avg_elapsed: Option<&[f32]>,
        elapsed: Option<&mut [f32]>,
        order: Option<&[usize]>,
    ) {
        let n_jobs = functions.len();
        assert_eq!(args.len(), n_jobs, "args length mismatch");
        if let Some(avg_elapsed) = avg_elapsed {
            assert_eq!(avg_elapsed.len(), n_jobs, "avg_elapsed length mismatch");
        }
        if let Some(order) = order {
            assert_eq!(order.len(), n_jobs, "order length mismatch");
        }
        if n_jobs == 0 {
            return;
        }

        if self.bypass() {
            for i in 0..n_jobs {
                let j = order.map_or(i, |order| order[i]);
                (functions[j])(args[j]);
            }
            return;
        }

        let elapsed_base = elapsed.map_or(ptr::null_mut(), |slots| {
            assert_eq!(slots.len(), n_jobs, "elapsed length mismatch");
            slots.as_mut_ptr()
        });

        let mut jobs = Vec::with_capacity(n_jobs);
        for i in 0..n_jobs {
            let j = order.map_or(i, |order| order[i]);
            jobs.push(Job {
                function: functions[j],
                arg: args[j],
                avg_elapsed: avg_elapsed.map(|avg| avg[j]),
                elapsed: if elapsed_base.is_null() {
                    ptr::null_mut()
                } else {
                    // j < n_jobs == slots.len()
                    unsafe { elapsed_base.add(j) }
                },
            });
        }

        let pre_balance = self.strategy() == ScheduleStrategy::Static
            && avg_elapsed.is_some_and(|avg| avg[0] > 0.0);
        if pre_balance {
            self.shared
                .queue
                .push_static(jobs, self.shared.n_threads, self.shared.verbose());
        } else {
            self.shared.queue.multipush(jobs);
        }
    }

    /// Block until the queue is drained and every worker is idle, then
    /// forget the batch's timing state. Returns immediately on a pool
    /// without workers.
    pub fn wait(&self) {
        if self.workers.is_empty() {
            return;
        }

        loop {
            // queue lock first, count lock second; workers never hold both
            let queue_idle = self.shared.queue.is_idle();
            let counts = self.shared.counts.lock().unwrap();
            if queue_idle && counts.working == 0 {
                break;
            }
            drop(self.shared.all_idle.wait(counts).unwrap());
        }

        self.shared.queue.reset_accounting();
    }

    /// Stop and join the workers. Groups already pulled run to completion;
    /// anything still queued is dropped. Idempotent, and implied by `Drop`.
    pub fn shutdown(mut self) {
        self.shutdown_workers();
    }

    fn shutdown_workers(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.shared.keepalive.store(false, Ordering::Release);
        self.shared.queue.has_jobs.post_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }

        self.shared.queue.clear();
        if self.shared.verbose() {
            debug!("thread pool destroyed");
        }
    }

    fn bypass(&self) -> bool {
        self.workers.is_empty() || self.shared.disabled.load(Ordering::Relaxed)
    }

    /// Configured pool size (the spawned worker count unless disabled).
    pub fn threads(&self) -> usize {
        self.shared.n_threads
    }

    /// Workers actually spawned.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting to be dispatched, pre-grouped or not.
    pub fn pending_jobs(&self) -> usize {
        self.shared.queue.pending_jobs()
    }

    pub fn strategy(&self) -> ScheduleStrategy {
        self.shared.queue.strategy()
    }

    /// Change the scheduling strategy; takes effect on the next pull.
    pub fn set_strategy(&self, strategy: ScheduleStrategy) {
        self.shared.queue.set_strategy(strategy);
    }

    pub fn max_group_work(&self) -> f32 {
        self.shared.queue.max_group_work()
    }

    pub fn set_max_group_work(&self, v: f32) -> Result<(), ConfigError> {
        self.shared.queue.set_max_group_work(validate_max_group_work(v)?);
        Ok(())
    }

    pub fn time_meas(&self) -> u32 {
        self.time_meas.load(Ordering::Relaxed)
    }

    pub fn set_time_meas(&self, n: u32) {
        self.time_meas.store(n, Ordering::Relaxed);
    }

    pub fn verbose(&self) -> bool {
        self.shared.verbose()
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.shared.verbose.store(verbose, Ordering::Relaxed);
    }

    pub fn is_disabled(&self) -> bool {
        self.shared.disabled.load(Ordering::Relaxed)
    }

    /// Route subsequent submissions inline (or back to the workers). A pool
    /// built without workers stays inline regardless.
    pub fn set_disabled(&self, disabled: bool) {
        self.shared.disabled.store(disabled, Ordering::Relaxed);
    }
}

impl Default for TempoPool {
    fn default() -> Self {
        TempoPool::new()
    }
}

impl Drop for TempoPool {
    fn drop(&mut self) {
        self.shutdown_workers();
    }
}
