use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::bsem::BinarySemaphore;
use crate::config::ScheduleStrategy;
use crate::job::{Job, WorkGroup};

/// The pool's work store: a FIFO of individual jobs plus a stack of
/// pre-built groups (`Static` scheduling only), all behind one mutex, with a
/// binary semaphore workers sleep on.
pub(crate) struct JobQueue {
    state: Mutex<QueueState>,
    pub has_jobs: BinarySemaphore,
}

struct QueueState {
    jobs: VecDeque<Job>,
    /// Pre-built groups, consumed newest chain first, bin order within a
    /// chain.
    groups: Vec<WorkGroup>,
    /// Sum of historical averages over queued jobs that carry one, seconds.
    total_time: f32,
    /// When the latest-dispatched multi-job group should finish.
    highest_expected_return: Option<Instant>,
    strategy: ScheduleStrategy,
    max_group_work: f32,
}

impl JobQueue {
    pub fn new(strategy: ScheduleStrategy, max_group_work: f32) -> Self {
        JobQueue {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                groups: Vec::new(),
                total_time: 0.0,
                highest_expected_return: None,
                strategy,
                max_group_work,
            }),
            has_jobs: BinarySemaphore::new(false),
        }
    }

    /// Append one job and wake one worker.
    pub fn push(&self, job: Job) {
        let mut state = self.state.lock().unwrap();
        state.push_job(job);
        self.has_jobs.post();
    }

    /// Append a batch in one critical section and wake every sleeping
    /// worker.
    pub fn multipush(&self, jobs: Vec<Job>) {
        let mut state = self.state.lock().unwrap();
        for job in jobs {
            state.push_job(job);
        }
        self.has_jobs.post_all();
    }

    /// Balance a timed batch into one group per worker up front and splice
    /// the chain ahead of any groups already waiting.
    ///
    /// Only called for `Static` scheduling with timing present; every job
    /// carries an average.
    pub fn push_static(&self, jobs: Vec<Job>, n_threads: usize, verbose: bool) {
        let bins = n_threads.min(jobs.len());
        let avg_elapsed: Vec<f32> = jobs
            .iter()
            .map(|job| job.avg_elapsed.unwrap_or(0.0))
            .collect();
        let assignment = assign_bins(&avg_elapsed, bins);

        let mut grouped: Vec<WorkGroup> = (0..bins).map(|_| WorkGroup::empty()).collect();
        for (job, &bin) in jobs.into_iter().zip(&assignment) {
            grouped[bin].jobs.push(job);
        }

        if verbose {
            for (i, group) in grouped.iter().enumerate() {
                let duration: f32 = group.jobs.iter().filter_map(|j| j.avg_elapsed).sum();
                debug!(
                    "static work group {} with {} jobs for {:e} s",
                    i,
                    group.len(),
                    duration
                );
            }
        }

        let mut state = self.state.lock().unwrap();
        // pop order must be bin 0 first, then the rest of this chain, then
        // whatever was queued before
        for group in grouped.into_iter().rev() {
            state.groups.push(group);
        }
        self.has_jobs.post_all();
    }

    /// Detach the next work group for a worker. Re-raises `has_jobs` when
    /// work remains so the next sleeper wakes.
    pub fn pull(&self, worker_id: usize, n_threads: usize, verbose: bool) -> WorkGroup {
        let mut state = self.state.lock().unwrap();
        let group = state.next_group(worker_id, n_threads, verbose);
        if !state.jobs.is_empty() || !state.groups.is_empty() {
            self.has_jobs.post();
        }
        group
    }

    /// True when no job and no pre-built group is waiting.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.jobs.is_empty() && state.groups.is_empty()
    }

    /// Jobs waiting to be dispatched, grouped or not.
    pub fn pending_jobs(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.jobs.len() + state.groups.iter().map(WorkGroup::len).sum::<usize>()
    }

    /// Forget the timing state carried over from the drained batch.
    pub fn reset_accounting(&self) {
        let mut state = self.state.lock().unwrap();
        state.total_time = 0.0;
        state.highest_expected_return = None;
    }

    /// Drop everything still queued and lower the semaphore.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.jobs.clear();
        state.groups.clear();
        state.total_time = 0.0;
        state.highest_expected_return = None;
        self.has_jobs.reset();
    }

    pub fn strategy(&self) -> ScheduleStrategy {
        self.state.lock().unwrap().strategy
    }

    pub fn set_strategy(&self, strategy: ScheduleStrategy) {
        self.state.lock().unwrap().strategy = strategy;
    }

    pub fn max_group_work(&self) -> f32 {
        self.state.lock().unwrap().max_group_work
    }

    pub fn set_max_group_work(&self, v: f32) {
        self.state.lock().unwrap().max_group_work = v;
    }
}

impl QueueState {
    fn push_job(&mut self, job: Job) {
        if let Some(avg) = job.avg_elapsed {
            self.total_time += avg;
        }
        self.jobs.push_back(job);
    }

    /// Detach the head job, keeping `total_time` in step. Draining the FIFO
    /// also forgets the expected-return forecast.
    fn extract_single(&mut self) -> Option<Job> {
        let job = self.jobs.pop_front()?;
        if self.jobs.is_empty() {
            self.total_time = 0.0;
            self.highest_expected_return = None;
        } else if let Some(avg) = job.avg_elapsed {
            self.total_time -= avg;
        }
        Some(job)
    }

    fn extract_single_group(&mut self) -> WorkGroup {
        match self.extract_single() {
            Some(job) => WorkGroup::singleton(job),
            None => WorkGroup::empty(),
        }
    }

    fn next_group(&mut self, worker_id: usize, n_threads: usize, verbose: bool) -> WorkGroup {
        if self.strategy == ScheduleStrategy::Static {
            if let Some(group) = self.groups.pop() {
                return group;
            }
        }

        if self.strategy == ScheduleStrategy::SingleJob
            || self.jobs.len() <= 1
            || self.total_time <= 0.0
        {
            if verbose && self.strategy == ScheduleStrategy::MultiJob {
                if self.jobs.len() == 1 {
                    debug!("worker {}: one job left, single-job pull", worker_id);
                } else if !self.jobs.is_empty() {
                    debug!(
                        "worker {}: no timing information, single-job pull",
                        worker_id
                    );
                }
            }
            return self.extract_single_group();
        }

        // multi-job: at least two jobs queued and timing available
        if self.jobs[0].avg_elapsed.is_none() {
            warn!(
                "worker {}: head job has no timing, falling back to a single-job pull",
                worker_id
            );
            return self.extract_single_group();
        }

        let now = Instant::now();
        let (size, duration, target) = self.plan_multi_group(n_threads, now);
        if verbose {
            debug!(
                "worker {}: work group of {} jobs for {:e} s (target {:e} s)",
                worker_id, size, duration, target
            );
        }

        let mut jobs = Vec::with_capacity(size);
        while jobs.len() < size {
            match self.extract_single() {
                Some(job) => jobs.push(job),
                None => break,
            }
        }

        let finish = now + Duration::from_secs_f32(duration);
        self.highest_expected_return = Some(match self.highest_expected_return {
            Some(prev) if prev > finish => prev,
            _ => finish,
        });

        WorkGroup { jobs }
    }

    /// Decide how many head jobs the next multi-job group takes.
    ///
    /// The base target is this worker's fair share of the remaining expected
    /// work. When other workers are already forecast to run past that share,
    /// the target is raised toward their expected return (capped at the
    /// total remaining work) so everyone finishes close together instead of
    /// leaving one straggler behind. A job whose inclusion would reach the
    /// target is excluded, as is everything from the first untimed job on.
    ///
    /// Returns `(size, duration, target)`; the head job is always included.
    fn plan_multi_group(&self, n_threads: usize, now: Instant) -> (usize, f32, f32) {
        let mut target = self.total_time * self.max_group_work / n_threads as f32;
        if let Some(expected_return) = self.highest_expected_return {
            let pending = expected_return.saturating_duration_since(now).as_secs_f32();
            let min_target = (0.9 * pending).min(self.total_time);
            if min_target > target {
                target = min_target;
            }
        }

        let mut size = 1;
        let mut duration = self.jobs[0].avg_elapsed.unwrap_or(0.0);
        for job in self.jobs.iter().skip(1) {
            let avg = match job.avg_elapsed {
                Some(avg) => avg,
                None => break,
            };
            if duration + avg < target {
                size += 1;
                duration += avg;
            } else {
                break;
            }
        }

        (size, duration, target)
    }
}

/// Split a timed batch across `bins` workers: first fit below the fair-share
/// target, overflow to the least loaded bin (first index on ties). Returns
/// the bin index for every job, in input order.
pub(crate) fn assign_bins(avg_elapsed: &[f32], bins: usize) -> Vec<usize> {
    let total: f32 = avg_elapsed.iter().sum();
    let target = total / bins as f32;

    let mut durations = vec![0.0f32; bins];
    let mut assignment = Vec::with_capacity(avg_elapsed.len());

    for &avg in avg_elapsed {
        let first_fit = durations.iter().position(|&d| d + avg < target);
        let bin = first_fit.unwrap_or_else(|| {
            let mut best = 0;
            let mut best_duration = durations[0] + avg;
            for (i, &d) in durations.iter().enumerate().skip(1) {
                if d + avg < best_duration {
                    best = i;
                    best_duration = d + avg;
                }
            }
            best
        });
        durations[bin] += avg;
        assignment.push(bin);
    }

    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn nop(_: *const ()) {}

    fn job(index: usize, avg_elapsed: Option<f32>) -> Job {
        Job {
            function: nop,
            arg: index as *const (),
            avg_elapsed,
            elapsed: ptr::null_mut(),
        }
    }

    fn indices(group: &WorkGroup) -> Vec<usize> {
        group.jobs.iter().map(|j| j.arg as usize).collect()
    }

    #[test]
    fn single_job_strategy_pulls_one_at_a_time() {
        let queue = JobQueue::new(ScheduleStrategy::SingleJob, 0.75);
        queue.multipush((0..3).map(|i| job(i, Some(1.0))).collect());

        assert_eq!(indices(&queue.pull(0, 2, false)), [0]);
        assert_eq!(indices(&queue.pull(1, 2, false)), [1]);
        assert_eq!(queue.pending_jobs(), 1);
    }

    #[test]
    fn pull_on_empty_queue_returns_empty_group() {
        let queue = JobQueue::new(ScheduleStrategy::SingleJob, 0.75);
        assert_eq!(queue.pull(0, 2, false).len(), 0);
    }

    #[test]
    fn multi_job_pull_stops_strictly_below_target() {
        // total 8, target 8 * 0.75 / 2 = 3: growing past 1, 2 would reach 3,
        // so the group takes exactly two jobs
        let queue = JobQueue::new(ScheduleStrategy::MultiJob, 0.75);
        queue.multipush((0..8).map(|i| job(i, Some(1.0))).collect());

        assert_eq!(indices(&queue.pull(0, 2, false)), [0, 1]);
    }

    #[test]
    fn multi_job_without_timing_degrades_to_single() {
        let queue = JobQueue::new(ScheduleStrategy::MultiJob, 0.75);
        queue.multipush(vec![job(0, None), job(1, Some(1.0)), job(2, Some(1.0))]);

        // head job carries no average, so it goes out alone
        assert_eq!(indices(&queue.pull(0, 2, false)), [0]);
    }

    #[test]
    fn multi_job_stops_at_first_untimed_job() {
        let queue = JobQueue::new(ScheduleStrategy::MultiJob, 1.0);
        queue.multipush(vec![
            job(0, Some(0.1)),
            job(1, Some(0.1)),
            job(2, None),
            job(3, Some(0.1)),
        ]);

        let group = queue.pull(0, 1, false);
        assert_eq!(indices(&group), [0, 1]);
    }

    #[test]
    fn draining_the_fifo_resets_accounting() {
        let queue = JobQueue::new(ScheduleStrategy::SingleJob, 0.75);
        queue.multipush(vec![job(0, Some(2.0)), job(1, Some(3.0))]);
        queue.pull(0, 2, false);
        queue.pull(0, 2, false);

        let state = queue.state.lock().unwrap();
        assert_eq!(state.total_time, 0.0);
        assert!(state.highest_expected_return.is_none());
    }

    #[test]
    fn assign_bins_first_fit_with_overflow() {
        // total 15, target 5: the heavy job overflows to the least loaded
        // bin, the rest first-fit below the target
        let assignment = assign_bins(&[10.0, 1.0, 1.0, 1.0, 1.0, 1.0], 3);
        assert_eq!(assignment, [0, 1, 1, 1, 1, 2]);
    }

    #[test]
    fn assign_bins_respects_greedy_bound() {
        let avg = [3.0f32, 7.0, 1.0, 4.0, 4.0, 2.0, 9.0, 1.0, 0.5, 5.0];
        let bins = 3;
        let assignment = assign_bins(&avg, bins);

        let total: f32 = avg.iter().sum();
        let max: f32 = avg.iter().fold(0.0, |a, &b| a.max(b));
        let mut loads = vec![0.0f32; bins];
        for (&bin, &avg) in assignment.iter().zip(&avg) {
            loads[bin] += avg;
        }
        for &load in &loads {
            assert!(load <= max + total / bins as f32);
        }
    }

    #[test]
    fn static_groups_pop_in_bin_order() {
        let queue = JobQueue::new(ScheduleStrategy::Static, 0.75);
        let jobs: Vec<Job> = [10.0f32, 1.0, 1.0, 1.0, 1.0, 1.0]
            .iter()
            .enumerate()
            .map(|(i, &avg)| job(i, Some(avg)))
            .collect();
        queue.push_static(jobs, 3, false);

        assert_eq!(indices(&queue.pull(0, 3, false)), [0]);
        assert_eq!(indices(&queue.pull(1, 3, false)), [1, 2, 3, 4]);
        assert_eq!(indices(&queue.pull(2, 3, false)), [5]);
        assert!(queue.is_idle());
    }

    #[test]
    fn newer_static_chain_runs_before_older_one() {
        let queue = JobQueue::new(ScheduleStrategy::Static, 0.75);
        queue.push_static(vec![job(0, Some(1.0)), job(1, Some(1.0))], 1, false);
        queue.push_static(vec![job(2, Some(1.0))], 1, false);

        assert_eq!(indices(&queue.pull(0, 1, false)), [2]);
        assert_eq!(indices(&queue.pull(0, 1, false)), [0, 1]);
    }

    #[test]
    fn static_strategy_with_plain_fifo_still_drains() {
        // timed jobs that arrived through multipush under Static scheduling
        // are grouped greedily, not one by one
        let queue = JobQueue::new(ScheduleStrategy::Static, 1.0);
        queue.multipush((0..4).map(|i| job(i, Some(1.0))).collect());

        let mut seen = Vec::new();
        while queue.pending_jobs() > 0 {
            seen.extend(indices(&queue.pull(0, 2, false)));
        }
        assert_eq!(seen, [0, 1, 2, 3]);
    }
}
