use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpu_time::ThreadTime;
use log::{debug, warn};

use crate::job::Job;
use crate::pool::Shared;

pub(crate) fn spawn_worker(id: usize, shared: Arc<Shared>) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("tp{}", id))
        .spawn(move || worker_loop(id, shared))
        .expect("spawn failed")
}

fn worker_loop(id: usize, shared: Arc<Shared>) {
    shared.mark_alive();

    while shared.keepalive.load(Ordering::Acquire) {
        shared.queue.has_jobs.wait();

        if !shared.keepalive.load(Ordering::Acquire) {
            break;
        }

        shared.begin_work();

        let group = shared.queue.pull(id, shared.n_threads, shared.verbose());
        if shared.verbose() {
            debug!("worker {} executing {} jobs", id, group.len());
        }

        for job in &group.jobs {
            run_job(job);
        }

        shared.finish_work();
    }

    // hand the wake token to the next sleeper so the shutdown cascades
    shared.queue.has_jobs.post_all();
    shared.mark_exited();
}

/// Run one job, sampling thread CPU time around the call when the caller
/// asked for a measurement. A failed clock read never stops the job; on
/// pre-read failure the measurement is skipped, on post-read failure the
/// slot is left untouched.
fn run_job(job: &Job) {
    let start = if job.elapsed.is_null() {
        None
    } else {
        match ThreadTime::try_now() {
            Ok(start) => Some(start),
            Err(err) => {
                warn!("thread CPU clock unavailable: {}", err);
                None
            }
        }
    };

    (job.function)(job.arg);

    if let Some(start) = start {
        match start.try_elapsed() {
            Ok(spent) => unsafe { *job.elapsed = spent.as_secs_f32() },
            Err(err) => warn!("thread CPU clock unavailable: {}", err),
        }
    }
}
