//! # Tempo-Pool: Adaptive Thread Pool with Runtime Feedback
//!
//! A thread pool for running many small, independent compute jobs (think
//! compiled Jacobian or Hessian row evaluations) on a fixed set of worker
//! threads, designed around measured job runtimes:
//! - Three scheduling strategies: one job per pull, time-bounded greedy
//!   batches, or statically pre-balanced groups
//! - Per-job thread CPU time measurement written into caller-owned slots
//! - Reorder advice that feeds measurements back into a caller-owned moving
//!   average and ranks the next batch most-expensive-first
//! - Zero-overhead job submission via function pointers and raw args
//!
//! ## Safety
//!
//! This library passes jobs around as raw pointers. Users must ensure:
//! - Argument structs remain valid until [`TempoPool::wait`] returns
//! - `elapsed` slots remain valid, and untouched by any other thread, until
//!   [`TempoPool::wait`] returns
//! - Job functions are thread-safe and data-race free
//! - No undefined behavior in unsafe job code
//!
//! The intended rhythm is submit, wait, inspect: hand a batch to the pool,
//! block on [`TempoPool::wait`], then read the measurements and feed them
//! through [`update_order`] for the next round.
//!
//! ## Example
//!
//! ```rust
//! use tempo_pool::{TempoPool, tp_job_params, tp_define_job_fn, tp_write};
//!
//! tp_job_params! {
//!     RowEval { value: u64, result: *mut u64 }
//! }
//!
//! tp_define_job_fn!(row_eval, RowEval, |params| {
//!     tp_write!(params.result, params.value * 2);
//! });
//!
//! let pool = TempoPool::new();
//! let mut result = 0u64;
//! let job = RowEval::new(42, &mut result);
//! pool.add_job(row_eval, job.arg_ptr(), None, None);
//! pool.wait();
//! assert_eq!(result, 84);
//! ```

mod bsem;
mod config;
mod error;
mod job;
mod macros;
mod order;
mod pool;
mod queue;
mod worker;

pub use config::{PoolConfig, ScheduleStrategy};
pub use error::ConfigError;
pub use order::update_order;
pub use pool::TempoPool;

/// Function pointer type for job execution
///
/// Jobs receive a raw pointer to their argument struct and must cast it to
/// the appropriate type for safe access.
pub type JobFnPointer = fn(*const ());

/// Raw pointer to a job argument struct
///
/// This is type-erased for uniform storage but must be cast back to the
/// original argument type within the job function.
pub type JobArgPointer = *const ();

/// Convert a slice of uniform job arguments to type-erased arg pointers
///
/// Useful for batch submission when every job runs the same function over
/// its own argument struct. Convert once and reuse across resubmissions of
/// the same batch.
///
/// # Examples
///
/// ```rust
/// use tempo_pool::{
///     JobFnPointer, TempoPool, tp_define_job_fn, tp_job_params, tp_write,
///     uniform_args_to_pointers,
/// };
///
/// tp_job_params! {
///     Double { value: u64, result: *mut u64 }
/// }
///
/// tp_define_job_fn!(double_job, Double, |params| {
///     tp_write!(params.result, params.value * 2);
/// });
///
/// let pool = TempoPool::new();
/// let mut results = [0u64; 2];
/// let jobs = [
///     Double::new(1, &mut results[0]),
///     Double::new(2, &mut results[1]),
/// ];
///
/// let functions = vec![double_job as JobFnPointer; 2];
/// let args = uniform_args_to_pointers(&jobs);
///
/// pool.add_jobs(&functions, &args, None, None, None);
/// pool.wait();
/// assert_eq!(results, [2, 4]);
/// ```
#[inline]
pub fn uniform_args_to_pointers<T>(params_vec: &[T]) -> Vec<JobArgPointer> {
    params_vec
        .iter()
        .map(|params| params as *const T as JobArgPointer)
        .collect()
}
