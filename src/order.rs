use log::debug;

/// Fold fresh measurements into the caller's moving averages and emit a new
/// execution permutation.
///
/// Each `avg_elapsed[i]` becomes `(avg_elapsed[i] * n_time_meas + elapsed[i])
/// / (n_time_meas + 1)`. `order[i]` is then set to the rank of job `i` when
/// sorted descending by the updated average: the most expensive job gets rank
/// 0. Equally expensive jobs keep their relative order.
///
/// When every `elapsed` sample is zero there is no signal and both
/// `avg_elapsed` and `order` are left untouched.
///
/// The intent is that the caller passes `order` back into the next batch
/// submission, so slow jobs start first and dominate the critical path while
/// short jobs fill in behind them.
pub fn update_order(
    avg_elapsed: &mut [f32],
    n_time_meas: u32,
    elapsed: &[f32],
    order: &mut [usize],
) {
    let n_jobs = avg_elapsed.len();
    if n_jobs == 0 {
        return;
    }
    assert_eq!(elapsed.len(), n_jobs, "elapsed length mismatch");
    assert_eq!(order.len(), n_jobs, "order length mismatch");

    if elapsed.iter().all(|&t| t == 0.0) {
        debug!("order not updated: all times are zero");
        return;
    }

    let n = n_time_meas as f32;
    for (avg, &sample) in avg_elapsed.iter_mut().zip(elapsed) {
        *avg = (*avg * n + sample) / (n + 1.0);
    }

    let mut ranked: Vec<usize> = (0..n_jobs).collect();
    ranked.sort_by(|&a, &b| avg_elapsed[b].total_cmp(&avg_elapsed[a]));
    for (rank, &job) in ranked.iter().enumerate() {
        order[job] = rank;
    }

    debug!(
        "new order ({} samples): {:?}",
        n_time_meas + 1,
        order
    );
}
