use crate::error::ConfigError;

/// Policy a worker uses to build its next work group when it pulls from the
/// queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScheduleStrategy {
    /// One job per pull.
    #[default]
    SingleJob,
    /// Greedy run of head jobs bounded by a share of the remaining expected
    /// work, so workers finish near-simultaneously.
    MultiJob,
    /// Jobs are pre-packed into one group per worker at submission time,
    /// balanced by their historical runtimes.
    Static,
}

/// Pool configuration, consumed by [`TempoPool::with_config`].
///
/// The builder methods chain; only [`max_group_work`] can reject its input.
///
/// [`TempoPool::with_config`]: crate::TempoPool::with_config
/// [`max_group_work`]: PoolConfig::max_group_work
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub(crate) threads: usize,
    pub(crate) strategy: ScheduleStrategy,
    pub(crate) max_group_work: f32,
    pub(crate) time_meas: u32,
    pub(crate) verbose: bool,
    pub(crate) disabled: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            threads: 2,
            strategy: ScheduleStrategy::SingleJob,
            max_group_work: 0.75,
            time_meas: 10,
            verbose: false,
            disabled: false,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        PoolConfig::default()
    }

    /// Number of worker threads. Zero disables the pool: submissions run
    /// inline on the caller thread and no workers are spawned.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    pub fn strategy(mut self, strategy: ScheduleStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Cap on the fraction of the remaining expected work a single
    /// [`MultiJob`](ScheduleStrategy::MultiJob) pull may claim. Must lie in
    /// `(0, 1]`.
    pub fn max_group_work(mut self, v: f32) -> Result<Self, ConfigError> {
        self.max_group_work = validate_max_group_work(v)?;
        Ok(self)
    }

    /// Number of historical samples the caller's moving average is assumed
    /// to hold; see [`update_order`](crate::update_order).
    pub fn time_meas(mut self, n: u32) -> Self {
        self.time_meas = n;
        self
    }

    /// Emit per-pull scheduling diagnostics through the `log` crate.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Bypass the workers entirely; submissions execute synchronously on the
    /// caller thread.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

pub(crate) fn validate_max_group_work(v: f32) -> Result<f32, ConfigError> {
    if v > 0.0 && v <= 1.0 {
        Ok(v)
    } else {
        Err(ConfigError::MaxGroupWorkOutOfRange(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PoolConfig::default();
        assert_eq!(config.threads, 2);
        assert_eq!(config.strategy, ScheduleStrategy::SingleJob);
        assert_eq!(config.max_group_work, 0.75);
        assert_eq!(config.time_meas, 10);
        assert!(!config.verbose);
        assert!(!config.disabled);
    }

    #[test]
    fn max_group_work_rejects_out_of_range() {
        assert!(PoolConfig::new().max_group_work(0.0).is_err());
        assert!(PoolConfig::new().max_group_work(-0.5).is_err());
        assert!(PoolConfig::new().max_group_work(1.5).is_err());
        assert!(PoolConfig::new().max_group_work(f32::NAN).is_err());
        assert!(PoolConfig::new().max_group_work(1.0).is_ok());
        assert!(PoolConfig::new().max_group_work(0.25).is_ok());
    }
}
