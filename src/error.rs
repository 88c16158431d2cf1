use thiserror::Error;

/// Errors from pool configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max group work must be within (0, 1], got {0}")]
    MaxGroupWorkOutOfRange(f32),
}
