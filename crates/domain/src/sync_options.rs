use std::time::Duration;

use crate::DomainResult;
use crate::error::DomainError;

pub const DEFAULT_PROCESSING_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Static settings for the achievement sync worker, read once at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    /// Wait between drain cycles.
    pub processing_interval: Duration,
    /// Upper bound on events drained per cycle. Must be at least 1.
    pub max_batch_size: usize,
    /// Upper bound on reconciliations running at once within a cycle. Must be at least 1.
    pub max_concurrency: usize,
    pub run_audit_on_startup: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            processing_interval: DEFAULT_PROCESSING_INTERVAL,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            run_audit_on_startup: true,
        }
    }
}

impl SyncOptions {
    /// A zero batch size would never drain and zero permits would deadlock the
    /// fan-out, so both are rejected here instead of at runtime.
    pub fn validate(self) -> DomainResult<Self> {
        if self.processing_interval.is_zero() {
            return Err(DomainError::Validation(
                "processing_interval must be greater than zero".into(),
            ));
        }
        if self.max_batch_size < 1 {
            return Err(DomainError::Validation(
                "max_batch_size must be at least 1".into(),
            ));
        }
        if self.max_concurrency < 1 {
            return Err(DomainError::Validation(
                "max_concurrency must be at least 1".into(),
            ));
        }
        Ok(self)
    }
}
