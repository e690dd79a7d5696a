pub mod error;
pub mod grade_sync;
pub mod members;
pub mod ports;
pub mod reconciliation;
pub mod sync_options;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
