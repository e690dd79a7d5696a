use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("assignment already exists: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Storage(String),
}
