use crate::DomainResult;
use crate::ports::BoxFuture;

/// Liveness check for a backing store, run once before the worker starts.
pub trait StoreHealth: Send + Sync {
    fn backend(&self) -> &'static str;
    fn health_check(&self) -> BoxFuture<'_, DomainResult<()>>;
}
