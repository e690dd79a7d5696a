pub mod observability;
pub mod sync_worker;

pub use sync_worker::{
    AchievementSyncHandle, AchievementSyncWorker, CycleSummary, SyncStatsSnapshot,
    SyncWorkerError, WorkerState,
};
