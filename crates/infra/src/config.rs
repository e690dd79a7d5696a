use std::time::Duration;

use clubhouse_domain::DomainResult;
use clubhouse_domain::sync_options::SyncOptions;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub log_level: String,
    pub data_backend: String,
    pub surreal_endpoint: String,
    pub surreal_ns: String,
    pub surreal_db: String,
    pub surreal_user: String,
    pub surreal_pass: String,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
    pub sync_processing_interval_ms: u64,
    pub sync_max_batch_size: usize,
    pub sync_max_concurrency: usize,
    pub sync_run_audit_on_startup: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = Self::builder()?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
    {
        config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("log_level", "info")?
            .set_default("data_backend", "memory")?
            .set_default("surreal_endpoint", "ws://127.0.0.1:8000")?
            .set_default("surreal_ns", "clubhouse")?
            .set_default("surreal_db", "members")?
            .set_default("surreal_user", "root")?
            .set_default("surreal_pass", "root")?
            .set_default("metrics_enabled", true)?
            .set_default("metrics_port", 9464)?
            .set_default("sync_processing_interval_ms", 5000)?
            .set_default("sync_max_batch_size", 100)?
            .set_default("sync_max_concurrency", 4)?
            .set_default("sync_run_audit_on_startup", true)
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn uses_surreal(&self) -> bool {
        self.data_backend.eq_ignore_ascii_case("surreal")
    }

    /// Builds the worker settings, rejecting values that would stall the loop.
    pub fn sync_options(&self) -> DomainResult<SyncOptions> {
        SyncOptions {
            processing_interval: Duration::from_millis(self.sync_processing_interval_ms),
            max_batch_size: self.sync_max_batch_size,
            max_concurrency: self.sync_max_concurrency,
            run_audit_on_startup: self.sync_run_audit_on_startup,
        }
        .validate()
    }
}
