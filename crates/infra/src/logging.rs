use crate::config::AppConfig;
use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

const DRIVER_DIRECTIVE: &str = "surrealdb=warn";

pub fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_new(filter_directives(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new(filter_directives("info")));

    if config.is_production() {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_target(false)
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to install json subscriber: {err}"))?;
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to install subscriber: {err}"))?;
    }

    tracing::debug!(
        app_env = %config.app_env,
        log_level = %config.log_level,
        "tracing initialised"
    );
    Ok(())
}

// The driver logs every query at debug; keep it at warn unless asked for.
fn filter_directives(log_level: &str) -> String {
    let log_level = log_level.trim();
    if log_level.contains("surrealdb") {
        return log_level.to_string();
    }
    if log_level.is_empty() {
        return format!("info,{DRIVER_DIRECTIVE}");
    }
    format!("{log_level},{DRIVER_DIRECTIVE}")
}
