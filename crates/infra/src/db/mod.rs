use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clubhouse_domain::DomainResult;
use clubhouse_domain::error::DomainError;
use clubhouse_domain::ports::BoxFuture;
use clubhouse_domain::ports::health::StoreHealth;
use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::config::AppConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DbConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.surreal_endpoint.clone(),
            namespace: config.surreal_ns.clone(),
            database: config.surreal_db.clone(),
            username: config.surreal_user.clone(),
            password: config.surreal_pass.clone(),
        }
    }

    /// Opens a signed-in client scoped to the configured namespace and database.
    pub async fn connect(&self) -> anyhow::Result<Arc<Surreal<Any>>> {
        let endpoint = normalize_endpoint(&self.endpoint);
        let db = any::connect(endpoint.as_str())
            .await
            .with_context(|| format!("connect surrealdb endpoint {endpoint}"))?;
        db.signin(Root {
            username: self.username.clone(),
            password: self.password.clone(),
        })
        .await
        .context("surreal root signin")?;
        db.use_ns(&self.namespace)
            .use_db(&self.database)
            .await
            .context("select surrealdb namespace/database")?;
        Ok(Arc::new(db))
    }
}

#[derive(Debug, Clone)]
pub struct SurrealAdapter {
    config: DbConfig,
}

impl SurrealAdapter {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }
}

impl StoreHealth for SurrealAdapter {
    fn backend(&self) -> &'static str {
        "surrealdb"
    }

    fn health_check(&self) -> BoxFuture<'_, DomainResult<()>> {
        let endpoint = self.config.endpoint.clone();
        let ns = self.config.namespace.clone();
        let db = self.config.database.clone();

        Box::pin(async move {
            let address = parse_socket_address(&endpoint)?;
            let connect = timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
                .await
                .map_err(|_| DomainError::Storage("surreal endpoint connect timed out".into()))?;
            connect.map_err(|err| {
                DomainError::Storage(format!("surreal endpoint connect failed: {err}"))
            })?;

            tracing::debug!(
                endpoint,
                namespace = ns,
                database = db,
                "surreal health check succeeded"
            );
            Ok(())
        })
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("ws://{endpoint}")
    }
}

fn parse_socket_address(endpoint: &str) -> DomainResult<String> {
    let normalized = normalize_endpoint(endpoint);
    let parsed = Url::parse(&normalized).map_err(|err| {
        DomainError::Validation(format!("invalid surreal endpoint '{endpoint}': {err}"))
    })?;

    let host = parsed.host_str().ok_or_else(|| {
        DomainError::Validation(format!("missing surreal host in endpoint '{endpoint}'"))
    })?;
    let port = parsed.port_or_known_default().unwrap_or(8000);
    Ok(format!("{host}:{port}"))
}
