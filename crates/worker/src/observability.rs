use std::net::SocketAddr;

use anyhow::Result;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

const RECONCILIATIONS_TOTAL: &str = "clubhouse_sync_reconciliations_total";
const RECONCILIATION_DURATION_MS: &str = "clubhouse_sync_reconciliation_duration_ms";
const ASSIGNMENTS_INSERTED_TOTAL: &str = "clubhouse_sync_assignments_inserted_total";
const QUEUE_PENDING_GAUGE: &str = "clubhouse_sync_queue_pending_total";
const CYCLES_TOTAL: &str = "clubhouse_sync_cycles_total";
const AUDIT_ENQUEUED_TOTAL: &str = "clubhouse_sync_audit_enqueued_total";
const AUDIT_FAILURES_TOTAL: &str = "clubhouse_sync_audit_failures_total";

/// Installs the Prometheus recorder and its scrape listener.
pub fn init_metrics(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}

pub fn register_reconciliation(result: &'static str, duration_ms: f64) {
    counter!(RECONCILIATIONS_TOTAL, "result" => result).increment(1);
    histogram!(RECONCILIATION_DURATION_MS, "result" => result).record(duration_ms.max(0.0));
}

pub fn register_assignments_inserted(count: usize) {
    if count > 0 {
        counter!(ASSIGNMENTS_INSERTED_TOTAL).increment(count as u64);
    }
}

pub fn set_queue_pending(pending: usize) {
    gauge!(QUEUE_PENDING_GAUGE).set(pending as f64);
}

pub fn register_cycle() {
    counter!(CYCLES_TOTAL).increment(1);
}

pub fn register_audit(enqueued: usize) {
    counter!(AUDIT_ENQUEUED_TOTAL).increment(enqueued as u64);
}

pub fn register_audit_failure() {
    counter!(AUDIT_FAILURES_TOTAL).increment(1);
}
