/// Fire-and-forget audit sink. A failing sink never fails the operation that
/// produced the entry; callers log and move on.
pub trait AuditSink: Send + Sync {
    fn record(
        &self,
        org_id: &str,
        actor_id: &str,
        action: &str,
        metadata: serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// Writes audit entries to the log stream
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(
        &self,
        org_id: &str,
        actor_id: &str,
        action: &str,
        metadata: serde_json::Value,
    ) -> anyhow::Result<()> {
        log::info!("audit org={org_id} actor={actor_id} action={action} metadata={metadata}");
        Ok(())
    }
}
