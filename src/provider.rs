use async_trait::async_trait;

/// Opaque provider credential for the organization's mail tenant
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
}

/// Bridge to the mail provider's signature-write API. One call per mailbox;
/// the orchestrator bounds each call with its own timeout.
#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn write_signature(
        &self,
        credential: &Credential,
        mailbox: &str,
        html: &str,
    ) -> anyhow::Result<()>;
}

/// Demo provider: logs the write and succeeds
pub struct LoggingMailProvider;

#[async_trait]
impl MailProvider for LoggingMailProvider {
    async fn write_signature(
        &self,
        _credential: &Credential,
        mailbox: &str,
        html: &str,
    ) -> anyhow::Result<()> {
        log::info!("would write {} bytes of signature HTML to {mailbox}", html.len());
        Ok(())
    }
}
