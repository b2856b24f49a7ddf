use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Running,
    /// At least one target succeeded (partial failure still completes)
    Completed,
    /// Every target failed
    Failed,
}

/// Aggregate record for one deployment run. `template_id` is the template the
/// caller requested; rule resolution may substitute a different one per
/// target, visible only in that target's history row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub organization_id: String,
    pub template_id: String,
    pub status: DeploymentStatus,
    pub total_users: u32,
    pub successful_count: u32,
    pub failed_count: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryStatus {
    Completed,
    Failed,
}

/// Per-target outcome row, immutable once written. A retry appends a new row.
/// Targets without a directory record produce no row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDeploymentHistory {
    pub deployment_id: String,
    pub user_id: String,
    /// The template actually applied to this user, post rule-resolution
    pub template_id: String,
    pub status: HistoryStatus,
    pub error_message: Option<String>,
    pub deployed_at: DateTime<Utc>,
}

/// Persistence seam for deployment aggregates and history rows
pub trait DeploymentStore: Send + Sync {
    fn create_deployment(&self, deployment: Deployment) -> anyhow::Result<()>;

    /// Bump the success or fail counter as one target completes
    fn record_target(&self, deployment_id: &str, succeeded: bool) -> anyhow::Result<()>;

    fn append_history(&self, row: UserDeploymentHistory) -> anyhow::Result<()>;

    fn finalize(
        &self,
        deployment_id: &str,
        status: DeploymentStatus,
        finished_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    fn get_deployment(&self, deployment_id: &str) -> Option<Deployment>;

    fn history_for(&self, deployment_id: &str) -> Vec<UserDeploymentHistory>;
}

#[derive(Default)]
struct StoreInner {
    deployments: HashMap<String, Deployment>,
    history: Vec<UserDeploymentHistory>,
}

#[derive(Default)]
pub struct InMemoryDeploymentStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("deployment store lock poisoned"))
    }
}

impl DeploymentStore for InMemoryDeploymentStore {
    fn create_deployment(&self, deployment: Deployment) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        inner.deployments.insert(deployment.id.clone(), deployment);
        Ok(())
    }

    fn record_target(&self, deployment_id: &str, succeeded: bool) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        let deployment = inner
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| anyhow::anyhow!("unknown deployment {deployment_id}"))?;
        if succeeded {
            deployment.successful_count += 1;
        } else {
            deployment.failed_count += 1;
        }
        Ok(())
    }

    fn append_history(&self, row: UserDeploymentHistory) -> anyhow::Result<()> {
        self.lock()?.history.push(row);
        Ok(())
    }

    fn finalize(
        &self,
        deployment_id: &str,
        status: DeploymentStatus,
        finished_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        let deployment = inner
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| anyhow::anyhow!("unknown deployment {deployment_id}"))?;
        deployment.status = status;
        deployment.finished_at = Some(finished_at);
        Ok(())
    }

    fn get_deployment(&self, deployment_id: &str) -> Option<Deployment> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.deployments.get(deployment_id).cloned())
    }

    fn history_for(&self, deployment_id: &str) -> Vec<UserDeploymentHistory> {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .history
                    .iter()
                    .filter(|row| row.deployment_id == deployment_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
