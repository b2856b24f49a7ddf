use crate::audit::AuditSink;
use crate::directory::{Directory, User};
use crate::error::DeployError;
use crate::provider::{Credential, MailProvider};
use crate::resolution::{ContextOverrides, RuleStore, TemplateResolutionService};
use crate::store::{
    Deployment, DeploymentStatus, DeploymentStore, HistoryStatus, UserDeploymentHistory,
};
use crate::templates::{RenderContext, SignatureRenderer, SignatureTemplate, TemplateStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Which mailboxes a deployment request covers
#[derive(Debug, Clone)]
pub enum TargetMode {
    /// The calling user only
    Me,
    /// The given directory ids, restricted to the caller's organization
    Selected(Vec<String>),
    /// Every directory member of the caller's organization
    All,
}

impl TargetMode {
    fn as_str(&self) -> &'static str {
        match self {
            TargetMode::Me => "me",
            TargetMode::Selected(_) => "selected",
            TargetMode::All => "all",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub template_id: String,
    pub target: TargetMode,
    /// Resolve a template per target through the signature rules instead of
    /// using `template_id` unconditionally
    pub use_rules: bool,
    /// Email context handed to rule resolution when `use_rules` is set
    pub email_context: ContextOverrides,
}

/// Authenticated identity starting the deployment. `auth_id` doubles as the
/// directory lookup key; email and display name cover the case where no
/// directory record exists yet.
#[derive(Debug, Clone)]
pub struct Caller {
    pub auth_id: String,
    pub organization_id: String,
    pub email: String,
    pub display_name: String,
}

/// One mailbox slated to receive a rendered signature. Immutable for the
/// duration of the run.
#[derive(Debug, Clone)]
pub struct DeploymentTarget {
    /// Absent for a transient "me" invocation before a directory record exists
    pub user_id: Option<String>,
    pub email: String,
    pub display_name: String,
    pub attributes: HashMap<String, String>,
}

impl From<User> for DeploymentTarget {
    fn from(user: User) -> Self {
        DeploymentTarget {
            user_id: Some(user.id),
            email: user.email,
            display_name: user.display_name,
            attributes: user.attributes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentSummary {
    pub deployment_id: String,
    pub success_count: u32,
    pub fail_count: u32,
}

/// Outcome of one target, reduced over the whole batch afterwards
struct TargetOutcome {
    /// Template attempted for this target (post rule-resolution)
    template_id: String,
    error: Option<String>,
}

/// Expands a deployment request into targets, resolves and renders a
/// signature per target, writes it through the mail provider, and tracks
/// outcomes on the deployment aggregate. One target's failure never aborts
/// the batch.
pub struct DeploymentEngine {
    directory: Arc<dyn Directory>,
    templates: Arc<dyn TemplateStore>,
    resolution: TemplateResolutionService,
    renderer: Arc<dyn SignatureRenderer>,
    provider: Arc<dyn MailProvider>,
    store: Arc<dyn DeploymentStore>,
    audit: Arc<dyn AuditSink>,
    credential: Credential,
    write_timeout: Duration,
    sequence: AtomicU64,
}

impl DeploymentEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        directory: Arc<dyn Directory>,
        templates: Arc<dyn TemplateStore>,
        rules: Arc<dyn RuleStore>,
        renderer: Arc<dyn SignatureRenderer>,
        provider: Arc<dyn MailProvider>,
        store: Arc<dyn DeploymentStore>,
        audit: Arc<dyn AuditSink>,
        credential: Credential,
        write_timeout: Duration,
    ) -> Self {
        let resolution =
            TemplateResolutionService::new(directory.clone(), templates.clone(), rules);
        DeploymentEngine {
            directory,
            templates,
            resolution,
            renderer,
            provider,
            store,
            audit,
            credential,
            write_timeout,
            sequence: AtomicU64::new(0),
        }
    }

    /// Run a deployment to completion over its expanded target list.
    ///
    /// Validation and target expansion fail fast with no side effects; after
    /// the deployment record exists, per-target failures are recorded and
    /// counted but never abort the remaining targets.
    pub async fn start_deployment(
        &self,
        caller: &Caller,
        request: DeploymentRequest,
    ) -> Result<DeploymentSummary, DeployError> {
        if request.template_id.trim().is_empty() {
            return Err(DeployError::Validation("template id is required".to_string()));
        }

        // tenant isolation: the requested template must exist in the caller's
        // organization, never bypassed as a fallback
        let template = self
            .templates
            .get_template(&request.template_id, &caller.organization_id)
            .ok_or_else(|| DeployError::not_found("template", request.template_id.clone()))?;

        let targets = self.expand_targets(caller, &request.target);
        if targets.is_empty() {
            return Err(DeployError::NoTargets);
        }

        let deployment_id = self.next_deployment_id();
        let deployment = Deployment {
            id: deployment_id.clone(),
            organization_id: caller.organization_id.clone(),
            template_id: request.template_id.clone(),
            status: DeploymentStatus::Running,
            total_users: targets.len() as u32,
            successful_count: 0,
            failed_count: 0,
            started_at: Utc::now(),
            finished_at: None,
        };
        self.store
            .create_deployment(deployment)
            .map_err(|e| DeployError::Persistence(e.to_string()))?;

        log::info!(
            "deployment {deployment_id}: {} target(s), mode={}, rules={}",
            targets.len(),
            request.target.as_str(),
            request.use_rules
        );

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in &targets {
            let outcome = self.process_target(caller, &request, &template, target).await;
            self.record_outcome(&deployment_id, target, &outcome);
            outcomes.push(outcome);
        }

        // single reduction over the collected outcomes
        let success_count = outcomes.iter().filter(|o| o.error.is_none()).count() as u32;
        let fail_count = outcomes.len() as u32 - success_count;
        let status = if success_count == 0 {
            DeploymentStatus::Failed
        } else {
            DeploymentStatus::Completed
        };

        if let Err(e) = self.store.finalize(&deployment_id, status, Utc::now()) {
            log::error!("deployment {deployment_id}: failed to finalize record: {e}");
        }

        let metadata = serde_json::json!({
            "target_mode": request.target.as_str(),
            "use_rules": request.use_rules,
            "total": targets.len(),
            "succeeded": success_count,
            "failed": fail_count,
        });
        if let Err(e) = self.audit.record(
            &caller.organization_id,
            &caller.auth_id,
            "signature_deployment",
            metadata,
        ) {
            log::warn!("deployment {deployment_id}: audit entry not recorded: {e}");
        }

        log::info!(
            "deployment {deployment_id} finished: {success_count} succeeded, {fail_count} failed"
        );
        Ok(DeploymentSummary {
            deployment_id,
            success_count,
            fail_count,
        })
    }

    /// Status polling passthroughs
    pub fn deployment(&self, deployment_id: &str) -> Option<Deployment> {
        self.store.get_deployment(deployment_id)
    }

    pub fn history(&self, deployment_id: &str) -> Vec<UserDeploymentHistory> {
        self.store.history_for(deployment_id)
    }

    fn next_deployment_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("dep-{}-{seq}", Utc::now().timestamp_millis())
    }

    fn expand_targets(&self, caller: &Caller, mode: &TargetMode) -> Vec<DeploymentTarget> {
        match mode {
            TargetMode::Me => match self.directory.get_user(&caller.auth_id) {
                Some(user) => vec![DeploymentTarget::from(user)],
                // no directory record yet: deploy to the claimed mailbox,
                // without per-user history
                None => vec![DeploymentTarget {
                    user_id: None,
                    email: caller.email.clone(),
                    display_name: caller.display_name.clone(),
                    attributes: HashMap::new(),
                }],
            },
            TargetMode::Selected(ids) => self
                .directory
                .users_by_org(&caller.organization_id, Some(ids.as_slice()))
                .into_iter()
                .map(DeploymentTarget::from)
                .collect(),
            TargetMode::All => self
                .directory
                .users_by_org(&caller.organization_id, None)
                .into_iter()
                .map(DeploymentTarget::from)
                .collect(),
        }
    }

    async fn process_target(
        &self,
        caller: &Caller,
        request: &DeploymentRequest,
        requested: &SignatureTemplate,
        target: &DeploymentTarget,
    ) -> TargetOutcome {
        let template = if request.use_rules {
            match self.template_for_target(caller, request, requested, target) {
                Ok(template) => template,
                Err(message) => {
                    return TargetOutcome {
                        template_id: requested.id.clone(),
                        error: Some(message),
                    }
                }
            }
        } else {
            requested.clone()
        };

        let render_context = RenderContext {
            display_name: target.display_name.clone(),
            email: target.email.clone(),
            attributes: target.attributes.clone(),
        };
        let html = match self.renderer.render(&template, &render_context) {
            Ok(html) => html,
            Err(e) => {
                return TargetOutcome {
                    template_id: template.id,
                    error: Some(format!("render failed: {e}")),
                }
            }
        };

        let write = self
            .provider
            .write_signature(&self.credential, &target.email, &html);
        let error = match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("provider write failed: {e}")),
            Err(_) => Some(format!(
                "provider write timed out after {}s",
                self.write_timeout.as_secs()
            )),
        };
        TargetOutcome {
            template_id: template.id,
            error,
        }
    }

    /// Rule-based template choice for one target. A resolved template that no
    /// longer exists falls back silently to the requested one; a resolution
    /// failure is this target's failure.
    fn template_for_target(
        &self,
        caller: &Caller,
        request: &DeploymentRequest,
        requested: &SignatureTemplate,
        target: &DeploymentTarget,
    ) -> Result<SignatureTemplate, String> {
        let Some(user_id) = &target.user_id else {
            return Ok(requested.clone());
        };
        match self.resolution.resolve_for_user(
            user_id,
            &caller.organization_id,
            &request.email_context,
        ) {
            Ok(Some(resolved_id)) if resolved_id != requested.id => {
                match self
                    .templates
                    .get_template(&resolved_id, &caller.organization_id)
                {
                    Some(template) => {
                        log::debug!(
                            "rules picked template {} over {} for {}",
                            template.id,
                            requested.id,
                            target.email
                        );
                        Ok(template)
                    }
                    None => {
                        log::debug!(
                            "resolved template {resolved_id} missing, keeping {} for {}",
                            requested.id,
                            target.email
                        );
                        Ok(requested.clone())
                    }
                }
            }
            Ok(_) => Ok(requested.clone()),
            Err(e) => Err(format!("template resolution failed: {e}")),
        }
    }

    fn record_outcome(&self, deployment_id: &str, target: &DeploymentTarget, outcome: &TargetOutcome) {
        if let Err(e) = self
            .store
            .record_target(deployment_id, outcome.error.is_none())
        {
            log::error!("deployment {deployment_id}: counter update failed: {e}");
        }

        // history rows require a directory record
        let Some(user_id) = &target.user_id else {
            log::debug!(
                "deployment {deployment_id}: {} has no directory record, no history row",
                target.email
            );
            return;
        };
        let row = UserDeploymentHistory {
            deployment_id: deployment_id.to_string(),
            user_id: user_id.clone(),
            template_id: outcome.template_id.clone(),
            status: match outcome.error {
                None => HistoryStatus::Completed,
                Some(_) => HistoryStatus::Failed,
            },
            error_message: outcome.error.clone(),
            deployed_at: Utc::now(),
        };
        if let Err(e) = self.store.append_history(row) {
            log::error!("deployment {deployment_id}: history row for {user_id} not written: {e}");
        }
    }
}
