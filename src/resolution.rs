use crate::directory::Directory;
use crate::error::DeployError;
use crate::resolver::{self, EmailType, EvaluationContext};
use crate::rules::SignatureRule;
use crate::templates::TemplateStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Active rules for one organization, read as a snapshot per resolution
pub trait RuleStore: Send + Sync {
    fn active_rules(&self, org_id: &str) -> Vec<SignatureRule>;
}

pub struct InMemoryRuleStore {
    rules: Vec<SignatureRule>,
}

impl InMemoryRuleStore {
    pub fn new(rules: Vec<SignatureRule>) -> Self {
        InMemoryRuleStore { rules }
    }
}

impl RuleStore for InMemoryRuleStore {
    fn active_rules(&self, org_id: &str) -> Vec<SignatureRule> {
        self.rules
            .iter()
            .filter(|r| r.organization_id == org_id && r.is_active)
            .cloned()
            .collect()
    }
}

/// Caller-supplied pieces of the evaluation context, merged over the defaults
/// derived from the user record.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub email_type: Option<EmailType>,
    pub recipients: Option<Vec<String>>,
    pub cc_recipients: Option<Vec<String>>,
    pub subject: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Resolves which template applies to a user by matching the organization's
/// rules against an evaluation context built from the user record plus
/// caller overrides.
pub struct TemplateResolutionService {
    directory: Arc<dyn Directory>,
    templates: Arc<dyn TemplateStore>,
    rules: Arc<dyn RuleStore>,
}

impl TemplateResolutionService {
    pub fn new(
        directory: Arc<dyn Directory>,
        templates: Arc<dyn TemplateStore>,
        rules: Arc<dyn RuleStore>,
    ) -> Self {
        TemplateResolutionService {
            directory,
            templates,
            rules,
        }
    }

    /// Template id of the best matching rule, or `None` when no rule matches.
    /// Fails with `NotFound` when the user has no directory record.
    pub fn resolve_for_user(
        &self,
        user_id: &str,
        org_id: &str,
        overrides: &ContextOverrides,
    ) -> Result<Option<String>, DeployError> {
        let user = self
            .directory
            .get_user(user_id)
            .ok_or_else(|| DeployError::not_found("user", user_id))?;
        let organization_domain = self
            .directory
            .get_organization(org_id)
            .and_then(|org| org.domain);

        let rules = self.rules.active_rules(org_id);
        let context = EvaluationContext {
            sender_id: user.id,
            sender_email: user.email,
            sender_department: user.department,
            email_type: overrides.email_type.unwrap_or(EmailType::New),
            recipients: overrides.recipients.clone().unwrap_or_default(),
            cc_recipients: overrides.cc_recipients.clone().unwrap_or_default(),
            subject: overrides.subject.clone(),
            organization_id: org_id.to_string(),
            organization_domain,
            timestamp: overrides.timestamp.unwrap_or_else(Utc::now),
        };

        Ok(resolver::resolve(&rules, &context))
    }

    /// Like [`resolve_for_user`](Self::resolve_for_user), falling back to the
    /// organization's default template. `None` means no usable template
    /// exists at all.
    pub fn resolve_with_fallback(
        &self,
        user_id: &str,
        org_id: &str,
        overrides: &ContextOverrides,
    ) -> Result<Option<String>, DeployError> {
        if let Some(template_id) = self.resolve_for_user(user_id, org_id, overrides)? {
            return Ok(Some(template_id));
        }
        Ok(self.templates.default_template(org_id).map(|t| t.id))
    }
}
