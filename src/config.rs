use crate::directory::{Organization, User};
use crate::rules::{
    EmailTypeCondition, RecipientCondition, SenderCondition, SignatureRule,
};
use crate::templates::SignatureTemplate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Application configuration: runtime settings plus an organization snapshot
/// (org metadata, users, templates, rules) that backs the in-memory stores
/// for the offline CLI modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Upper bound on each individual provider write
    #[serde(default = "default_write_timeout")]
    pub provider_write_timeout_seconds: u64,
    pub organization: Organization,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub templates: Vec<SignatureTemplate>,
    #[serde(default)]
    pub rules: Vec<SignatureRule>,
}

fn default_write_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider_write_timeout_seconds: default_write_timeout(),
            organization: Organization {
                id: "org-acme".to_string(),
                name: "Acme Corp".to_string(),
                domain: Some("acme.com".to_string()),
            },
            users: vec![
                User {
                    id: "user-alice".to_string(),
                    organization_id: "org-acme".to_string(),
                    email: "alice@acme.com".to_string(),
                    display_name: "Alice Doe".to_string(),
                    department: Some("Sales".to_string()),
                    attributes: HashMap::from([(
                        "title".to_string(),
                        "Account Executive".to_string(),
                    )]),
                },
                User {
                    id: "user-bob".to_string(),
                    organization_id: "org-acme".to_string(),
                    email: "bob@acme.com".to_string(),
                    display_name: "Bob Lin".to_string(),
                    department: Some("Engineering".to_string()),
                    attributes: HashMap::new(),
                },
            ],
            templates: vec![
                SignatureTemplate {
                    id: "tpl-standard".to_string(),
                    organization_id: "org-acme".to_string(),
                    name: "Company standard".to_string(),
                    is_default: true,
                    blocks: json!([
                        { "kind": "text", "content": "{{display_name}}" },
                        { "kind": "text", "content": "{{title}}" },
                        { "kind": "text", "content": "{{email}}" },
                    ]),
                },
                SignatureTemplate {
                    id: "tpl-sales-outreach".to_string(),
                    organization_id: "org-acme".to_string(),
                    name: "Sales outreach".to_string(),
                    is_default: false,
                    blocks: json!([
                        { "kind": "text", "content": "{{display_name}} | {{title}}" },
                        { "kind": "text", "content": "Book a call: {{scheduling_link}}" },
                    ]),
                },
            ],
            rules: vec![SignatureRule {
                id: "rule-sales-external".to_string(),
                organization_id: "org-acme".to_string(),
                template_id: "tpl-sales-outreach".to_string(),
                name: "Sales, new external mail".to_string(),
                priority: 10,
                is_active: true,
                sender_condition: SenderCondition::SpecificDepartments {
                    departments: ["Sales".to_string()].into(),
                },
                email_type: EmailTypeCondition::New,
                recipient_condition: RecipientCondition::AtLeastOneExternal,
                active_window: None,
                subject_contains: None,
                subject_not_contains: None,
            }],
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Lint the snapshot for referential problems. Warnings, not errors:
    /// the engine tolerates all of these at runtime.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let template_ids: Vec<&str> = self.templates.iter().map(|t| t.id.as_str()).collect();

        if !self.templates.iter().any(|t| t.is_default) {
            warnings.push(
                "no default template: users without a matching rule get no signature".to_string(),
            );
        }

        for rule in &self.rules {
            if rule.organization_id != self.organization.id {
                warnings.push(format!(
                    "rule '{}' belongs to organization {}, not {}",
                    rule.name, rule.organization_id, self.organization.id
                ));
            }
            if !template_ids.contains(&rule.template_id.as_str()) {
                warnings.push(format!(
                    "rule '{}' targets unknown template {}",
                    rule.name, rule.template_id
                ));
            }
            match &rule.sender_condition {
                SenderCondition::SpecificUsers { user_ids } if user_ids.is_empty() => {
                    warnings.push(format!(
                        "rule '{}' selects specific users but lists none (matches every sender)",
                        rule.name
                    ));
                }
                SenderCondition::SpecificDepartments { departments } if departments.is_empty() => {
                    warnings.push(format!(
                        "rule '{}' selects specific departments but lists none (matches every sender)",
                        rule.name
                    ));
                }
                _ => {}
            }
        }

        if self.organization.domain.is_none()
            && self
                .rules
                .iter()
                .any(|r| r.recipient_condition != RecipientCondition::All)
        {
            warnings.push(
                "organization has no domain: recipient-scoped rules can never match".to_string(),
            );
        }

        warnings
    }
}
