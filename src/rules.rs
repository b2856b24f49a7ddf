use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Who a rule applies to, keyed on the sending user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SenderCondition {
    All,
    SpecificUsers {
        #[serde(default)]
        user_ids: HashSet<String>,
    },
    SpecificDepartments {
        #[serde(default)]
        departments: HashSet<String>,
    },
}

impl Default for SenderCondition {
    fn default() -> Self {
        SenderCondition::All
    }
}

/// Kind of outgoing email being composed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailType {
    New,
    Reply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EmailTypeCondition {
    #[default]
    All,
    New,
    Reply,
}

impl EmailTypeCondition {
    pub fn matches(self, email_type: EmailType) -> bool {
        match self {
            EmailTypeCondition::All => true,
            EmailTypeCondition::New => email_type == EmailType::New,
            EmailTypeCondition::Reply => email_type == EmailType::Reply,
        }
    }
}

/// Constraint on the internal/external mix of the recipient list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecipientCondition {
    #[default]
    All,
    AllInternal,
    AllExternal,
    AtLeastOneInternal,
    AtLeastOneExternal,
}

/// Optional validity window. An unset bound is unconstrained on that side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveWindow {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl ActiveWindow {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if timestamp > end {
                return false;
            }
        }
        true
    }
}

/// A named, prioritized condition set that selects a signature template when
/// every condition is satisfied by the evaluation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRule {
    pub id: String,
    pub organization_id: String,
    pub template_id: String,
    pub name: String,
    /// Higher priority rules are evaluated first
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub sender_condition: SenderCondition,
    #[serde(default)]
    pub email_type: EmailTypeCondition,
    #[serde(default)]
    pub recipient_condition: RecipientCondition,
    #[serde(default)]
    pub active_window: Option<ActiveWindow>,
    /// Case-insensitive substring the subject must contain
    #[serde(default)]
    pub subject_contains: Option<String>,
    /// Case-insensitive substring the subject must not contain
    #[serde(default)]
    pub subject_not_contains: Option<String>,
}

fn default_active() -> bool {
    true
}
