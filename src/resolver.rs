use crate::domain::is_internal;
use crate::rules::{RecipientCondition, SenderCondition, SignatureRule};
use chrono::{DateTime, Utc};

pub use crate::rules::EmailType;

/// A rule with an empty `SpecificUsers`/`SpecificDepartments` selection
/// matches every sender. Flip this to make empty selections match nobody.
pub const EMPTY_SELECTION_MATCHES_ANY: bool = true;

/// Everything known about one outgoing email at resolution time.
/// Built per resolution call and discarded afterwards.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub sender_id: String,
    pub sender_email: String,
    pub sender_department: Option<String>,
    pub email_type: EmailType,
    pub recipients: Vec<String>,
    pub cc_recipients: Vec<String>,
    pub subject: Option<String>,
    pub organization_id: String,
    pub organization_domain: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        EvaluationContext {
            sender_id: String::new(),
            sender_email: String::new(),
            sender_department: None,
            email_type: EmailType::New,
            recipients: Vec::new(),
            cc_recipients: Vec::new(),
            subject: None,
            organization_id: String::new(),
            organization_domain: None,
            timestamp: Utc::now(),
        }
    }
}

impl EvaluationContext {
    /// To and Cc addresses together; both lists count for recipient
    /// classification.
    fn all_recipients(&self) -> impl Iterator<Item = &str> {
        self.recipients
            .iter()
            .chain(self.cc_recipients.iter())
            .map(String::as_str)
    }
}

fn sender_matches(rule: &SignatureRule, context: &EvaluationContext) -> bool {
    match &rule.sender_condition {
        SenderCondition::All => true,
        SenderCondition::SpecificUsers { user_ids } => {
            if user_ids.is_empty() {
                EMPTY_SELECTION_MATCHES_ANY
            } else {
                user_ids.contains(context.sender_id.as_str())
            }
        }
        SenderCondition::SpecificDepartments { departments } => {
            if departments.is_empty() {
                return EMPTY_SELECTION_MATCHES_ANY;
            }
            // a sender with no department never matches a department-scoped rule
            match context.sender_department.as_deref() {
                Some(department) => departments.contains(department),
                None => false,
            }
        }
    }
}

fn email_type_matches(rule: &SignatureRule, context: &EvaluationContext) -> bool {
    rule.email_type.matches(context.email_type)
}

fn recipients_match(rule: &SignatureRule, context: &EvaluationContext) -> bool {
    if rule.recipient_condition == RecipientCondition::All {
        return true;
    }
    // without an organization domain recipients cannot be classified
    let Some(domain) = context.organization_domain.as_deref() else {
        return false;
    };

    let mut internal = 0usize;
    let mut external = 0usize;
    for address in context.all_recipients() {
        if is_internal(address, domain) {
            internal += 1;
        } else {
            external += 1;
        }
    }
    let total = internal + external;

    match rule.recipient_condition {
        RecipientCondition::All => true,
        RecipientCondition::AllInternal => total > 0 && external == 0,
        RecipientCondition::AllExternal => total > 0 && internal == 0,
        RecipientCondition::AtLeastOneInternal => internal > 0,
        RecipientCondition::AtLeastOneExternal => external > 0,
    }
}

fn window_matches(rule: &SignatureRule, context: &EvaluationContext) -> bool {
    match &rule.active_window {
        Some(window) => window.contains(context.timestamp),
        None => true,
    }
}

fn subject_matches(rule: &SignatureRule, context: &EvaluationContext) -> bool {
    // no subject to test against: default-permit
    let Some(subject) = context.subject.as_deref() else {
        return true;
    };
    let subject = subject.to_lowercase();
    if let Some(needle) = &rule.subject_contains {
        if !subject.contains(&needle.to_lowercase()) {
            return false;
        }
    }
    if let Some(needle) = &rule.subject_not_contains {
        if subject.contains(&needle.to_lowercase()) {
            return false;
        }
    }
    true
}

/// A rule matches only when every condition dimension matches
pub fn rule_matches(rule: &SignatureRule, context: &EvaluationContext) -> bool {
    sender_matches(rule, context)
        && email_type_matches(rule, context)
        && recipients_match(rule, context)
        && window_matches(rule, context)
        && subject_matches(rule, context)
}

/// Return the template of the highest-priority active rule fully matching the
/// context, or `None`.
///
/// Ordering is descending priority with ascending rule id as the tie-break,
/// so resolution is deterministic regardless of input order.
pub fn resolve(rules: &[SignatureRule], context: &EvaluationContext) -> Option<String> {
    let mut active: Vec<&SignatureRule> = rules.iter().filter(|r| r.is_active).collect();
    active.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

    for rule in active {
        if rule_matches(rule, context) {
            log::debug!(
                "rule '{}' (priority {}) matched, selecting template {}",
                rule.name,
                rule.priority,
                rule.template_id
            );
            return Some(rule.template_id.clone());
        }
        log::trace!("rule '{}' did not match", rule.name);
    }

    log::debug!(
        "no signature rule matched for sender {}",
        context.sender_email
    );
    None
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::rules::EmailTypeCondition;
    use proptest::prelude::*;

    fn arbitrary_rule() -> impl Strategy<Value = SignatureRule> {
        (
            -5i32..5,
            any::<bool>(),
            prop_oneof![
                Just(EmailTypeCondition::All),
                Just(EmailTypeCondition::New),
                Just(EmailTypeCondition::Reply),
            ],
            prop_oneof![
                Just(RecipientCondition::All),
                Just(RecipientCondition::AllInternal),
                Just(RecipientCondition::AllExternal),
                Just(RecipientCondition::AtLeastOneInternal),
                Just(RecipientCondition::AtLeastOneExternal),
            ],
        )
            .prop_map(|(priority, is_active, email_type, recipient_condition)| {
                SignatureRule {
                    id: String::new(),
                    organization_id: "org-1".to_string(),
                    template_id: String::new(),
                    name: String::new(),
                    priority,
                    is_active,
                    sender_condition: crate::rules::SenderCondition::All,
                    email_type,
                    recipient_condition,
                    active_window: None,
                    subject_contains: None,
                    subject_not_contains: None,
                }
            })
    }

    /// Rule vectors with ids unique by position, so the id tie-break is
    /// unambiguous.
    fn arbitrary_rules(max: usize) -> impl Strategy<Value = Vec<SignatureRule>> {
        proptest::collection::vec(arbitrary_rule(), 0..max).prop_map(|rules| {
            rules
                .into_iter()
                .enumerate()
                .map(|(i, mut rule)| {
                    rule.id = format!("rule-{i}");
                    rule.template_id = format!("tpl-{i}");
                    rule.name = format!("rule {i}");
                    rule
                })
                .collect()
        })
    }

    fn arbitrary_context() -> impl Strategy<Value = EvaluationContext> {
        (
            prop_oneof![Just(EmailType::New), Just(EmailType::Reply)],
            proptest::collection::vec(
                prop_oneof![
                    Just("bob@acme.com".to_string()),
                    Just("client@external.com".to_string()),
                ],
                0..4,
            ),
            any::<bool>(),
        )
            .prop_map(|(email_type, recipients, has_domain)| EvaluationContext {
                sender_id: "user-1".to_string(),
                sender_email: "alice@acme.com".to_string(),
                email_type,
                recipients,
                organization_id: "org-1".to_string(),
                organization_domain: has_domain.then(|| "acme.com".to_string()),
                ..Default::default()
            })
    }

    /// Straight-line reference: best (priority desc, id asc) among full matches
    fn reference_resolve(rules: &[SignatureRule], ctx: &EvaluationContext) -> Option<String> {
        rules
            .iter()
            .filter(|r| r.is_active && rule_matches(r, ctx))
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| b.id.cmp(&a.id))
            })
            .map(|r| r.template_id.clone())
    }

    proptest! {
        #[test]
        fn resolve_agrees_with_reference(
            rules in arbitrary_rules(8),
            ctx in arbitrary_context(),
        ) {
            prop_assert_eq!(resolve(&rules, &ctx), reference_resolve(&rules, &ctx));
        }

        #[test]
        fn resolve_is_order_independent(
            rules in arbitrary_rules(8).prop_shuffle(),
            ctx in arbitrary_context(),
        ) {
            let mut reversed = rules.clone();
            reversed.reverse();
            prop_assert_eq!(resolve(&rules, &ctx), resolve(&reversed, &ctx));
        }

        #[test]
        fn non_matching_rule_priority_is_irrelevant(
            rules in arbitrary_rules(8).prop_filter("need at least one rule", |r| !r.is_empty()),
            ctx in arbitrary_context(),
            index in 0usize..8,
            new_priority in -5i32..5,
        ) {
            let index = index % rules.len();
            prop_assume!(!rule_matches(&rules[index], &ctx));

            let before = resolve(&rules, &ctx);
            let mut mutated = rules.clone();
            mutated[index].priority = new_priority;
            prop_assert_eq!(before, resolve(&mutated, &ctx));
        }
    }
}
