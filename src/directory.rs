use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A directory member eligible to receive a deployed signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub organization_id: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub department: Option<String>,
    /// Profile fields interpolated into rendered signatures
    /// (job title, phone, social links, scheduling link, ...)
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    /// Mail domain used to classify recipients as internal or external
    #[serde(default)]
    pub domain: Option<String>,
}

/// Read-only view of the user directory. Treated as a snapshot for the
/// duration of one deployment run.
pub trait Directory: Send + Sync {
    fn get_user(&self, auth_id: &str) -> Option<User>;

    /// Members of the organization, optionally restricted to the given ids.
    /// Ids outside the organization are silently dropped.
    fn users_by_org(&self, org_id: &str, ids: Option<&[String]>) -> Vec<User>;

    fn get_organization(&self, org_id: &str) -> Option<Organization>;
}

pub struct InMemoryDirectory {
    organizations: Vec<Organization>,
    users: Vec<User>,
}

impl InMemoryDirectory {
    pub fn new(organizations: Vec<Organization>, users: Vec<User>) -> Self {
        InMemoryDirectory {
            organizations,
            users,
        }
    }
}

impl Directory for InMemoryDirectory {
    fn get_user(&self, auth_id: &str) -> Option<User> {
        self.users.iter().find(|u| u.id == auth_id).cloned()
    }

    fn users_by_org(&self, org_id: &str, ids: Option<&[String]>) -> Vec<User> {
        self.users
            .iter()
            .filter(|u| u.organization_id == org_id)
            .filter(|u| ids.map_or(true, |ids| ids.contains(&u.id)))
            .cloned()
            .collect()
    }

    fn get_organization(&self, org_id: &str) -> Option<Organization> {
        self.organizations.iter().find(|o| o.id == org_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, org: &str) -> User {
        User {
            id: id.to_string(),
            organization_id: org.to_string(),
            email: format!("{id}@acme.com"),
            display_name: id.to_string(),
            department: None,
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn test_users_by_org_scopes_selected_ids() {
        let directory = InMemoryDirectory::new(
            vec![],
            vec![user("a", "org-1"), user("b", "org-1"), user("c", "org-2")],
        );

        let all = directory.users_by_org("org-1", None);
        assert_eq!(all.len(), 2);

        // selecting an id from another organization yields nothing
        let ids = vec!["b".to_string(), "c".to_string()];
        let selected = directory.users_by_org("org-1", Some(ids.as_slice()));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "b");
    }
}
