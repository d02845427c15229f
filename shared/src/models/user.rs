//! User roles

use serde::{Deserialize, Serialize};

/// Role attached to a signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Some(Role::Admin),
            "staff" | "user" => Some(Role::Staff),
            "viewer" | "guest" => Some(Role::Viewer),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Staff => 2,
            Role::Viewer => 1,
        }
    }

    /// Whether this role carries at least the privileges of `required`
    pub fn satisfies(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Admin.satisfies(Role::Staff));
        assert!(Role::Staff.satisfies(Role::Staff));
        assert!(!Role::Viewer.satisfies(Role::Staff));
        assert!(!Role::Staff.satisfies(Role::Admin));
    }
}
