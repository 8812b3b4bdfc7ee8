//! Role-based access control.
//!
//! Every surface that touches catalog data asks [`evaluate`] (directly or via
//! [`Principal::require`]) whether an operation is allowed. A principal may
//! hold several roles; the most permissive one wins. A request without a
//! resolved principal is denied before any role is looked at.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Catalog roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "viewer" => Ok(Role::Viewer),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Operation requested on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Read,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Policy table for a single role
pub const fn role_grants(role: Role, operation: Operation) -> bool {
    match role {
        Role::Admin => true,
        Role::Manager => !matches!(operation, Operation::Delete),
        Role::Viewer => matches!(operation, Operation::Read),
    }
}

/// Evaluate an operation for an optional set of held roles.
///
/// `None` means no authenticated principal and always denies.
pub fn evaluate<'a, I>(roles: Option<I>, operation: Operation) -> Decision
where
    I: IntoIterator<Item = &'a Role>,
{
    match roles {
        Some(roles) => {
            if roles.into_iter().any(|role| role_grants(*role, operation)) {
                Decision::Allow
            } else {
                Decision::Deny
            }
        }
        None => Decision::Deny,
    }
}

/// Authenticated caller resolved from a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Principal {
    pub user_id: i32,
    pub login: String,
    #[schema(value_type = Vec<Role>)]
    pub roles: BTreeSet<Role>,
}

impl Principal {
    pub fn can(&self, operation: Operation) -> bool {
        evaluate(Some(&self.roles), operation) == Decision::Allow
    }

    /// Fail with a permission error when no held role grants `operation`
    pub fn require(&self, operation: Operation) -> AppResult<()> {
        if self.can(operation) {
            return Ok(());
        }
        tracing::info!(
            user_id = self.user_id,
            operation = operation.as_str(),
            "Access denied"
        );
        Err(AppError::Authorization(format!(
            "Insufficient rights to {} this resource",
            operation.as_str()
        )))
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// Require administrator privileges (user management)
    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }
}

/// Authentication first, then role evaluation
pub fn authorize(principal: Option<&Principal>, operation: Operation) -> AppResult<&Principal> {
    let principal = principal
        .ok_or_else(|| AppError::Authentication("Authentication credentials were not provided".to_string()))?;
    principal.require(operation)?;
    Ok(principal)
}
