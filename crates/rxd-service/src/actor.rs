use rxd_schemas::{Role, User};
use serde::Serialize;
use uuid::Uuid;

use crate::ServiceError;

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub name: String,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            name: user.name.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        self.require_role(&[Role::Admin])
    }

    pub fn require_role(&self, allowed: &[Role]) -> Result<(), ServiceError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ServiceError::forbidden(format!(
                "role {} may not perform this action",
                self.role.as_str()
            )))
        }
    }
}
