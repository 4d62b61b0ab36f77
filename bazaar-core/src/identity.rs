use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// An authenticated caller, as vouched for by the session collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

impl Principal {
    pub fn new(id: Uuid, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            is_admin: false,
        }
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    /// Fails unless the caller carries the admin flag.
    pub fn ensure_admin(&self) -> Result<(), CoreError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(CoreError::IdentityError(format!(
                "user {} is not an admin",
                self.id
            )))
        }
    }
}
