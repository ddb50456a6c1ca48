use garde::Validate;
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::user::Role,
};

/// The request payload for user registration.
#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[garde(email, length(max = 254))]
    pub email: String,
    #[garde(length(min = 5, max = 128))]
    pub password: String,
    #[garde(skip)]
    pub role: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl RegisterRequest {
    /// Validates the payload and returns the requested role.
    pub fn validated_role(&self) -> Result<Role> {
        self.validate()?;
        parse_role(&self.role)
    }
}

/// The request payload for user login. Not validated: a malformed email
/// fails exactly like a wrong one.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Validates a role name.
///
/// # Arguments
///
/// * `role` - `client` or `staff`.
pub fn parse_role(role: &str) -> Result<Role> {
    role.trim()
        .parse()
        .map_err(|_| AppError::Validation("Role must be 'client' or 'staff'".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, role: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_registration() {
        let role = request("staff@example.com", "pw123", "staff").validated_role().unwrap();
        assert_eq!(role, Role::Staff);
    }

    #[test]
    fn rejects_bad_email_short_password_and_unknown_role() {
        for bad in [
            request("not-an-email", "pw123", "client"),
            request("a@example.com", "pw", "client"),
            request("a@example.com", "pw123", "admin"),
        ] {
            assert!(matches!(bad.validated_role(), Err(AppError::Validation(_))));
        }
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered = format!("{:?}", request("a@example.com", "hunter22", "client"));
        assert!(!rendered.contains("hunter22"));
    }
}
