//! Authentication types for the domain layer.
//!
//! `AuthenticatedUser` is what an upstream auth layer places on the request
//! once the caller has been identified. Billing handlers only read it.

use super::UserId;
use thiserror::Error;

/// Authenticated caller of a billing endpoint.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// The unique user identifier from the auth provider.
    pub id: UserId,

    /// User's email address.
    pub email: String,

    /// Display name if available.
    pub display_name: Option<String>,
}

impl AuthenticatedUser {
    /// Creates a new authenticated user.
    pub fn new(id: UserId, email: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            id,
            email: email.into(),
            display_name,
        }
    }

    /// Returns the user's display name, or email as fallback.
    pub fn display_name_or_email(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Authentication errors raised while building the user context.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No user identity was supplied.
    #[error("Authentication required")]
    Missing,

    /// The supplied identity could not be parsed.
    #[error("Invalid user identity: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_email() {
        let user = AuthenticatedUser::new(UserId::new("u1").unwrap(), "a@example.com", None);
        assert_eq!(user.display_name_or_email(), "a@example.com");

        let named = AuthenticatedUser::new(
            UserId::new("u1").unwrap(),
            "a@example.com",
            Some("Ada".to_string()),
        );
        assert_eq!(named.display_name_or_email(), "Ada");
    }
}
