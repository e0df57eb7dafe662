//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, the authenticated user context, and error types
//! used across the billing domain.

mod auth;
mod errors;
mod ids;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{CustomerRecordId, UserId};
