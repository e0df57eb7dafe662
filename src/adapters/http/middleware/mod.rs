//! HTTP middleware for axum.
//!
//! - `auth` - Identity header middleware and extractors

pub mod auth;

pub use auth::{header_auth_middleware, user_from_headers, AuthRejection, RequireAuth};
