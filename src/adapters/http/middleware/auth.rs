//! Authentication middleware and extractors for axum.
//!
//! This module provides:
//! - `header_auth_middleware` - Layer that reads identity headers set by a
//!   trusted upstream proxy and injects the user into extensions
//! - `RequireAuth` - Extractor that requires authentication
//!
//! ```text
//! Request → header_auth_middleware → injects AuthenticatedUser into extensions
//!                                            ↓
//!                                    Handler → RequireAuth extractor reads from extensions
//! ```
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get, middleware};
//!
//! let app = Router::new()
//!     .route("/billing/portal", get(customer_portal))
//!     .layer(middleware::from_fn(header_auth_middleware));
//! ```

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_EMAIL_HEADER: &str = "X-User-Email";
pub const USER_NAME_HEADER: &str = "X-User-Name";

/// Builds the caller identity from the identity headers.
///
/// Returns `Ok(None)` when no user id header is present.
pub fn user_from_headers(headers: &HeaderMap) -> Result<Option<AuthenticatedUser>, AuthError> {
    let Some(raw_id) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let raw_id = raw_id
        .to_str()
        .map_err(|_| AuthError::Invalid("user id is not valid UTF-8".to_string()))?;
    let id = UserId::new(raw_id).map_err(|e| AuthError::Invalid(e.to_string()))?;

    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    };

    let email = header_str(USER_EMAIL_HEADER).unwrap_or_default();
    let display_name = header_str(USER_NAME_HEADER);

    Ok(Some(AuthenticatedUser::new(id, email, display_name)))
}

/// Injects the header-supplied identity into request extensions.
///
/// Requests without identity headers pass through unauthenticated; handlers
/// use `RequireAuth` to enforce authentication. Malformed identities are
/// rejected with 401.
pub async fn header_auth_middleware(mut request: Request, next: Next) -> Response {
    match user_from_headers(request.headers()) {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed identity headers");
            AuthRejection::Invalid.into_response()
        }
    }
}

/// Extractor that requires authentication.
///
/// If no user is in the request extensions, returns 401 Unauthorized.
///
/// # Example
///
/// ```ignore
/// async fn my_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> axum::extract::FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .cloned()
                .map(RequireAuth)
                .ok_or(AuthRejection::Unauthenticated)
        })
    }
}

/// Rejection for authentication extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No authenticated user on the request.
    Unauthenticated,

    /// Identity headers were present but unusable.
    Invalid,
}

#[derive(Serialize)]
struct AuthErrorBody {
    status: u16,
    message: &'static str,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let message = match self {
            AuthRejection::Unauthenticated => "Authentication required",
            AuthRejection::Invalid => "Invalid user identity",
        };

        (
            StatusCode::UNAUTHORIZED,
            Json(AuthErrorBody {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                message,
            }),
        )
            .into_response()
    }
}
