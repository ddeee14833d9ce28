//! # Authentication Middleware
//!
//! Bearer token middleware that binds every request to a user.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {user_id}:{secret}   (AUTH_TOKEN configured)
//! Bearer {user_id}            (development, no AUTH_TOKEN)
//! ```
//!
//! The user id is a UUID. The secret is compared in constant time against
//! the configured token. Health probes, metrics and the OpenAPI document
//! are mounted outside this middleware.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;

use blindate_core::UserId;

use crate::error::{AppError, ErrorBody, ErrorDetail};

/// The authenticated user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: UserId,
}

impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Constant-time comparison of bearer secrets.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{user_id}[:{secret}]`, checking the secret when one is expected.
pub fn parse_bearer_token(
    provided: &str,
    expected_secret: Option<&str>,
) -> Result<CallerIdentity, String> {
    let (user_part, secret) = match provided.split_once(':') {
        Some((user, secret)) => (user, Some(secret)),
        None => (provided, None),
    };

    if let Some(expected) = expected_secret {
        match secret {
            Some(secret) if constant_time_token_eq(secret, expected) => {}
            Some(_) => return Err("invalid bearer token".into()),
            None => return Err("bearer token must be {user_id}:{secret}".into()),
        }
    }

    let user_id = UserId::parse(user_part).map_err(|e| format!("invalid user id: {}", e.reason))?;
    Ok(CallerIdentity { user_id })
}

/// Extract and validate the Bearer token from the Authorization header.
///
/// On success the parsed [`CallerIdentity`] is added to the request
/// extensions. Without an `AuthConfig` extension the secret is not checked.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone());

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(value) if value.starts_with("Bearer ") => {
            match parse_bearer_token(&value[7..], expected.as_deref()) {
                Ok(identity) => {
                    request.extensions_mut().insert(identity);
                    next.run(request).await
                }
                Err(msg) => {
                    tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                    unauthorized_response(&msg)
                }
            }
        }
        Some(_) => {
            tracing::warn!("authentication failed: non-Bearer authorization scheme");
            unauthorized_response("authorization header must use Bearer scheme")
        }
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            unauthorized_response("missing authorization header")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn whoami(caller: CallerIdentity) -> String {
        caller.user_id.as_uuid().to_string()
    }

    fn test_app(token: Option<&str>) -> Router {
        Router::new()
            .route("/test", get(whoami))
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(AuthConfig {
                token: token.map(String::from),
            }))
    }

    async fn call(app: Router, auth: Option<String>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/test");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        let resp = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn user_and_secret_accepted() {
        let user = uuid::Uuid::new_v4();
        let (status, body) = call(
            test_app(Some("s3cret")),
            Some(format!("Bearer {user}:s3cret")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, user.to_string());
    }

    #[tokio::test]
    async fn wrong_secret_rejected() {
        let user = uuid::Uuid::new_v4();
        let (status, _) = call(
            test_app(Some("s3cret")),
            Some(format!("Bearer {user}:guess")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_secret_rejected_when_configured() {
        let user = uuid::Uuid::new_v4();
        let (status, _) = call(test_app(Some("s3cret")), Some(format!("Bearer {user}"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bare_user_id_accepted_in_dev_mode() {
        let user = uuid::Uuid::new_v4();
        let (status, _) = call(test_app(None), Some(format!("Bearer {user}"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_header_and_bad_scheme_rejected() {
        let (status, body) = call(test_app(None), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("UNAUTHORIZED"));

        let (status, _) = call(test_app(None), Some("Basic abc".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_user_id_rejected() {
        let (status, _) = call(test_app(None), Some("Bearer not-a-uuid".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn debug_redacts_token() {
        let config = AuthConfig {
            token: Some("super-secret".into()),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
