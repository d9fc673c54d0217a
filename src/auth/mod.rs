/*!
 * Caller identity
 *
 * Authentication itself happens upstream. The gateway in front of this
 * service forwards the authenticated user as `x-user-id`; anonymous
 * shoppers are tracked by an opaque `x-session-key` which is minted here
 * on first contact and echoed back so the client can keep presenting it.
 */

use crate::errors::ServiceError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SESSION_KEY_HEADER: &str = "x-session-key";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

const MAX_SESSION_KEY_LEN: usize = 64;

/// Who is calling: an authenticated user or an anonymous browsing session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallerIdentity {
    User { user_id: Uuid },
    Session { session_key: String },
}

impl CallerIdentity {
    pub fn user(user_id: Uuid) -> Self {
        Self::User { user_id }
    }

    pub fn session(session_key: impl Into<String>) -> Self {
        Self::Session {
            session_key: session_key.into(),
        }
    }

    /// Fresh anonymous identity with a newly minted session key.
    pub fn new_session() -> Self {
        Self::session(Uuid::new_v4().simple().to_string())
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::User { user_id } => Some(*user_id),
            Self::Session { .. } => None,
        }
    }

    pub fn session_key(&self) -> Option<&str> {
        match self {
            Self::User { .. } => None,
            Self::Session { session_key } => Some(session_key),
        }
    }

    /// Operations that create or read orders need an account.
    pub fn require_user(&self) -> Result<Uuid, ServiceError> {
        self.user_id().ok_or_else(|| {
            ServiceError::Unauthorized("Please sign in to continue".to_string())
        })
    }

    /// Resolve identity from request headers. A user id wins over a session key.
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Option<Self> {
        if let Some(user_id) = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
        {
            return Some(Self::user(user_id));
        }

        headers
            .get(SESSION_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| is_valid_session_key(v))
            .map(Self::session)
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { user_id } => write!(f, "user:{}", user_id),
            Self::Session { session_key } => write!(f, "session:{}", session_key),
        }
    }
}

fn is_valid_session_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_SESSION_KEY_LEN
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Attach a `CallerIdentity` to every request, minting a session key for
/// first-time anonymous callers.
pub async fn identity_middleware(mut request: Request, next: Next) -> Response {
    let identity = CallerIdentity::from_headers(request.headers())
        .unwrap_or_else(CallerIdentity::new_session);

    request.extensions_mut().insert(identity.clone());
    let mut response = next.run(request).await;

    if let CallerIdentity::Session { session_key } = &identity {
        if let Ok(value) = HeaderValue::from_str(session_key) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(SESSION_KEY_HEADER), value);
        }
    }

    response
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<CallerIdentity>() {
            return Ok(identity.clone());
        }
        // Routers mounted without the middleware still resolve explicit headers
        CallerIdentity::from_headers(&parts.headers).ok_or_else(|| {
            ServiceError::Unauthorized("Missing caller identity".to_string())
        })
    }
}

/// Guards administrative routes with the configured shared token.
/// With no token configured every request is refused.
pub async fn admin_token_middleware(
    State(expected): State<Option<String>>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let Some(expected) = expected.filter(|t| !t.is_empty()) else {
        return Err(ServiceError::Forbidden(
            "Administrative access is disabled".to_string(),
        ));
    };

    let presented = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        return Err(ServiceError::Unauthorized("Invalid admin token".to_string()));
    }

    Ok(next.run(request).await)
}

/// Byte comparison whose timing does not depend on where the inputs differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{HeaderMap, Request as HttpRequest, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn whoami(identity: CallerIdentity) -> String {
        identity.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(whoami))
            .layer(axum::middleware::from_fn(identity_middleware))
    }

    #[test]
    fn user_header_takes_precedence_over_session() {
        let user_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, user_id.to_string().parse().unwrap());
        headers.insert(SESSION_KEY_HEADER, "abc123".parse().unwrap());

        assert_eq!(
            CallerIdentity::from_headers(&headers),
            Some(CallerIdentity::user(user_id))
        );
    }

    #[test]
    fn malformed_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, "not-a-uuid".parse().unwrap());
        headers.insert(SESSION_KEY_HEADER, "has spaces".parse().unwrap());
        assert_eq!(CallerIdentity::from_headers(&headers), None);
    }

    #[test]
    fn sessions_cannot_place_orders() {
        let err = CallerIdentity::session("abc").require_user().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn middleware_mints_and_echoes_session_key() {
        let response = app()
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let key = response
            .headers()
            .get(SESSION_KEY_HEADER)
            .expect("session key header")
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(key.len(), 32);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(String::from_utf8(body.to_vec()).unwrap(), format!("session:{}", key));
    }

    #[tokio::test]
    async fn middleware_does_not_echo_for_users() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(USER_ID_HEADER, Uuid::new_v4().to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get(SESSION_KEY_HEADER).is_none());
    }

    #[tokio::test]
    async fn admin_guard_refuses_when_unconfigured_or_wrong() {
        async fn ok() -> &'static str {
            "ok"
        }

        let disabled = Router::new().route("/", get(ok)).layer(
            axum::middleware::from_fn_with_state(None::<String>, admin_token_middleware),
        );
        let response = disabled
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(ADMIN_TOKEN_HEADER, "anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let guarded = Router::new().route("/", get(ok)).layer(
            axum::middleware::from_fn_with_state(Some("s3cret".to_string()), admin_token_middleware),
        );
        let wrong = guarded
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(ADMIN_TOKEN_HEADER, "guess")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let right = guarded
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(ADMIN_TOKEN_HEADER, "s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(right.status(), StatusCode::OK);
    }

    #[test]
    fn constant_time_eq_matches_only_equal_inputs() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
