//! Authentication middleware
//!
//! Sessions are issued elsewhere; this layer only verifies the bearer token
//! and places a request-scoped [`AuthUser`] in the request extensions.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::Role;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Authenticated user information extracted from the session token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Check if user holds at least the given role
    pub fn has_role(&self, role: Role) -> bool {
        self.role.satisfies(role)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Session token claims
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Decode and validate a session token into the caller's identity
pub fn decode_session_token(token: &str, secret: &str) -> AppResult<AuthUser> {
    use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::Unauthorized("Session has expired".to_string()),
        _ => AppError::Unauthorized("Invalid session token".to_string()),
    })?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?;

    let role = Role::parse(&claims.role)
        .ok_or_else(|| AppError::Unauthorized("Unknown role in token".to_string()))?;

    Ok(AuthUser {
        user_id,
        username: claims.username,
        role,
    })
}

/// Authentication middleware that validates session tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return AppError::Unauthorized("Authentication required".to_string()).into_response();
    };

    match decode_session_token(token, &state.config.jwt.secret) {
        Ok(user) => {
            tracing::debug!(user_id = %user.user_id, role = user.role.as_str(), "Authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Role guard for use in handlers
pub fn require_role(user: &AuthUser, role: Role) -> AppResult<()> {
    if user.has_role(role) {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %user.user_id,
            role = user.role.as_str(),
            required = role.as_str(),
            "Permission denied"
        );
        Err(AppError::InsufficientPermissions)
    }
}
