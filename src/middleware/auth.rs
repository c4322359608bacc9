use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::AppError;
use crate::middleware::session::{AdminIdentity, SessionStore};

pub const SESSION_COOKIE: &str = "handwood.sid";
pub const LOGIN_PATH: &str = "/admin/login";

/// Page-route guard: anonymous requests are sent to the login form.
pub async fn require_admin(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    match state.current_admin(req.headers()).await {
        Some((_, identity)) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        None => Redirect::to(LOGIN_PATH).into_response(),
    }
}

/// API-route guard: anonymous requests get a 401 JSON error.
pub async fn require_admin_api(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (_, identity) = state
        .current_admin(req.headers())
        .await
        .ok_or(AppError::Unauthorized)?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sid: String,
    pub exp: usize,
}

#[derive(Clone, Debug)]
pub struct AuthState {
    pub sessions: Arc<SessionStore>,
    pub secret: Arc<str>,
    /// Set the `Secure` cookie attribute even for plain-HTTP requests.
    pub force_secure: bool,
}

impl AuthState {
    pub fn new(sessions: Arc<SessionStore>, secret: &str, force_secure: bool) -> Self {
        Self {
            sessions,
            secret: Arc::from(secret),
            force_secure,
        }
    }

    /// Resolves the session cookie to `(session id, identity)`.
    pub async fn current_admin(&self, headers: &HeaderMap) -> Option<(String, AdminIdentity)> {
        let token = read_cookie(headers, SESSION_COOKIE)?;
        let claims = match validate_token(token, &self.secret) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(error = %err, "Rejected session cookie");
                return None;
            }
        };
        let identity = self.sessions.resolve(&claims.sid).await?;
        Some((claims.sid, identity))
    }

    /// Opens a session and returns the `Set-Cookie` value carrying it.
    pub async fn login(
        &self,
        identity: AdminIdentity,
        headers: &HeaderMap,
    ) -> Result<String, AuthMiddlewareError> {
        let ttl = self.sessions.ttl();
        let session_id = self.sessions.create(identity).await;
        let token = generate_token(&session_id, &self.secret, ttl)?;
        Ok(session_cookie(&token, ttl, self.is_secure(headers)))
    }

    /// Destroys the session behind the cookie, if any, and returns the
    /// `Set-Cookie` value that clears it.
    pub async fn logout(&self, headers: &HeaderMap) -> String {
        if let Some((session_id, _)) = self.current_admin(headers).await {
            self.sessions.destroy(&session_id).await;
        }
        clear_cookie(self.is_secure(headers))
    }

    fn is_secure(&self, headers: &HeaderMap) -> bool {
        self.force_secure
            || headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
    }
}

pub fn generate_token(
    session_id: &str,
    secret: &str,
    ttl: Duration,
) -> Result<String, AuthMiddlewareError> {
    let ttl = chrono::Duration::from_std(ttl).map_err(|_| AuthMiddlewareError::GenerationFail)?;
    let exp = Utc::now()
        .checked_add_signed(ttl)
        .ok_or(AuthMiddlewareError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims {
        sid: session_id.to_owned(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthMiddlewareError> {
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthMiddlewareError::TokenExpired,
        _ => AuthMiddlewareError::ValidationFail,
    })
}

pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(secure: bool) -> String {
    session_cookie("", Duration::ZERO, secure)
}

pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

#[derive(Error, Debug)]
pub enum AuthMiddlewareError {
    #[error("Token expired")]
    TokenExpired,
    #[error("Failed to validate token")]
    ValidationFail,
    #[error("Failed to generate token")]
    GenerationFail,
}

impl From<AuthMiddlewareError> for AppError {
    fn from(err: AuthMiddlewareError) -> Self {
        AppError::Internal(err.to_string())
    }
}
