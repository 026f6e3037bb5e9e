//! Token issuance, verification and the admin route gate.

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Json};
use axum::http::Request;
use axum::response::Json as JsonResponse;
use axum::{middleware, response::Response};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::store::MediaStore;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

/// Identity attached to the request extensions once a token verifies.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub username: String,
}

pub struct AuthConfig {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
}

impl AuthConfig {
    pub fn new(secret: &str, token_ttl: Duration) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_ttl,
        }
    }

    /// Signs a token asserting `username`, expiring after the configured TTL.
    pub fn issue(&self, username: &str) -> Result<String, ApiError> {
        let claims = Claims {
            sub: username.to_string(),
            exp: Utc::now().timestamp() as u64 + self.token_ttl.as_secs(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| ApiError::Internal(err.to_string()))
    }

    /// Checks signature and expiry. Any failure collapses into `None`; the
    /// caller decides how to report it.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .ok()
    }
}

/// Gate in front of the admin surface. A missing bearer header and an
/// invalid or expired token are distinct rejections (401 vs 403).
pub async fn auth_middleware(
    Extension(auth): Extension<Arc<AuthConfig>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<AxumBody>,
    next: middleware::Next,
) -> Result<Response, ApiError> {
    if !is_protected_path(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let Some(TypedHeader(bearer)) = bearer else {
        return Err(ApiError::Unauthorized("missing token".into()));
    };

    match auth.verify(bearer.token()) {
        Some(claims) => {
            req.extensions_mut().insert(AuthUser {
                username: claims.sub,
            });
            Ok(next.run(req).await)
        }
        None => {
            warn!(path = req.uri().path(), "rejected invalid token");
            Err(ApiError::Forbidden("invalid token".into()))
        }
    }
}

fn is_protected_path(path: &str) -> bool {
    path.starts_with("/api/admin/") && path != "/api/admin/login"
}

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub(crate) struct LoginResponse {
    success: bool,
    token: String,
}

/// Login endpoint. Failure is uniform: no distinction between unknown user
/// and wrong password.
pub async fn admin_login(
    Extension(store): Extension<Arc<MediaStore>>,
    Extension(auth): Extension<Arc<AuthConfig>>,
    Json(payload): Json<LoginRequest>,
) -> Result<JsonResponse<LoginResponse>, ApiError> {
    if !store
        .verify_credentials(&payload.username, &payload.password)
        .await
    {
        warn!(username = payload.username, "failed login attempt");
        return Err(ApiError::Unauthorized("invalid credentials".into()));
    }

    let token = auth.issue(&payload.username)?;
    info!(username = payload.username, "admin login");
    Ok(JsonResponse(LoginResponse {
        success: true,
        token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_auth() -> AuthConfig {
        AuthConfig::new("test-secret", Duration::from_secs(60))
    }

    #[test]
    fn issued_token_verifies_with_identity() {
        let auth = make_auth();
        let token = auth.issue("admin").expect("issue");
        let claims = auth.verify(&token).expect("verify");
        assert_eq!(claims.sub, "admin");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = make_auth();
        let token = auth.issue("admin").expect("issue");
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });
        assert!(auth.verify(&tampered).is_none());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let auth = make_auth();
        let other = AuthConfig::new("other-secret", Duration::from_secs(60));
        let token = other.issue("admin").expect("issue");
        assert!(auth.verify(&token).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = make_auth();
        let claims = Claims {
            sub: "admin".to_string(),
            exp: (Utc::now().timestamp() - 120) as u64,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encode");
        assert!(auth.verify(&token).is_none());
    }

    #[test]
    fn protected_paths_cover_admin_surface_only() {
        assert!(is_protected_path("/api/admin/upload"));
        assert!(is_protected_path("/api/admin/media/123"));
        assert!(!is_protected_path("/api/admin/login"));
        assert!(!is_protected_path("/api/media"));
        assert!(!is_protected_path("/health"));
    }
}
