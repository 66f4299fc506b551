/// HTTP middleware utilities for blog-service
///
/// Authentication is optional at the transport level: anonymous requests pass
/// through untouched, and handlers decide whether they need an actor by asking
/// for a `UserId` (required) or an `Option<UserId>` (public read paths).
/// A credential that is present but invalid is always rejected.
pub mod permissions;

pub use permissions::*;

use crate::error::AppError;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{error::ErrorUnauthorized, Error, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

/// Cookie the page surface reads the token from when no header is sent.
pub const TOKEN_COOKIE: &str = "access_token";

/// JWT claims issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Authenticated caller, stored in request extensions by `AuthMiddleware`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub i64);

/// Mint an HS256 token for `user_id` valid for `ttl_secs`.
pub fn issue_token(secret: &str, user_id: i64, ttl_secs: i64) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + ttl_secs).max(0) as usize,
        iat: now.max(0) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token encoding failed: {}", e)))
}

/// Validate a token and return the user id it was issued for.
pub fn validate_token(secret: &str, token: &str) -> Result<i64, String> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| format!("Invalid token: {}", e))?;

    data.claims
        .sub
        .parse::<i64>()
        .map_err(|_| "Invalid user ID".to_string())
}

fn extract_token(req: &ServiceRequest) -> Result<Option<String>, Error> {
    if let Some(header) = req.headers().get("Authorization") {
        let value = header
            .to_str()
            .map_err(|_| ErrorUnauthorized("Invalid Authorization header"))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ErrorUnauthorized("Authorization must use Bearer scheme"))?;
        return Ok(Some(token.trim().to_string()));
    }

    Ok(req.cookie(TOKEN_COOKIE).map(|c| c.value().to_string()))
}

/// Actix middleware that attaches `UserId` when a valid token is supplied.
pub struct AuthMiddleware {
    secret: Arc<str>,
}

impl AuthMiddleware {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            secret: self.secret.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    secret: Arc<str>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let secret = self.secret.clone();

        Box::pin(async move {
            if let Some(token) = extract_token(&req)? {
                let user_id = validate_token(&secret, &token).map_err(|e| {
                    tracing::debug!(error = %e, path = %req.path(), "rejected credential");
                    ErrorUnauthorized(e)
                })?;
                req.extensions_mut().insert(UserId(user_id));
            }

            service.call(req).await
        })
    }
}

impl FromRequest for UserId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<UserId>()
                .copied()
                .ok_or(AppError::Unauthenticated),
        )
    }
}
