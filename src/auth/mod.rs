/*!
 * # Authentication and Authorization Module
 *
 * Account registration and login backed by argon2 password hashes, HS256
 * bearer tokens, and the middleware that gates routes on a resolved user
 * and its role.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::{normalize_email, Role, User, UserProfile};
use crate::repositories::UserRepository;

pub mod password;
mod types;

pub use types::*;

const MISSING_AUTH_MESSAGE: &str = "You are not authorized to access this route";
const FORBIDDEN_MESSAGE: &str = "You do not have permission to perform this action";

/// Claim structure for JWT tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user attached to the request by [`auth_middleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user: UserProfile,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized(MISSING_AUTH_MESSAGE.to_string()))
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_ttl: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, issuer: String, audience: String, token_ttl: Duration) -> Self {
        Self {
            jwt_secret,
            issuer,
            audience,
            token_ttl,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, ServiceError> {
        if config.jwt_secret.len() < 32 {
            return Err(ServiceError::InternalError(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }
        Ok(Self::new(
            config.jwt_secret.clone(),
            config.auth_issuer.clone(),
            config.auth_audience.clone(),
            Duration::from_secs(config.jwt_expiration_secs),
        ))
    }
}

/// Authentication service that handles accounts and token issuance
pub struct AuthService {
    config: AuthConfig,
    users: Arc<dyn UserRepository>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(config: AuthConfig, users: Arc<dyn UserRepository>) -> Self {
        Self { config, users }
    }

    /// Creates a `user` account and signs a token for it.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        let email = normalize_email(&request.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::DuplicateEmail);
        }

        let hash = password::hash_password_blocking(request.password).await?;
        let user = self
            .users
            .insert(User::new(request.name, email, hash, Role::User))
            .await?;
        info!(user_id = %user.id, "Registered user");

        self.respond_with_token(&user)
    }

    /// Unknown email and wrong password fail identically.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ServiceError> {
        let email = normalize_email(&request.email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            password::verify_dummy(request.password).await?;
            debug!("Login for unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        let matches =
            password::verify_password_blocking(request.password, user.password_hash.clone())
                .await?;
        if !matches {
            debug!(user_id = %user.id, "Login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        info!(user_id = %user.id, "User logged in");
        self.respond_with_token(&user)
    }

    fn respond_with_token(&self, user: &User) -> Result<AuthResponse, ServiceError> {
        Ok(AuthResponse {
            user: user.profile(),
            token: self.issue_token(user)?,
        })
    }

    /// Signs an HS256 token for `user`.
    pub fn issue_token(&self, user: &User) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.config.token_ttl.as_secs())
            .map_err(|_| ServiceError::InternalError("Invalid token duration".to_string()))?;
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            iat: now,
            exp: now + ttl,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("Failed to sign token: {}", e)))
    }

    /// Checks signature, expiry, issuer and audience.
    pub fn decode_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "Token rejected");
            ServiceError::InvalidToken
        })
    }

    /// Resolves a bearer token to the stored user it names.
    pub async fn resolve_token(&self, token: &str) -> Result<User, ServiceError> {
        let claims = self.decode_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ServiceError::InvalidToken)?;
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserGone)
    }

    /// Makes sure an admin account with `email` exists.
    ///
    /// An existing admin is left untouched; an existing non-admin account
    /// with the same email is a conflict.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ServiceError> {
        let email = normalize_email(email);
        if let Some(existing) = self.users.find_by_email(&email).await? {
            if existing.role == Role::Admin {
                debug!(user_id = %existing.id, "Admin account already present");
                return Ok(existing);
            }
            warn!(user_id = %existing.id, "Bootstrap admin email belongs to a regular account");
            return Err(ServiceError::Conflict(format!(
                "{} is registered as a non-admin account",
                email
            )));
        }

        let hash = password::hash_password_blocking(password.to_string()).await?;
        let admin = self
            .users
            .insert(User::new(name.trim().to_string(), email, hash, Role::Admin))
            .await?;
        info!(user_id = %admin.id, "Created bootstrap admin account");
        Ok(admin)
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ServiceError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized(MISSING_AUTH_MESSAGE.to_string()))
}

/// Makes the auth service reachable from route-level middleware.
pub async fn inject_auth_service(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(auth_service);
    next.run(request).await
}

/// Authentication middleware that resolves the bearer token to a user
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, ServiceError> {
    let auth_service = request
        .extensions()
        .get::<Arc<AuthService>>()
        .cloned()
        .ok_or_else(|| {
            ServiceError::InternalError("Authentication service not available".to_string())
        })?;

    let token = bearer_token(request.headers())?.to_string();
    let user = auth_service.resolve_token(&token).await?;

    request.extensions_mut().insert(AuthUser {
        user: user.profile(),
    });
    Ok(next.run(request).await)
}

/// Role middleware to check the resolved user against the allowed roles
pub async fn role_middleware(
    State(allowed): State<Arc<[Role]>>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ServiceError::Unauthorized(MISSING_AUTH_MESSAGE.to_string()))?;

    if !allowed.contains(&user.user.role) {
        return Err(ServiceError::Forbidden(FORBIDDEN_MESSAGE.to_string()));
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
///
/// Gates are route layers, so unmatched paths and methods still fall
/// through to 404/405 instead of being rejected as unauthenticated.
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_roles(self, roles: &[Role]) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.route_layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_roles(self, roles: &[Role]) -> Self {
        let allowed: Arc<[Role]> = roles.into();
        self.route_layer(axum::middleware::from_fn_with_state(
            allowed,
            role_middleware,
        ))
        .with_auth()
    }
}
