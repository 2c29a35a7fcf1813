//! Caller identity for the staffroom API.
//!
//! Sessions and logins live outside this service. Requests carry an HS256
//! bearer token whose `sub` is the caller's staff id and whose `role` is one of
//! the [`Role`] names. Handlers take a [`Caller`] argument and check it against
//! the role predicates.
//!
//! With `auth.enabled = false` every request is treated as the built-in system
//! administrator, which is convenient for local use and for tests that do not
//! care about permissions.
//!
//! # Configuration
//!
//! Set via environment variables or config.toml:
//! - `STAFFROOM_JWT_SECRET` - Required secret key for HS256 signing
//! - `STAFFROOM_JWT_ISSUER` - Expected issuer claim (default: "staffroom")
//! - `STAFFROOM_JWT_AUDIENCE` - Expected audience claim (default: "staffroom-api")

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::errors::{StaffroomError, StaffroomResult};
use crate::roles::Role;
use crate::server::api_error::ApiError;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Staff id of the caller
    pub sub: String,
    /// Role name, see [`Role`]
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    pub iss: String,
    pub aud: String,
}

/// Authentication errors.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// Missing Authorization header
    MissingToken,
    /// Invalid Authorization header format
    InvalidHeader,
    /// Token validation failed
    InvalidToken(String),
    /// Token has expired
    TokenExpired,
    /// Token is valid but names a role we do not know
    UnknownRole(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "missing authorization token"),
            AuthError::InvalidHeader => write!(f, "invalid authorization header format"),
            AuthError::InvalidToken(msg) => write!(f, "invalid token: {msg}"),
            AuthError::TokenExpired => write!(f, "token has expired"),
            AuthError::UnknownRole(role) => write!(f, "token carries unknown role '{role}'"),
        }
    }
}

impl std::error::Error for AuthError {}

/// JWT validator for token verification.
#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    expiration_secs: u64,
}

impl JwtValidator {
    /// Create a new JWT validator from auth configuration.
    pub fn from_config(config: &AuthConfig) -> StaffroomResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(StaffroomError::ConfigError(
                "jwt_secret is required for JWT authentication".to_string(),
            ));
        }

        // `env:NAME` reads the secret from the environment
        let secret = if let Some(env_var) = config.jwt_secret.strip_prefix("env:") {
            std::env::var(env_var).map_err(|_| {
                StaffroomError::ConfigError(format!(
                    "environment variable '{env_var}' not found for jwt_secret"
                ))
            })?
        } else {
            config.jwt_secret.clone()
        };

        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_audience(&[&config.jwt_audience]);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiration_secs: config.token_expiration_secs,
        })
    }

    /// Validate a JWT token and extract claims.
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        })
    }

    /// Issue a token for a staff member.
    pub fn create_token(&self, staff_id: &str, role: Role) -> StaffroomResult<String> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| StaffroomError::ServerError(format!("system time error: {e}")))?
            .as_secs();

        let claims = Claims {
            sub: staff_id.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + self.expiration_secs,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| StaffroomError::ServerError(format!("failed to create token: {e}")))
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiration_secs", &self.expiration_secs)
            .finish()
    }
}

/// Authentication settings shared through the router state.
#[derive(Clone)]
pub struct AuthState {
    pub enabled: bool,
    /// None when auth is disabled
    pub validator: Option<Arc<JwtValidator>>,
}

impl AuthState {
    pub fn from_config(config: &AuthConfig) -> StaffroomResult<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let validator = JwtValidator::from_config(config)?;
        Ok(Self {
            enabled: true,
            validator: Some(Arc::new(validator)),
        })
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            validator: None,
        }
    }

    /// Resolve the caller from an `Authorization` header value.
    pub fn authenticate(&self, header: Option<&str>) -> Result<Caller, AuthError> {
        let Some(validator) = self.validator.as_ref().filter(|_| self.enabled) else {
            return Ok(Caller::system());
        };

        let header = header.ok_or(AuthError::MissingToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidHeader)?;

        let claims = validator.validate_token(token)?.claims;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|_| AuthError::UnknownRole(claims.role.clone()))?;

        Ok(Caller {
            staff_id: Some(claims.sub),
            role,
        })
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// None for the built-in system administrator
    pub staff_id: Option<String>,
    pub role: Role,
}

impl Caller {
    /// The identity used when authentication is disabled.
    pub fn system() -> Self {
        Self {
            staff_id: None,
            role: Role::Admin,
        }
    }

    pub fn staff(staff_id: impl Into<String>, role: Role) -> Self {
        Self {
            staff_id: Some(staff_id.into()),
            role,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.staff_id.as_deref()
    }

    /// Whether the caller is the given staff member.
    pub fn is(&self, staff_id: &str) -> bool {
        self.staff_id.as_deref() == Some(staff_id)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Fail with 403 unless the role predicate holds.
    pub fn require(&self, allowed: bool, action: &str) -> Result<(), ApiError> {
        if allowed {
            Ok(())
        } else {
            Err(ApiError::insufficient_role(action))
        }
    }

    /// Fail with 403 unless the caller is `staff_id` or `privileged` holds.
    pub fn require_self_or(
        &self,
        staff_id: &str,
        privileged: bool,
        action: &str,
    ) -> Result<(), ApiError> {
        if privileged || self.is(staff_id) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "only the staff member concerned may {action}"
            )))
        }
    }

    /// The caller's own staff id, for operations that need one.
    pub fn own_id(&self) -> Result<&str, ApiError> {
        self.id().ok_or_else(|| {
            ApiError::with_message(
                crate::server::api_error::ErrorCode::InvalidRequest,
                "this operation needs a staff identity; pass the staff id explicitly",
            )
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);

        let header = match parts.headers.get("Authorization") {
            Some(value) => Some(value.to_str().map_err(|_| AuthError::InvalidHeader)?),
            None => None,
        };

        Ok(auth.authenticate(header)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            enabled: true,
            jwt_secret: "test-secret-key-for-testing-only".to_string(),
            jwt_issuer: "staffroom".to_string(),
            jwt_audience: "staffroom-api".to_string(),
            token_expiration_secs: 3600,
        }
    }

    #[test]
    fn create_and_validate_token() {
        let validator = JwtValidator::from_config(&test_config()).unwrap();

        let token = validator.create_token("staff-1", Role::Head).unwrap();
        let token_data = validator.validate_token(&token).unwrap();

        assert_eq!(token_data.claims.sub, "staff-1");
        assert_eq!(token_data.claims.role, "head");
        assert_eq!(token_data.claims.iss, "staffroom");
        assert_eq!(token_data.claims.aud, "staffroom-api");
        assert!(token_data.claims.exp > token_data.claims.iat);
    }

    #[test]
    fn reject_invalid_token() {
        let validator = JwtValidator::from_config(&test_config()).unwrap();
        assert!(validator.validate_token("invalid-token").is_err());
    }

    #[test]
    fn reject_wrong_secret() {
        let validator = JwtValidator::from_config(&test_config()).unwrap();
        let token = validator.create_token("staff-1", Role::Staff).unwrap();

        let other = JwtValidator::from_config(&AuthConfig {
            jwt_secret: "different-secret".to_string(),
            ..test_config()
        })
        .unwrap();

        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn reject_wrong_audience() {
        let validator = JwtValidator::from_config(&test_config()).unwrap();
        let token = validator.create_token("staff-1", Role::Staff).unwrap();

        let other = JwtValidator::from_config(&AuthConfig {
            jwt_audience: "other-audience".to_string(),
            ..test_config()
        })
        .unwrap();

        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn reject_expired_token() {
        let config = test_config();
        let validator = JwtValidator::from_config(&config).unwrap();

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let expired_claims = Claims {
            sub: "staff-1".to_string(),
            role: "staff".to_string(),
            iat: now - 7200,
            exp: now - 3600,
            iss: config.jwt_issuer.clone(),
            aud: config.jwt_audience.clone(),
        };

        let token = encode(
            &Header::default(),
            &expired_claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            validator.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn empty_secret_fails() {
        let config = AuthConfig {
            enabled: true,
            jwt_secret: "".to_string(),
            ..Default::default()
        };
        assert!(JwtValidator::from_config(&config).is_err());
    }

    #[test]
    fn disabled_auth_is_the_system_admin() {
        let state = AuthState::from_config(&AuthConfig::default()).unwrap();
        assert!(!state.enabled);

        let caller = state.authenticate(None).unwrap();
        assert_eq!(caller, Caller::system());
        assert!(caller.is_admin());
        assert!(caller.id().is_none());
    }

    #[test]
    fn enabled_auth_requires_bearer_token() {
        let state = AuthState::from_config(&test_config()).unwrap();

        assert!(matches!(
            state.authenticate(None),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            state.authenticate(Some("Basic abc")),
            Err(AuthError::InvalidHeader)
        ));

        let token = state
            .validator
            .as_ref()
            .unwrap()
            .create_token("staff-9", Role::Hr)
            .unwrap();
        let caller = state.authenticate(Some(&format!("Bearer {token}"))).unwrap();
        assert_eq!(caller, Caller::staff("staff-9", Role::Hr));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let config = test_config();
        let state = AuthState::from_config(&config).unwrap();

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = Claims {
            sub: "staff-1".to_string(),
            role: "janitor".to_string(),
            iat: now,
            exp: now + 60,
            iss: config.jwt_issuer.clone(),
            aud: config.jwt_audience.clone(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            state.authenticate(Some(&format!("Bearer {token}"))),
            Err(AuthError::UnknownRole(_))
        ));
    }

    #[test]
    fn caller_permission_helpers() {
        let caller = Caller::staff("s1", Role::Staff);
        assert!(caller.is("s1"));
        assert!(!caller.is("s2"));
        assert!(caller.require(caller.role.can_manage_staff(), "manage staff").is_err());
        assert!(caller.require_self_or("s1", false, "do it").is_ok());
        assert!(caller.require_self_or("s2", false, "do it").is_err());
        assert!(caller.require_self_or("s2", true, "do it").is_ok());
        assert!(Caller::system().own_id().is_err());
    }
}
