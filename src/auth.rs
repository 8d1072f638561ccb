use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::{AccountDetails, Credentials, Identity, TokenPair, UpdateAccountRequest},
};

/// TokenKind
///
/// Distinguishes access from refresh tokens so neither can stand in for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims
///
/// Payload carried by every JWT issued by this service.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the actor's identity.
    pub sub: Uuid,
    /// Expiration time (seconds since epoch).
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
    pub kind: TokenKind,
    /// Session generation of `sub` at issue time. Logging out bumps it.
    #[serde(default)]
    pub generation: u64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("token revoked")]
    RevokedToken,
    #[error("rejected by identity service: {0}")]
    Rejected(String),
    #[error("identity service unreachable: {0}")]
    Upstream(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::RevokedToken => ApiError::Unauthorized(err.to_string()),
            AuthError::Rejected(reason) => ApiError::Validation(reason),
            AuthError::Upstream(_) | AuthError::Signing(_) => {
                ApiError::AuthProvider(err.to_string())
            }
        }
    }
}

/// AuthProvider
///
/// Everything identity-related the service consumes: checking credentials,
/// managing accounts, and minting/verifying/revoking the tokens that carry an
/// `Identity`.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError>;

    async fn register(&self, credentials: &Credentials) -> Result<Identity, AuthError>;

    /// Replaces the password after re-checking the current one.
    async fn change_password(
        &self,
        identity: &Identity,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    async fn update_account(
        &self,
        identity: &Identity,
        update: &UpdateAccountRequest,
    ) -> Result<AccountDetails, AuthError>;

    fn issue_tokens(&self, identity: &Identity) -> Result<TokenPair, AuthError>;

    /// Resolves an access token to its identity.
    fn verify_token(&self, token: &str) -> Result<Identity, AuthError>;

    /// Exchanges a valid refresh token for a fresh pair.
    fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    /// Revokes every token issued to `identity` so far.
    fn logout(&self, identity: &Identity);
}

/// AuthState
///
/// The concrete type used to share the auth provider across the application state.
pub type AuthState = Arc<dyn AuthProvider>;

#[derive(Deserialize)]
struct SignupResponse {
    id: Uuid,
}

#[derive(Deserialize)]
struct PasswordGrantResponse {
    user: SignupResponse,
}

#[derive(Deserialize, Default)]
struct UserMetadata {
    full_name: Option<String>,
}

#[derive(Deserialize)]
struct AdminUserResponse {
    id: Uuid,
    email: String,
    #[serde(default)]
    user_metadata: UserMetadata,
}

impl From<AdminUserResponse> for AccountDetails {
    fn from(user: AdminUserResponse) -> Self {
        AccountDetails {
            id: Identity::new(user.id),
            email: user.email,
            full_name: user.user_metadata.full_name,
        }
    }
}

/// JwtAuthProvider
///
/// Signs HS256 tokens with the configured secret. Email/password pairs are checked
/// by the external identity service (Supabase-compatible `/auth/v1` API); this
/// service never sees password hashes. Account changes go through the admin API,
/// so `identity_api_key` must be a service key.
///
/// Logout bumps a per-identity generation counter; tokens carrying an older
/// generation are rejected.
// TODO: persist generations in the document store so a logout survives restarts.
pub struct JwtAuthProvider {
    http: reqwest::Client,
    identity_url: String,
    identity_api_key: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    generations: RwLock<HashMap<Identity, u64>>,
}

impl JwtAuthProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            identity_url: config.identity_url.trim_end_matches('/').to_string(),
            identity_api_key: config.identity_api_key.clone(),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl_secs: config.access_token_ttl_secs,
            refresh_ttl_secs: config.refresh_token_ttl_secs,
            generations: RwLock::new(HashMap::new()),
        }
    }

    fn generation(&self, identity: &Identity) -> u64 {
        self.generations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .copied()
            .unwrap_or(0)
    }

    fn sign(&self, identity: &Identity, kind: TokenKind, ttl_secs: i64) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity.as_uuid(),
            exp: (now + ttl_secs).max(0) as usize,
            iat: now.max(0) as usize,
            kind,
            generation: self.generation(identity),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    fn decode_kind(&self, token: &str, expected: TokenKind) -> Result<Identity, AuthError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            }
        })?;

        if data.claims.kind != expected {
            return Err(AuthError::InvalidToken);
        }
        let identity = Identity::new(data.claims.sub);
        if data.claims.generation != self.generation(&identity) {
            return Err(AuthError::RevokedToken);
        }
        Ok(identity)
    }

    async fn post_identity_service(
        &self,
        path: &str,
        credentials: &Credentials,
    ) -> Result<reqwest::Response, AuthError> {
        self.http
            .post(format!("{}{}", self.identity_url, path))
            .header("apikey", &self.identity_api_key)
            .json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))
    }

    fn admin_user_url(&self, identity: &Identity) -> String {
        format!("{}/auth/v1/admin/users/{}", self.identity_url, identity)
    }

    async fn fetch_account(&self, identity: &Identity) -> Result<AccountDetails, AuthError> {
        let response = self
            .http
            .get(self.admin_user_url(identity))
            .header("apikey", &self.identity_api_key)
            .bearer_auth(&self.identity_api_key)
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;
        read_account(response).await
    }

    async fn put_account(
        &self,
        identity: &Identity,
        body: serde_json::Value,
    ) -> Result<AccountDetails, AuthError> {
        let response = self
            .http
            .put(self.admin_user_url(identity))
            .header("apikey", &self.identity_api_key)
            .bearer_auth(&self.identity_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;
        read_account(response).await
    }
}

async fn read_account(response: reqwest::Response) -> Result<AccountDetails, AuthError> {
    if response.status().is_client_error() {
        return Err(AuthError::Rejected(format!(
            "account change rejected ({})",
            response.status()
        )));
    }
    if !response.status().is_success() {
        return Err(AuthError::Upstream(format!(
            "unexpected status {}",
            response.status()
        )));
    }
    response
        .json::<AdminUserResponse>()
        .await
        .map(AccountDetails::from)
        .map_err(|e| AuthError::Upstream(e.to_string()))
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let response = self
            .post_identity_service("/auth/v1/token?grant_type=password", credentials)
            .await?;

        if response.status().is_client_error() {
            return Err(AuthError::InvalidCredentials);
        }
        if !response.status().is_success() {
            return Err(AuthError::Upstream(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let body = response
            .json::<PasswordGrantResponse>()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;
        Ok(Identity::new(body.user.id))
    }

    async fn register(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let response = self
            .post_identity_service("/auth/v1/signup", credentials)
            .await?;

        // Existing email, weak password and similar are reported as client errors.
        if response.status().is_client_error() {
            return Err(AuthError::Rejected("registration rejected".to_string()));
        }
        if !response.status().is_success() {
            return Err(AuthError::Upstream(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let body = response
            .json::<SignupResponse>()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;
        Ok(Identity::new(body.id))
    }

    async fn change_password(
        &self,
        identity: &Identity,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let account = self.fetch_account(identity).await?;
        let credentials = Credentials {
            email: account.email,
            password: old_password.to_string(),
        };
        match self.authenticate(&credentials).await {
            Ok(checked) if checked == *identity => {}
            Ok(_) | Err(AuthError::InvalidCredentials) => {
                return Err(AuthError::Rejected("old password is incorrect".to_string()));
            }
            Err(e) => return Err(e),
        }

        self.put_account(identity, serde_json::json!({ "password": new_password }))
            .await?;
        Ok(())
    }

    async fn update_account(
        &self,
        identity: &Identity,
        update: &UpdateAccountRequest,
    ) -> Result<AccountDetails, AuthError> {
        let mut body = serde_json::Map::new();
        if let Some(email) = &update.email {
            body.insert("email".to_string(), serde_json::json!(email));
        }
        if let Some(full_name) = &update.full_name {
            body.insert(
                "user_metadata".to_string(),
                serde_json::json!({ "full_name": full_name }),
            );
        }
        self.put_account(identity, serde_json::Value::Object(body))
            .await
    }

    fn issue_tokens(&self, identity: &Identity) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.sign(identity, TokenKind::Access, self.access_ttl_secs)?,
            refresh_token: self.sign(identity, TokenKind::Refresh, self.refresh_ttl_secs)?,
        })
    }

    fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        self.decode_kind(token, TokenKind::Access)
    }

    fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let identity = self.decode_kind(refresh_token, TokenKind::Refresh)?;
        self.issue_tokens(&identity)
    }

    fn logout(&self, identity: &Identity) {
        let mut generations = self
            .generations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *generations.entry(*identity).or_insert(0) += 1;
        tracing::info!(user_id = %identity, "sessions revoked");
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Used as a handler argument;
/// extraction fails with 401 before the handler runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Identity,
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header holding a UUID is accepted
///    as the identity.
/// 2. Otherwise a `Bearer` access token is required and verified by the
///    `AuthProvider`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());
            if let Some(user_id) = bypass {
                return Ok(AuthUser {
                    id: Identity::new(user_id),
                });
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        let id = auth.verify_token(token)?;
        Ok(AuthUser { id })
    }
}
