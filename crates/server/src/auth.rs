//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the acting principal's id, role, and
//! company/vendor links; the extractor turns a valid token into a
//! [`lanehaul_core::domain::party::Actor`] for the policy checks downstream.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use lanehaul_core::domain::party::{Actor, CompanyId, Role, UserId, VendorId};

use crate::bootstrap::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    role: String,
    company_id: Option<i64>,
    vendor_id: Option<i64>,
    exp: i64,
}

pub struct AuthVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

impl AuthVerifier {
    pub fn new(secret: &SecretString) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Actor, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token.".to_string()))?;

        let role = Role::parse(&data.claims.role)
            .ok_or_else(|| ApiError::Unauthorized("Unknown role in token.".to_string()))?;

        Ok(Actor::new(
            UserId(data.claims.sub),
            role,
            data.claims.company_id.map(CompanyId),
            data.claims.vendor_id.map(VendorId),
        ))
    }
}

/// Mint a token for the given actor. Used by operational tooling and tests;
/// interactive login lives outside this service.
pub fn issue_token(
    secret: &SecretString,
    actor: &Actor,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: actor.user_id.0,
        role: actor.role.as_str().to_string(),
        company_id: actor.company_id.map(|id| id.0),
        vendor_id: actor.vendor_id.map(|id| id.0),
        exp: Utc::now().timestamp() + ttl_secs as i64,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
}

/// Extractor for the authenticated principal.
pub struct AuthUser(pub Actor);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token.".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token.".to_string()))?;

        let actor = state.auth.verify(token)?;
        Ok(AuthUser(actor))
    }
}
