use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::{ApiClient, RequestOptions};
use crate::error::ApiError;
use crate::session::{SessionCookie, SessionError, SessionStore};

/// Claims the backend puts into its access tokens. Only `exp` is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub exp: i64,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_roles: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is not a decodable JWT: {0}")]
    Malformed(String),

    #[error("token expired at {0}")]
    Expired(i64),
}

/// Decode the payload segment without checking the signature.
///
/// This is a UX pre-check. The backend verifies the token on every call and
/// the guard's access check is the real authorization decision.
pub fn decode_unverified(token: &str) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| TokenError::Malformed(e.to_string()))
}

/// Claims of a token that is decodable and whose `exp` is after `now`
/// (seconds since the epoch). `exp == now` counts as expired.
pub fn check_expiry_at(token: &str, now: i64) -> Result<TokenClaims, TokenError> {
    let claims = decode_unverified(token)?;
    if claims.exp <= now {
        return Err(TokenError::Expired(claims.exp));
    }
    Ok(claims)
}

pub fn check_expiry(token: &str) -> Result<TokenClaims, TokenError> {
    check_expiry_at(token, Utc::now().timestamp())
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub is_password_reseted: Option<bool>,
    #[serde(default)]
    pub is_org_configured: Option<bool>,
    #[serde(default)]
    pub is_invited_user: Option<bool>,
}

/// Where the user has to go after logging in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginOutcome {
    ResetPassword,
    OrgSetup,
    Ready,
}

impl LoginResponse {
    pub fn outcome(&self) -> LoginOutcome {
        if self.is_password_reseted == Some(false) {
            LoginOutcome::ResetPassword
        } else if self.is_org_configured == Some(false) && self.is_invited_user == Some(false) {
            LoginOutcome::OrgSetup
        } else {
            LoginOutcome::Ready
        }
    }

    /// Record the token and the onboarding flags in the session.
    pub fn store(&self, session: &dyn SessionStore) -> Result<LoginOutcome, SessionError> {
        session.set(SessionCookie::AccessToken, &self.access_token)?;
        let invited = if self.is_invited_user.unwrap_or(false) { "true" } else { "false" };
        session.set(SessionCookie::IsInvitedUser, invited)?;

        let outcome = self.outcome();
        match outcome {
            LoginOutcome::ResetPassword => {
                session.set(SessionCookie::IsNotPasswordSet, "true")?;
                session.set(SessionCookie::IsNotOrgSetup, "true")?;
            }
            LoginOutcome::OrgSetup => {
                session.set(SessionCookie::IsNotOrgSetup, "true")?;
            }
            LoginOutcome::Ready => {
                session.remove(SessionCookie::IsNotPasswordSet)?;
                session.remove(SessionCookie::IsNotOrgSetup)?;
            }
        }
        Ok(outcome)
    }
}

/// `POST /auth/login`.
pub async fn login(client: &ApiClient, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
    let body = LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    };
    let options = RequestOptions::new(Method::POST).json(serde_json::to_value(&body)?);
    let value = client.call("/auth/login", options).await?.into_json()?;
    Ok(serde_json::from_value(value)?)
}
