// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token lifecycle.
//!
//! The cached token's freshness is judged from the token's own `exp` claim,
//! decoded straight out of the compact serialization, rather than from any
//! transport-layer bookkeeping. A token within [`EXPIRY_SKEW_SECS`] of its
//! expiry is treated as already stale to absorb clock skew and in-flight
//! request latency.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, Header};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::claims::AssertionClaims;
use crate::auth::error::AuthError;
use crate::client::{Client, Session};

/// Identity provider realm.
pub(crate) const REALM: &str = "relational_bank";

/// Realm URL path; the full realm URL is the assertion audience.
pub(crate) const REALM_PATH: &str = "/auth/realms/relational_bank";

/// Token endpoint path under the identity provider origin.
pub(crate) const TOKEN_PATH: &str = "/auth/realms/relational_bank/protocol/openid-connect/token";

const JWT_BEARER_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// A token expiring within this many seconds is not used for outbound calls.
pub(crate) const EXPIRY_SKEW_SECS: i64 = 30;

/// A cached access token. Replaced wholesale on each re-authentication,
/// never partially updated.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Build from a compact access token, taking the expiry from the
    /// token's own `exp` claim.
    pub fn from_access_token(access_token: String) -> Result<Self, AuthError> {
        let expires_at = decode_expiry(&access_token)?;
        Ok(Self {
            access_token,
            expires_at,
        })
    }

    /// Whether the token is still usable at `now`, with the skew window
    /// applied.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > Duration::seconds(EXPIRY_SKEW_SECS)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Decode the `exp` claim from the middle segment of a compact token,
/// tolerating missing base64url padding.
fn decode_expiry(token: &str) -> Result<DateTime<Utc>, AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::TokenDecode(format!(
            "expected 3 token segments, found {}",
            segments.len()
        )));
    }

    let claims = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| AuthError::TokenDecode(format!("claims segment is not base64url: {e}")))?;

    let claims: ExpiryClaim = serde_json::from_slice(&claims)
        .map_err(|e| AuthError::TokenDecode(format!("claims segment is not valid JSON: {e}")))?;

    DateTime::from_timestamp(claims.exp, 0)
        .ok_or_else(|| AuthError::TokenDecode(format!("exp {} out of range", claims.exp)))
}

impl Client {
    /// Ensure a fresh access token is cached.
    ///
    /// A no-op when the cached token expires more than
    /// [`EXPIRY_SKEW_SECS`] seconds from now. Otherwise signs a fresh
    /// bearer assertion, exchanges it at the token endpoint, and replaces
    /// the session wholesale. The session lock is held across the whole
    /// check-then-act, so concurrent callers serialize here and at most one
    /// exchange runs per genuine expiry.
    ///
    /// On failure the previous session, if any, is left untouched.
    pub async fn authenticate(&self) -> Result<(), AuthError> {
        let mut session = self.session.lock().await;
        if let Some(current) = session.as_ref() {
            if current.token.is_fresh(Utc::now()) {
                debug!("reusing cached access token");
                return Ok(());
            }
        }

        let audience = self.identity_provider_url.join(REALM_PATH)?;
        let claims = AssertionClaims::new(&self.client_id, audience.as_str(), REALM);
        let assertion =
            jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)?;

        let token_url = self.identity_provider_url.join(TOKEN_PATH)?;
        let params = [
            ("client_assertion_type", JWT_BEARER_ASSERTION_TYPE),
            ("client_assertion", assertion.as_str()),
            ("client_id", self.client_id.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .http
            .post(token_url)
            .header(USER_AGENT, &self.user_agent)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint { status, body });
        }

        let body: TokenResponse = response.json().await?;
        let token = CachedToken::from_access_token(body.access_token)?;
        let http = self.authorized_transport(&token)?;

        info!(expires_at = %token.expires_at, "exchanged client assertion for access token");
        *session = Some(Session { token, http });
        Ok(())
    }

    /// Build a transport carrying the token as a default header.
    fn authorized_transport(&self, token: &CachedToken) -> Result<reqwest::Client, AuthError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
            .map_err(|_| {
                AuthError::TokenDecode("access token contains invalid header bytes".to_string())
            })?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .default_headers(headers)
            .user_agent(self.user_agent.clone())
            .build()?;
        Ok(client)
    }
}
