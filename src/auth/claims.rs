// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claim sets signed by the client.
//!
//! Both claim sets are ephemeral: constructed per signing call, never
//! persisted. Fields are named and typed; the one legitimately dynamic
//! field (`session_metadata` on consent claims) is an explicit map.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validity window stamped on every self-issued token.
pub const TOKEN_VALIDITY_SECS: i64 = 2 * 60 * 60;

/// Audience of consent tokens: the bank's consent service.
pub const CONSENT_AUDIENCE: &str = "accounts-hubid@bank.relational.network";

/// Claims of the JWT bearer assertion presented to the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Identity provider realm URL.
    pub aud: String,
    pub client_id: String,
    pub exp: i64,
    pub iat: i64,
    /// Fresh unique token ID.
    pub jti: String,
    pub iss: String,
    pub nbf: i64,
    pub realm: String,
    pub sub: String,
}

impl AssertionClaims {
    /// Build a claim set valid from now for [`TOKEN_VALIDITY_SECS`].
    ///
    /// The client is both issuer and subject of its own assertion.
    pub fn new(client_id: &str, audience: &str, realm: &str) -> Self {
        let now = Utc::now().timestamp();
        Self {
            aud: audience.to_string(),
            client_id: client_id.to_string(),
            exp: now + TOKEN_VALIDITY_SECS,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            iss: client_id.to_string(),
            nbf: now,
            realm: realm.to_string(),
            sub: client_id.to_string(),
        }
    }
}

/// Claims of the consent token embedded in a consent link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentClaims {
    pub aud: String,
    pub client_id: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    /// Session ID; doubles as the token ID.
    pub jti: String,
    pub nbf: i64,
    pub redirect_uri: String,
    /// Open extension slot for session-scoped metadata.
    pub session_metadata: HashMap<String, String>,
    #[serde(rename = "type")]
    pub token_type: String,
}

impl ConsentClaims {
    /// Build a consent claim set. A fresh session ID is generated when the
    /// caller supplies none.
    pub fn new(client_id: &str, redirect_uri: &str, session_id: Option<&str>) -> Self {
        let now = Utc::now().timestamp();
        let session_id = match session_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let mut session_metadata = HashMap::new();
        session_metadata.insert("client_session".to_string(), session_id.clone());

        Self {
            aud: CONSENT_AUDIENCE.to_string(),
            client_id: client_id.to_string(),
            exp: now + TOKEN_VALIDITY_SECS,
            iat: now,
            iss: client_id.to_string(),
            jti: session_id,
            nbf: now,
            redirect_uri: redirect_uri.to_string(),
            session_metadata,
            token_type: "consent".to_string(),
        }
    }
}
