// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client context and builder.
//!
//! A [`Client`] owns one bank identity (client ID plus RSA private key) and
//! the mutable trust state derived from it: the cached access token and the
//! bank's public key cache. Multiple clients with different identities can
//! coexist in one process; there is no global state.

use std::time::Duration;

use jsonwebtoken::EncodingKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use tokio::sync::Mutex;
use url::Url;

use crate::auth::token::CachedToken;
use crate::config::{Config, Environment};
use crate::keys::{KeySet, DISCOVERY_KEYS_PATH};

/// Timeout applied to every outbound HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const DEFAULT_USER_AGENT: &str = concat!(
    "relational-bank-client/",
    env!("CARGO_PKG_VERSION")
);

/// Error building a [`Client`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("client ID is required")]
    MissingClientId,

    #[error("private key PEM is required")]
    MissingPrivateKey,

    #[error("private key PEM could not be parsed: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid origin URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// An authenticated session: the cached access token and a transport that
/// carries it. Replaced wholesale on every successful token exchange.
pub(crate) struct Session {
    pub(crate) token: CachedToken,
    pub(crate) http: reqwest::Client,
}

/// Relational Bank API client.
///
/// Construct with [`Client::builder`] or [`Client::from_config`].
pub struct Client {
    pub(crate) client_id: String,
    pub(crate) consent_redirect_url: String,
    pub(crate) user_agent: String,
    pub(crate) identity_provider_url: Url,
    pub(crate) site_url: Url,

    /// Signing half of the client key, for assertion and consent JWTs.
    pub(crate) signing_key: EncodingKey,
    /// Decryption half of the same key, for webhook envelopes.
    pub(crate) decryption_key: RsaPrivateKey,

    /// Unauthenticated transport (token exchange, key discovery fallback).
    pub(crate) http: reqwest::Client,
    /// Current session. Guarded by one lock covering the whole
    /// check-then-act in `authenticate`.
    pub(crate) session: Mutex<Option<Session>>,
    /// Bank public keys, fed by the discovery endpoint.
    pub(crate) keys: KeySet,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.client_id)
            .field("consent_redirect_url", &self.consent_redirect_url)
            .field("user_agent", &self.user_agent)
            .field("identity_provider_url", &self.identity_provider_url)
            .field("site_url", &self.site_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Start building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Build a client from environment-loaded [`Config`].
    pub fn from_config(config: Config) -> Result<Self, BuildError> {
        Self::builder()
            .client_id(config.client_id)
            .private_key_pem(config.private_key_pem)
            .consent_redirect_url(config.consent_redirect_url)
            .environment(config.environment)
            .build()
    }

    /// The current access token, if an unexpired session exists.
    ///
    /// Freshness is not re-checked here; call [`Client::authenticate`] first
    /// when a valid token is required.
    pub async fn bearer_token(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.token.access_token.clone())
    }

    /// A transport with the current access token attached as a default
    /// `Authorization` header, for the surrounding resource accessors.
    pub async fn authorized_http(&self) -> Option<reqwest::Client> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.http.clone())
    }
}

/// Builder for [`Client`].
///
/// Mirrors the options accepted by the bank's reference clients: client ID,
/// PEM private key, and consent redirect URL are required; environment
/// defaults to production; origins can be overridden individually for
/// testing.
#[derive(Default)]
pub struct ClientBuilder {
    client_id: Option<String>,
    private_key_pem: Option<String>,
    consent_redirect_url: Option<String>,
    environment: Environment,
    user_agent: Option<String>,
    identity_provider_url: Option<String>,
    api_url: Option<String>,
    site_url: Option<String>,
}

impl ClientBuilder {
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn private_key_pem(mut self, pem: impl Into<String>) -> Self {
        self.private_key_pem = Some(pem.into());
        self
    }

    pub fn consent_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.consent_redirect_url = Some(url.into());
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Shorthand for `environment(Environment::Sandbox)` when `true`.
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.environment = if sandbox {
            Environment::Sandbox
        } else {
            Environment::Production
        };
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Override the identity-provider origin (token endpoint host).
    pub fn identity_provider_url(mut self, url: impl Into<String>) -> Self {
        self.identity_provider_url = Some(url.into());
        self
    }

    /// Override the API origin (key discovery host).
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Override the site origin (consent link host).
    pub fn site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = Some(url.into());
        self
    }

    pub fn build(self) -> Result<Client, BuildError> {
        let client_id = self.client_id.ok_or(BuildError::MissingClientId)?;
        let pem = self.private_key_pem.ok_or(BuildError::MissingPrivateKey)?;

        let signing_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| BuildError::InvalidPrivateKey(e.to_string()))?;
        let decryption_key = parse_rsa_private_key(&pem)?;

        let environment = self.environment;
        let identity_provider_url = Url::parse(
            self.identity_provider_url
                .as_deref()
                .unwrap_or_else(|| environment.identity_provider_origin()),
        )?;
        let api_url = Url::parse(
            self.api_url
                .as_deref()
                .unwrap_or_else(|| environment.api_origin()),
        )?;
        let site_url = Url::parse(
            self.site_url
                .as_deref()
                .unwrap_or_else(|| environment.site_origin()),
        )?;
        let discovery_url = api_url.join(DISCOVERY_KEYS_PATH)?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Client {
            client_id,
            consent_redirect_url: self.consent_redirect_url.unwrap_or_default(),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            identity_provider_url,
            site_url,
            signing_key,
            decryption_key,
            http,
            session: Mutex::new(None),
            keys: KeySet::new(discovery_url),
        })
    }
}

/// Parse the decryption half of the client key.
///
/// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) and PKCS#1 (`BEGIN RSA PRIVATE KEY`)
/// encodings, same as the signing half handled by `jsonwebtoken`.
fn parse_rsa_private_key(pem: &str) -> Result<RsaPrivateKey, BuildError> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| BuildError::InvalidPrivateKey(e.to_string()))
}
