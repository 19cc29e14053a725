// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bank public key cache, fed by the discovery endpoint.
//!
//! ## Semantics
//!
//! - `get` is a pure lookup and never touches the network
//! - `refresh` fetches the discovery key set and merges it by key ID:
//!   an entry with a known ID is overwritten, every other entry stays.
//!   Keys are never evicted by time, so rotation does not invalidate
//!   verifications still in flight under an old key ID
//! - A failed refresh leaves the cache exactly as it was

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rsa::{BigUint, RsaPublicKey};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Key discovery path under the API origin.
pub(crate) const DISCOVERY_KEYS_PATH: &str = "/v1/discovery/keys";

/// Key set error.
#[derive(Debug, thiserror::Error)]
pub enum KeySetError {
    /// Network failure or unparsable body from the discovery endpoint.
    #[error("key discovery request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The discovery endpoint answered with a non-success status.
    #[error("key discovery endpoint returned HTTP {status}")]
    Endpoint { status: reqwest::StatusCode },
}

/// Signature algorithm named by a JWK's `alg` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Rs256,
    Rs384,
    Rs512,
}

impl SignatureAlgorithm {
    /// RS256 is the default for RSA keys that carry no `alg`.
    fn from_alg(alg: Option<&str>) -> Self {
        match alg {
            Some("RS384") => SignatureAlgorithm::Rs384,
            Some("RS512") => SignatureAlgorithm::Rs512,
            _ => SignatureAlgorithm::Rs256,
        }
    }
}

/// A verification key resolved from the discovery key set.
#[derive(Debug, Clone)]
pub struct VerificationKey {
    pub key: RsaPublicKey,
    pub algorithm: SignatureAlgorithm,
}

/// One key of the discovery response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Jwk {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

#[derive(Deserialize)]
struct KeySetResponse {
    keys: Vec<Jwk>,
}

/// Cache of the bank's published verification keys, keyed by key ID.
///
/// Shared across all verification calls; reads and miss-triggered refreshes
/// may run concurrently.
pub struct KeySet {
    discovery_url: Url,
    keys: RwLock<HashMap<String, VerificationKey>>,
}

impl KeySet {
    pub fn new(discovery_url: Url) -> Self {
        Self {
            discovery_url,
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a key by ID. Never triggers network I/O.
    pub async fn get(&self, kid: &str) -> Option<VerificationKey> {
        self.keys.read().await.get(kid).cloned()
    }

    /// Fetch the discovery key set and merge it into the cache.
    ///
    /// Keys the endpoint no longer returns are kept; a returned key with a
    /// cached ID replaces the cached entry. Keys that cannot be used for
    /// RSA verification (other key types, missing components) are skipped.
    pub async fn refresh(&self, http: &reqwest::Client) -> Result<(), KeySetError> {
        let response = http.get(self.discovery_url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::Endpoint { status });
        }

        let body: KeySetResponse = response.json().await?;
        let merged = self.merge(body.keys).await;
        debug!(merged, "refreshed bank public keys");
        Ok(())
    }

    pub(crate) async fn merge(&self, jwks: Vec<Jwk>) -> usize {
        let mut merged = 0;
        let mut keys = self.keys.write().await;
        for jwk in jwks {
            let Some(kid) = jwk.kid.clone() else {
                warn!("discovery key without kid skipped");
                continue;
            };
            match verification_key(&jwk) {
                Some(key) => {
                    keys.insert(kid, key);
                    merged += 1;
                }
                None => {
                    warn!(%kid, kty = %jwk.kty, "unusable discovery key skipped");
                }
            }
        }
        merged
    }
}

/// Convert an RSA JWK into a verification key.
fn verification_key(jwk: &Jwk) -> Option<VerificationKey> {
    if jwk.kty != "RSA" {
        return None;
    }
    let n = URL_SAFE_NO_PAD.decode(jwk.n.as_deref()?).ok()?;
    let e = URL_SAFE_NO_PAD.decode(jwk.e.as_deref()?).ok()?;
    let key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e)).ok()?;
    Some(VerificationKey {
        key,
        algorithm: SignatureAlgorithm::from_alg(jwk.alg.as_deref()),
    })
}
