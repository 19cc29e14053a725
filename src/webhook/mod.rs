// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Webhook Verification Module
//!
//! Inbound webhooks are delivered as an encrypted envelope whose decrypted
//! content is itself a signed structure. Decryption alone does not
//! authenticate the sender, so confidentiality and authenticity are checked
//! as two independent cryptographic operations:
//!
//! 1. Decrypt the envelope with the client's private key
//! 2. Parse the decrypted bytes as a signed structure
//! 3. Require exactly one signature and resolve its key ID against the
//!    bank's published key set, refreshing the cache at most once on a miss
//! 4. Verify the signature over the embedded payload
//! 5. Return the decoded payload bytes
//!
//! Any failure rejects the delivery with a typed [`WebhookError`]; no
//! partially verified plaintext is ever returned.

pub mod error;
pub mod jwe;
pub mod jws;

use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::debug;

use crate::client::Client;
use crate::keys::{SignatureAlgorithm, VerificationKey};

pub use error::WebhookError;

impl Client {
    /// Decrypt and verify a webhook delivery, returning the authenticated
    /// payload bytes.
    pub async fn verify_webhook(&self, envelope: &str) -> Result<Vec<u8>, WebhookError> {
        let decrypted = jwe::decrypt(envelope, &self.decryption_key)?;

        let signed = jws::SignedPayload::parse(&decrypted)
            .map_err(|e| WebhookError::MalformedSignedPayload(e.to_string()))?;

        // Exactly one signature; zero or several fail closed before any
        // key resolution happens.
        let [signature] = signed.signatures() else {
            return Err(WebhookError::UnsupportedSignatureCount(
                signed.signatures().len(),
            ));
        };

        let kid = signature.kid().unwrap_or_default();
        let key = self.signing_key_for(kid).await?;

        verify_signature(
            &key,
            &signature.signing_input(signed.payload_segment()),
            signature.signature(),
        )?;

        signed
            .payload_bytes()
            .map_err(|e| WebhookError::MalformedSignedPayload(e.to_string()))
    }

    /// Resolve a verification key by ID, refreshing the key cache at most
    /// once on a miss.
    async fn signing_key_for(&self, kid: &str) -> Result<VerificationKey, WebhookError> {
        if let Some(key) = self.keys.get(kid).await {
            return Ok(key);
        }

        debug!(%kid, "verification key not cached, refreshing discovery keys");
        let http = self
            .authorized_http()
            .await
            .unwrap_or_else(|| self.http.clone());
        self.keys.refresh(&http).await?;

        self.keys
            .get(kid)
            .await
            .ok_or_else(|| WebhookError::UnknownSigningKey {
                kid: kid.to_string(),
            })
    }
}

/// Verify an RSA PKCS#1 v1.5 signature under the resolved key.
fn verify_signature(
    key: &VerificationKey,
    signing_input: &[u8],
    signature: &[u8],
) -> Result<(), WebhookError> {
    let (scheme, hashed) = match key.algorithm {
        SignatureAlgorithm::Rs256 => (
            Pkcs1v15Sign::new::<Sha256>(),
            Sha256::digest(signing_input).to_vec(),
        ),
        SignatureAlgorithm::Rs384 => (
            Pkcs1v15Sign::new::<Sha384>(),
            Sha384::digest(signing_input).to_vec(),
        ),
        SignatureAlgorithm::Rs512 => (
            Pkcs1v15Sign::new::<Sha512>(),
            Sha512::digest(signing_input).to_vec(),
        ),
    };
    key.key
        .verify(scheme, &hashed, signature)
        .map_err(|_| WebhookError::SignatureInvalid)
}
