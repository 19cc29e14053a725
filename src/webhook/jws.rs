// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed-structure (JWS) parsing.
//!
//! The decrypted webhook content is a JWS in compact, flattened-JSON, or
//! general-JSON serialization. Parsing exposes the signature list and the
//! payload as first-class accessors; the verifier decides how many
//! signatures are acceptable.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;

/// Signed-structure parse error.
#[derive(Debug, thiserror::Error)]
pub enum JwsError {
    #[error("signed payload is not UTF-8 text")]
    NotText,

    #[error("signed payload is neither a compact nor a JSON JWS")]
    Malformed,

    #[error("invalid JSON serialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error("segment is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("invalid signature header: {0}")]
    Header(String),
}

/// Parameters of a signature header. Only the fields the verifier needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeaderParams {
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
}

/// One signature over the payload.
#[derive(Debug, Clone)]
pub struct SignatureEntry {
    /// Base64url protected header segment, empty when absent.
    protected_b64: String,
    protected: HeaderParams,
    unprotected: HeaderParams,
    signature: Vec<u8>,
}

impl SignatureEntry {
    fn new(
        protected_b64: Option<String>,
        unprotected: Option<HeaderParams>,
        signature_b64: &str,
    ) -> Result<Self, JwsError> {
        let protected_b64 = protected_b64.unwrap_or_default();
        let protected = if protected_b64.is_empty() {
            HeaderParams::default()
        } else {
            let raw = URL_SAFE_NO_PAD.decode(&protected_b64)?;
            serde_json::from_slice(&raw).map_err(|e| JwsError::Header(e.to_string()))?
        };
        Ok(Self {
            protected_b64,
            protected,
            unprotected: unprotected.unwrap_or_default(),
            signature: URL_SAFE_NO_PAD.decode(signature_b64)?,
        })
    }

    /// The signer's key ID. The protected header wins over the unprotected
    /// one.
    pub fn kid(&self) -> Option<&str> {
        self.protected
            .kid
            .as_deref()
            .or(self.unprotected.kid.as_deref())
    }

    /// The signature algorithm named by the headers, if any.
    pub fn algorithm(&self) -> Option<&str> {
        self.protected
            .alg
            .as_deref()
            .or(self.unprotected.alg.as_deref())
    }

    /// Raw signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The bytes the signature covers: `protected '.' payload`, both in
    /// base64url form.
    pub fn signing_input(&self, payload_b64: &str) -> Vec<u8> {
        let mut input = Vec::with_capacity(self.protected_b64.len() + 1 + payload_b64.len());
        input.extend_from_slice(self.protected_b64.as_bytes());
        input.push(b'.');
        input.extend_from_slice(payload_b64.as_bytes());
        input
    }
}

#[derive(Deserialize)]
struct JsonSignature {
    #[serde(default)]
    protected: Option<String>,
    #[serde(default)]
    header: Option<HeaderParams>,
    signature: String,
}

/// General and flattened JSON serializations share this shape; exactly one
/// of `signatures` / top-level `signature` is populated.
#[derive(Deserialize)]
struct JsonJws {
    payload: String,
    #[serde(default)]
    signatures: Option<Vec<JsonSignature>>,
    #[serde(default)]
    protected: Option<String>,
    #[serde(default)]
    header: Option<HeaderParams>,
    #[serde(default)]
    signature: Option<String>,
}

/// A parsed signed structure.
#[derive(Debug, Clone)]
pub struct SignedPayload {
    payload_b64: String,
    signatures: Vec<SignatureEntry>,
}

impl SignedPayload {
    /// Parse a JWS from decrypted bytes, accepting compact, flattened-JSON,
    /// and general-JSON serializations.
    pub fn parse(input: &[u8]) -> Result<Self, JwsError> {
        let text = std::str::from_utf8(input).map_err(|_| JwsError::NotText)?;
        let text = text.trim();
        if text.starts_with('{') {
            Self::parse_json(text)
        } else {
            Self::parse_compact(text)
        }
    }

    fn parse_compact(text: &str) -> Result<Self, JwsError> {
        let segments: Vec<&str> = text.split('.').collect();
        let &[protected_b64, payload_b64, signature_b64] = segments.as_slice() else {
            return Err(JwsError::Malformed);
        };
        let entry = SignatureEntry::new(Some(protected_b64.to_string()), None, signature_b64)?;
        Ok(Self {
            payload_b64: payload_b64.to_string(),
            signatures: vec![entry],
        })
    }

    fn parse_json(text: &str) -> Result<Self, JwsError> {
        let jws: JsonJws = serde_json::from_str(text)?;
        let signatures = match (jws.signatures, jws.signature) {
            // General serialization: possibly zero, possibly many.
            (Some(list), _) => list
                .into_iter()
                .map(|s| SignatureEntry::new(s.protected, s.header, &s.signature))
                .collect::<Result<Vec<_>, _>>()?,
            // Flattened serialization: exactly one.
            (None, Some(signature)) => {
                vec![SignatureEntry::new(jws.protected, jws.header, &signature)?]
            }
            (None, None) => Vec::new(),
        };
        Ok(Self {
            payload_b64: jws.payload,
            signatures,
        })
    }

    /// The signatures carried by the structure.
    pub fn signatures(&self) -> &[SignatureEntry] {
        &self.signatures
    }

    /// Base64url payload segment, as covered by the signatures.
    pub fn payload_segment(&self) -> &str {
        &self.payload_b64
    }

    /// Decode the payload bytes. First-class: no re-serialization round
    /// trip is needed to get at the content.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, JwsError> {
        Ok(URL_SAFE_NO_PAD.decode(&self.payload_b64)?)
    }
}
