// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Compact JWE envelope decryption.
//!
//! Webhook deliveries arrive as five-part compact JWE serializations. The
//! content encryption key is unwrapped with the client's RSA private key
//! (RSA-OAEP or RSA-OAEP-256) and the ciphertext is opened with AES-GCM,
//! authenticating the protected header as associated data. A failed
//! authentication tag yields no plaintext at all.

use aes_gcm::aead::generic_array::typenum::U12;
use aes_gcm::aead::{Aead, KeyInit, Nonce, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rsa::{Oaep, RsaPrivateKey};
use serde::Deserialize;
use sha1::Sha1;
use sha2::Sha256;

type Aes192Gcm = AesGcm<aes_gcm::aes::Aes192, U12>;

/// GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Envelope decryption error.
#[derive(Debug, thiserror::Error)]
pub enum JweError {
    #[error("envelope is not a compact JWE serialization")]
    Malformed,

    #[error("envelope segment is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("invalid protected header: {0}")]
    Header(#[from] serde_json::Error),

    #[error("unsupported key management algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("unsupported content encryption algorithm {0:?}")]
    UnsupportedEncryption(String),

    #[error("content encryption key unwrap failed")]
    KeyUnwrap,

    #[error("content encryption key has wrong length")]
    KeyLength,

    #[error("initialization vector must be 96 bits")]
    NonceLength,

    #[error("ciphertext integrity check failed")]
    Integrity,
}

#[derive(Deserialize)]
struct ProtectedHeader {
    alg: String,
    enc: String,
}

/// Decrypt a compact JWE envelope with the client's private key.
pub fn decrypt(envelope: &str, key: &RsaPrivateKey) -> Result<Vec<u8>, JweError> {
    let segments: Vec<&str> = envelope.trim().split('.').collect();
    let &[protected_b64, encrypted_key_b64, iv_b64, ciphertext_b64, tag_b64] =
        segments.as_slice()
    else {
        return Err(JweError::Malformed);
    };

    let header: ProtectedHeader =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(protected_b64)?)?;

    let encrypted_key = URL_SAFE_NO_PAD.decode(encrypted_key_b64)?;
    let cek = unwrap_cek(&header.alg, key, &encrypted_key)?;

    let iv = URL_SAFE_NO_PAD.decode(iv_b64)?;
    if iv.len() != NONCE_LEN {
        return Err(JweError::NonceLength);
    }

    // AES-GCM implementations take ciphertext and tag as one buffer.
    let mut sealed = URL_SAFE_NO_PAD.decode(ciphertext_b64)?;
    let tag = URL_SAFE_NO_PAD.decode(tag_b64)?;
    if tag.len() != TAG_LEN {
        return Err(JweError::Integrity);
    }
    sealed.extend_from_slice(&tag);

    let payload = Payload {
        msg: &sealed,
        // The protected header segment, in its base64url form, is the AAD.
        aad: protected_b64.as_bytes(),
    };

    match header.enc.as_str() {
        "A128GCM" => open::<Aes128Gcm>(&cek, &iv, payload),
        "A192GCM" => open::<Aes192Gcm>(&cek, &iv, payload),
        "A256GCM" => open::<Aes256Gcm>(&cek, &iv, payload),
        other => Err(JweError::UnsupportedEncryption(other.to_string())),
    }
}

/// Unwrap the content encryption key with RSA-OAEP.
fn unwrap_cek(alg: &str, key: &RsaPrivateKey, encrypted_key: &[u8]) -> Result<Vec<u8>, JweError> {
    let padding = match alg {
        "RSA-OAEP" => Oaep::new::<Sha1>(),
        "RSA-OAEP-256" => Oaep::new::<Sha256>(),
        other => return Err(JweError::UnsupportedAlgorithm(other.to_string())),
    };
    key.decrypt(padding, encrypted_key)
        .map_err(|_| JweError::KeyUnwrap)
}

fn open<C>(cek: &[u8], iv: &[u8], payload: Payload<'_, '_>) -> Result<Vec<u8>, JweError>
where
    C: Aead + KeyInit,
{
    let cipher = C::new_from_slice(cek).map_err(|_| JweError::KeyLength)?;
    cipher
        .decrypt(Nonce::<C>::from_slice(iv), payload)
        .map_err(|_| JweError::Integrity)
}
