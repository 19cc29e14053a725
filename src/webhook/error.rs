// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Webhook verification errors.

use crate::keys::KeySetError;
use crate::webhook::jwe::JweError;

/// Webhook verification error.
///
/// Each variant is terminal for the verification attempt: no plaintext is
/// returned unless every step succeeded. The caller must reject the
/// delivery on any of these.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The envelope could not be decrypted with the client's private key.
    #[error("failed to decrypt webhook envelope: {0}")]
    DecryptionFailed(#[from] JweError),

    /// The decrypted bytes are not a well-formed signed structure.
    #[error("decrypted payload is not a valid signed structure: {0}")]
    MalformedSignedPayload(String),

    /// The signed structure carries zero or more than one signature.
    /// Multi-signature payloads are unsupported and fail closed.
    #[error("expected exactly one signature, found {0}")]
    UnsupportedSignatureCount(usize),

    /// No verification key for the signer's key ID, even after one
    /// discovery refresh.
    #[error("no verification key for key ID {kid:?}")]
    UnknownSigningKey { kid: String },

    /// The signature does not verify under the resolved key.
    #[error("webhook signature verification failed")]
    SignatureInvalid,

    /// Refreshing the discovery key set failed; recoverable by caller
    /// retry.
    #[error("public key discovery failed: {0}")]
    KeyDiscovery(#[from] KeySetError),
}
