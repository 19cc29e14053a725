// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use reqwest::StatusCode;

/// Authentication error.
///
/// `Transport` failures are recoverable by caller retry; the rest indicate
/// the exchange or the returned token itself was bad and are not retried
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Network or HTTP-level failure talking to the identity provider.
    #[error("token endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned HTTP {status}: {body}")]
    TokenEndpoint { status: StatusCode, body: String },

    /// The returned access token could not be decoded. The token is treated
    /// as invalid rather than trusted blindly.
    #[error("access token could not be decoded: {0}")]
    TokenDecode(String),

    /// Signing the client assertion failed.
    #[error("failed to sign client assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}
