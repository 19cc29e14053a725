// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Assertion-based OAuth2 authentication against the bank's identity
//! provider.
//!
//! ## Auth Flow
//!
//! 1. `Client::authenticate` checks the cached access token; a token whose
//!    expiry is more than 30 seconds out is reused as-is
//! 2. Otherwise the client signs a fresh RS256 JWT bearer assertion
//!    (2 hour window, fresh `jti`) with its private key
//! 3. The assertion is exchanged at the identity provider's token endpoint
//!    using the `client_credentials` grant
//! 4. The returned access token's own `exp` claim is decoded and the token
//!    is cached, replacing the previous one wholesale
//!
//! ## Concurrency
//!
//! One `Mutex` guards the entire check-then-act sequence. Concurrent
//! callers serialize on it; whichever caller wins the exchange leaves a
//! fresh token for the rest. There is no single-flight machinery beyond the
//! lock.

pub mod claims;
pub mod error;
pub mod token;

pub use claims::{AssertionClaims, ConsentClaims};
pub use error::AuthError;
