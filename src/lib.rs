// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Bank Client - Open Banking API Client SDK
//!
//! This crate implements the trust subsystem of the Relational Bank API
//! client: assertion-based OAuth2 authentication with token caching, consent
//! link generation, and decryption plus signature verification of inbound
//! webhooks against the bank's published key set.
//!
//! ## Modules
//!
//! - `client` - Client context and builder
//! - `auth` - Assertion signing and access token lifecycle
//! - `consent` - Consent link generation
//! - `keys` - Public key cache fed by the discovery endpoint
//! - `webhook` - Webhook envelope decryption and verification
//!
//! ## Usage
//!
//! ```no_run
//! use relational_bank_client::Client;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder()
//!     .client_id("my-client")
//!     .private_key_pem(std::fs::read_to_string("key.pem")?)
//!     .consent_redirect_url("https://example.com/callback")
//!     .sandbox(true)
//!     .build()?;
//!
//! client.authenticate().await?;
//! let link = client.consent_link(None)?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod consent;
pub mod keys;
pub mod webhook;

pub use auth::AuthError;
pub use client::{BuildError, Client, ClientBuilder};
pub use config::{Config, ConfigError, Environment};
pub use keys::{KeySet, KeySetError};
pub use webhook::WebhookError;
