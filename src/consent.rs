// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consent link generation.
//!
//! A consent link points the end user at the bank's consent page with a
//! signed consent token in the query string. Every call signs a fresh
//! token; nothing is cached.

use jsonwebtoken::{Algorithm, Header};
use url::Url;

use crate::auth::claims::ConsentClaims;
use crate::auth::error::AuthError;
use crate::client::Client;

/// Consent page path under the site origin.
pub(crate) const CONSENT_PATH: &str = "/consent";

impl Client {
    /// Generate a consent link for the end user.
    ///
    /// `session_id` correlates the consent flow with the caller's own
    /// session; a fresh UUID is generated when `None` is passed.
    pub fn consent_link(&self, session_id: Option<&str>) -> Result<Url, AuthError> {
        let claims = ConsentClaims::new(&self.client_id, &self.consent_redirect_url, session_id);
        let token =
            jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)?;

        let mut link = self.site_url.join(CONSENT_PATH)?;
        link.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("jwt", &token);
        Ok(link)
    }
}
