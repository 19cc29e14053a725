// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end tests of the trust subsystem against mock bank endpoints:
//! token lifecycle, key discovery, and webhook verification.

use aes_gcm::aead::{Aead, KeyInit, Nonce, Payload};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use rand::RngCore;
use rsa::pkcs8::EncodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde_json::json;
use sha2::{Digest, Sha256};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relational_bank_client::auth::claims::{AssertionClaims, TOKEN_VALIDITY_SECS};
use relational_bank_client::keys::KeySet;
use relational_bank_client::{AuthError, Client, WebhookError};

const TOKEN_PATH: &str = "/auth/realms/relational_bank/protocol/openid-connect/token";
const DISCOVERY_PATH: &str = "/v1/discovery/keys";

fn generate_key() -> RsaPrivateKey {
    RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap()
}

fn pem(key: &RsaPrivateKey) -> String {
    key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
        .unwrap()
        .to_string()
}

async fn test_client(key: &RsaPrivateKey, server: &MockServer) -> Client {
    Client::builder()
        .client_id("test-client")
        .private_key_pem(pem(key))
        .consent_redirect_url("https://example.com/cb")
        .sandbox(true)
        .identity_provider_url(server.uri())
        .api_url(server.uri())
        .build()
        .unwrap()
}

/// A syntactically compact access token whose middle segment carries `exp`.
fn access_token(exp: i64) -> String {
    format!(
        "e30.{}.c2ln",
        URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#))
    )
}

fn jwk_json(kid: &str, key: &RsaPublicKey) -> serde_json::Value {
    json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "alg": "RS256",
        "n": URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
        "e": URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
    })
}

/// Sign `payload` as a compact RS256 JWS under `kid`.
fn sign_compact(payload: &[u8], key: &RsaPrivateKey, kid: &str) -> String {
    let protected = URL_SAFE_NO_PAD.encode(format!(r#"{{"alg":"RS256","kid":"{kid}"}}"#));
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let input = format!("{protected}.{payload_b64}");
    let digest = Sha256::digest(input.as_bytes());
    let signature = key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest).unwrap();
    format!("{input}.{}", URL_SAFE_NO_PAD.encode(signature))
}

/// Encrypt `content` to the client's public key as a compact JWE
/// (RSA-OAEP-256, A256GCM), the way the bank wraps webhook deliveries.
fn seal(content: &[u8], recipient: &RsaPublicKey) -> String {
    let mut rng = rand::rngs::OsRng;
    let mut cek = [0u8; 32];
    rng.fill_bytes(&mut cek);
    let mut iv = [0u8; 12];
    rng.fill_bytes(&mut iv);

    let protected = URL_SAFE_NO_PAD.encode(r#"{"alg":"RSA-OAEP-256","enc":"A256GCM"}"#);
    let mut sealed = Aes256Gcm::new_from_slice(&cek)
        .unwrap()
        .encrypt(
            Nonce::<Aes256Gcm>::from_slice(&iv),
            Payload {
                msg: content,
                aad: protected.as_bytes(),
            },
        )
        .unwrap();
    let tag = sealed.split_off(sealed.len() - 16);

    let encrypted_key = recipient
        .encrypt(&mut rng, Oaep::new::<Sha256>(), &cek)
        .unwrap();

    format!(
        "{protected}.{}.{}.{}.{}",
        URL_SAFE_NO_PAD.encode(encrypted_key),
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(&sealed),
        URL_SAFE_NO_PAD.encode(&tag),
    )
}

// --- token lifecycle ------------------------------------------------------

#[tokio::test]
async fn fresh_token_is_reused_without_a_second_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=test-client"))
        .and(body_string_contains("client_assertion_type="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token(Utc::now().timestamp() + 3600),
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let key = generate_key();
    let client = test_client(&key, &server).await;

    client.authenticate().await.unwrap();
    let token = client.bearer_token().await.unwrap();

    // Immediate second call: cached token is fresh, no second round trip.
    client.authenticate().await.unwrap();
    assert_eq!(client.bearer_token().await.unwrap(), token);
    assert!(client.authorized_http().await.is_some());
}

#[tokio::test]
async fn nearly_expired_token_triggers_a_new_exchange() {
    let server = MockServer::start().await;
    // exp only 10 seconds out: inside the 30 second skew window, so every
    // authenticate call exchanges again.
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token(Utc::now().timestamp() + 10),
        })))
        .expect(2)
        .mount(&server)
        .await;

    let key = generate_key();
    let client = test_client(&key, &server).await;
    client.authenticate().await.unwrap();
    client.authenticate().await.unwrap();
}

#[tokio::test]
async fn token_endpoint_failure_leaves_no_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let key = generate_key();
    let client = test_client(&key, &server).await;
    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, AuthError::TokenEndpoint { .. }));
    assert!(client.bearer_token().await.is_none());
}

#[tokio::test]
async fn undecodable_access_token_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "not-a-compact-token",
        })))
        .mount(&server)
        .await;

    let key = generate_key();
    let client = test_client(&key, &server).await;
    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, AuthError::TokenDecode(_)));
    assert!(client.bearer_token().await.is_none());
}

#[test]
fn signed_assertion_carries_the_claimed_validity_window() {
    let key = generate_key();
    let signing_key = jsonwebtoken::EncodingKey::from_rsa_pem(pem(&key).as_bytes()).unwrap();

    let claims = AssertionClaims::new("test-client", "https://idp/realm", "relational_bank");
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
        &claims,
        &signing_key,
    )
    .unwrap();

    // Decode the middle segment and check the embedded window.
    let middle = token.split('.').nth(1).unwrap();
    let decoded: AssertionClaims =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(middle).unwrap()).unwrap();
    assert_eq!(decoded.exp - decoded.iat, TOKEN_VALIDITY_SECS);
    assert_eq!(decoded.jti, claims.jti);
}

// --- key discovery --------------------------------------------------------

#[tokio::test]
async fn refresh_merges_returned_keys_and_get_stays_pure() {
    let server = MockServer::start().await;
    let key_a = generate_key().to_public_key();
    let key_b = generate_key().to_public_key();
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [jwk_json("a", &key_a), jwk_json("b", &key_b)],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let set = KeySet::new(
        url::Url::parse(&server.uri())
            .unwrap()
            .join(DISCOVERY_PATH)
            .unwrap(),
    );
    let http = reqwest::Client::new();

    set.refresh(&http).await.unwrap();
    assert!(set.get("a").await.is_some());
    assert!(set.get("b").await.is_some());
    // A miss is just a miss; `get` never fetches.
    assert!(set.get("c").await.is_none());
}

#[tokio::test]
async fn failed_refresh_surfaces_error_and_keeps_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let set = KeySet::new(
        url::Url::parse(&server.uri())
            .unwrap()
            .join(DISCOVERY_PATH)
            .unwrap(),
    );
    let err = set.refresh(&reqwest::Client::new()).await.unwrap_err();
    assert!(matches!(
        err,
        relational_bank_client::KeySetError::Endpoint { .. }
    ));
    assert!(set.get("a").await.is_none());
}

// --- webhook verification -------------------------------------------------

#[tokio::test]
async fn webhook_round_trip_returns_original_payload() {
    let server = MockServer::start().await;
    let client_key = generate_key();
    let signer_key = generate_key();

    // One discovery fetch serves both verifications: the second hit comes
    // from the cache.
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [jwk_json("sig-1", &signer_key.to_public_key())],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&client_key, &server).await;

    let payload = br#"{"event":"transfer.settled","amount":1250}"#;
    let envelope = seal(
        sign_compact(payload, &signer_key, "sig-1").as_bytes(),
        &client_key.to_public_key(),
    );

    let verified = client.verify_webhook(&envelope).await.unwrap();
    assert_eq!(verified, payload);

    let again = client.verify_webhook(&envelope).await.unwrap();
    assert_eq!(again, payload);
}

#[tokio::test]
async fn multi_signature_payload_fails_closed() {
    let server = MockServer::start().await;
    let client_key = generate_key();
    let signer_key = generate_key();

    // Discovery must never be consulted for an unsupported structure.
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keys": []})))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&client_key, &server).await;

    let payload_b64 = URL_SAFE_NO_PAD.encode(b"data");
    let compact = sign_compact(b"data", &signer_key, "sig-1");
    let signature_b64 = compact.split('.').nth(2).unwrap();
    let protected_b64 = compact.split('.').next().unwrap();
    let general = json!({
        "payload": payload_b64,
        "signatures": [
            { "protected": protected_b64, "signature": signature_b64 },
            { "protected": protected_b64, "signature": signature_b64 },
        ],
    });

    let envelope = seal(general.to_string().as_bytes(), &client_key.to_public_key());
    let err = client.verify_webhook(&envelope).await.unwrap_err();
    assert!(matches!(err, WebhookError::UnsupportedSignatureCount(2)));

    let unsigned = json!({ "payload": payload_b64, "signatures": [] });
    let envelope = seal(unsigned.to_string().as_bytes(), &client_key.to_public_key());
    let err = client.verify_webhook(&envelope).await.unwrap_err();
    assert!(matches!(err, WebhookError::UnsupportedSignatureCount(0)));
}

#[tokio::test]
async fn unknown_kid_refreshes_exactly_once_then_succeeds() {
    let server = MockServer::start().await;
    let client_key = generate_key();
    let rotated_key = generate_key();

    // The rotated key is only published at refresh time; one fetch must be
    // enough.
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [jwk_json("rot-2", &rotated_key.to_public_key())],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&client_key, &server).await;
    let envelope = seal(
        sign_compact(b"rotated", &rotated_key, "rot-2").as_bytes(),
        &client_key.to_public_key(),
    );
    assert_eq!(client.verify_webhook(&envelope).await.unwrap(), b"rotated");
}

#[tokio::test]
async fn kid_still_unknown_after_one_refresh_is_rejected() {
    let server = MockServer::start().await;
    let client_key = generate_key();
    let signer_key = generate_key();

    // Discovery answers, but never learns about "rot-2": exactly one
    // refresh, then rejection. No second fetch.
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [jwk_json("other", &signer_key.to_public_key())],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&client_key, &server).await;
    let envelope = seal(
        sign_compact(b"data", &signer_key, "rot-2").as_bytes(),
        &client_key.to_public_key(),
    );
    let err = client.verify_webhook(&envelope).await.unwrap_err();
    assert!(matches!(err, WebhookError::UnknownSigningKey { kid } if kid == "rot-2"));
}

#[tokio::test]
async fn signature_under_wrong_key_is_rejected() {
    let server = MockServer::start().await;
    let client_key = generate_key();
    let signer_key = generate_key();
    let imposter_key = generate_key();

    // Discovery publishes a different key under the signer's kid.
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [jwk_json("sig-1", &imposter_key.to_public_key())],
        })))
        .mount(&server)
        .await;

    let client = test_client(&client_key, &server).await;
    let envelope = seal(
        sign_compact(b"data", &signer_key, "sig-1").as_bytes(),
        &client_key.to_public_key(),
    );
    let err = client.verify_webhook(&envelope).await.unwrap_err();
    assert!(matches!(err, WebhookError::SignatureInvalid));
}
