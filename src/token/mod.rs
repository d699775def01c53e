//! Signed bearer tokens for the auth layer.
//!
//! Tokens are compact HS256-signed tokens (`header.claims.signature`,
//! base64url without padding) carrying the username as the `sub` claim
//! plus `iat`/`exp` timestamps. Verification checks the signature in
//! constant time before looking at expiry, so an attacker cannot
//! distinguish a forged token from an expired one.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Token header (fixed: HS256).
#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Claims carried by an access token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    /// Subject: the application username.
    pub sub: String,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Token verification errors
#[derive(Debug, PartialEq, Clone)]
pub enum TokenError {
    /// Not three base64url segments, or undecodable header/claims
    Malformed,
    /// Signature does not match
    InvalidSignature,
    /// Signature is valid but the token has expired
    Expired,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::InvalidSignature => write!(f, "Invalid token signature"),
            TokenError::Expired => write!(f, "Token expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Mints and verifies signed access tokens.
///
/// The secret is shared across all tokens; rotating it invalidates
/// every outstanding session.
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    /// Create a signer with the given secret and token lifetime.
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Mint a token for `username` valid for the configured TTL.
    pub fn mint(&self, username: &str) -> String {
        self.mint_with_ttl(username, self.ttl)
    }

    /// Mint a token with an explicit lifetime (negative values produce
    /// already-expired tokens, used by expiry tests).
    pub fn mint_with_ttl(&self, username: &str, ttl: Duration) -> String {
        let now = Utc::now();
        let header = Header {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        // serde_json cannot fail on these plain structs
        let header_b64 = B64.encode(serde_json::to_vec(&header).expect("serialize header"));
        let claims_b64 = B64.encode(serde_json::to_vec(&claims).expect("serialize claims"));

        let signing_input = format!("{}.{}", header_b64, claims_b64);
        let signature = self.sign(signing_input.as_bytes());

        format!("{}.{}", signing_input, B64.encode(signature))
    }

    /// Verify a token's signature and expiry, returning its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(TokenError::Malformed);
        }

        let signing_input = format!("{}.{}", parts[0], parts[1]);
        let signature = B64.decode(parts[2]).map_err(|_| TokenError::Malformed)?;

        // Constant-time signature check before anything else
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims_bytes = B64.decode(parts[1]).map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&claims_bytes).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}
