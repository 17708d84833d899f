//! Session Authentication
//!
//! Issues the signed, time-bounded credential the bridge presents when
//! opening its cloud session. Tokens are HS256 JWTs with a fixed one-hour
//! window; the bridge never refreshes them, so a session outliving the
//! window will fail re-authentication.
//!
//! Two construction backends exist: the `jsonwebtoken` library and a manual
//! base64url + HMAC construction. Both emit byte-identical tokens for the
//! same subject and issue instant; the manual path is for environments
//! without the library, not a degraded mode.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

/// Credential lifetime in seconds (fixed window, never refreshed).
const CREDENTIAL_TTL_SECS: i64 = 3600;

/// Role claim the cloud side authorizes for bridge connections.
const BRIDGE_ROLE: &str = "engine";

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Claims serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// JWT claims proving the bridge's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (engine id)
    pub sub: String,
    /// Role the cloud side authorizes
    pub role: String,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// Token construction backend, selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenBackend {
    /// `jsonwebtoken` library
    Standard,
    /// Manual base64url header/claims + HMAC-SHA256 signature
    Manual,
}

/// Issues the bridge's cloud session credential.
pub struct SessionAuthenticator {
    secret: String,
    backend: TokenBackend,
}

impl SessionAuthenticator {
    pub fn new(secret: &str, backend: TokenBackend) -> Self {
        Self {
            secret: secret.to_string(),
            backend,
        }
    }

    /// Issue an encoded credential for the given subject, valid from now
    /// for the fixed window.
    pub fn issue(&self, subject: &str) -> Result<String, AuthError> {
        self.issue_at(subject, Utc::now().timestamp())
    }

    fn issue_at(&self, subject: &str, iat: i64) -> Result<String, AuthError> {
        let claims = Claims {
            sub: subject.to_string(),
            role: BRIDGE_ROLE.to_string(),
            iat,
            exp: iat + CREDENTIAL_TTL_SECS,
        };

        match self.backend {
            TokenBackend::Standard => Ok(encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(self.secret.as_bytes()),
            )?),
            TokenBackend::Manual => self.encode_manual(&claims),
        }
    }

    /// Manual HS256 construction: base64url-encoded header and claims,
    /// dot-joined, signed with HMAC-SHA256. Field order matches what
    /// `jsonwebtoken` serializes so the two backends are interchangeable.
    fn encode_manual(&self, claims: &Claims) -> Result<String, AuthError> {
        #[derive(Serialize)]
        struct ManualHeader {
            typ: &'static str,
            alg: &'static str,
        }

        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&ManualHeader {
            typ: "JWT",
            alg: "HS256",
        })?);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let message = format!("{header}.{body}");

        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC key length");
        mac.update(message.as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{message}.{sig}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    fn decode_claims(token: &str, secret: &str) -> Claims {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .expect("token should decode")
        .claims
    }

    #[test]
    fn test_issue_standard_decodes() {
        let auth = SessionAuthenticator::new("secret", TokenBackend::Standard);
        let token = auth.issue("engine_local_01").unwrap();

        let claims = decode_claims(&token, "secret");
        assert_eq!(claims.sub, "engine_local_01");
        assert_eq!(claims.role, "engine");
        assert_eq!(claims.exp - claims.iat, CREDENTIAL_TTL_SECS);
    }

    #[test]
    fn test_issue_manual_decodes() {
        let auth = SessionAuthenticator::new("secret", TokenBackend::Manual);
        let token = auth.issue("engine_local_01").unwrap();

        let claims = decode_claims(&token, "secret");
        assert_eq!(claims.sub, "engine_local_01");
        assert_eq!(claims.role, "engine");
    }

    #[test]
    fn test_backends_bit_identical() {
        let standard = SessionAuthenticator::new("secret", TokenBackend::Standard);
        let manual = SessionAuthenticator::new("secret", TokenBackend::Manual);

        let iat = 1_700_000_000;
        assert_eq!(
            standard.issue_at("engine_local_01", iat).unwrap(),
            manual.issue_at("engine_local_01", iat).unwrap()
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let auth = SessionAuthenticator::new("secret", TokenBackend::Standard);
        let token = auth.issue("engine_local_01").unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other"),
            &validation,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_three_part_structure() {
        let auth = SessionAuthenticator::new("secret", TokenBackend::Manual);
        let token = auth.issue("engine_local_01").unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='), "base64url parts must be unpadded");
    }
}
