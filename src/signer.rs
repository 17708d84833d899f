//! Message Signing
//!
//! Tamper-evident HMAC-SHA256 envelopes for outbound job lifecycle events.
//! Every envelope carries a fresh 128-bit nonce and a millisecond timestamp,
//! so two signatures over the same payload never match and a verifier can
//! reject replays by consuming nonces.
//!
//! The signature covers `canonical_json(payload) + nonce + ts`. Canonical
//! JSON is compact (no whitespace) with object keys sorted lexicographically
//! by Unicode code point at every nesting level; an independent verifier
//! must apply the same rule.

use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Nonce length in bytes (hex-encoded to 32 chars on the wire).
const NONCE_LEN: usize = 16;

/// Signed wrapper around one outbound payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub payload: Value,
    /// Hex-encoded random nonce, unique per envelope.
    pub nonce: String,
    /// Unix milliseconds at signing time.
    pub ts: i64,
    /// Hex-encoded HMAC-SHA256 signature.
    pub sig: String,
}

/// Signs outbound payloads with the secret shared with the verifying party.
#[derive(Clone)]
pub struct MessageSigner {
    secret: Vec<u8>,
}

impl MessageSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Wrap a payload in a signed envelope.
    ///
    /// A fresh nonce and timestamp are generated on every call, including
    /// for identical payloads.
    pub fn sign(&self, payload: &Value) -> SignedEnvelope {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let nonce = hex::encode(bytes);
        let ts = chrono::Utc::now().timestamp_millis();
        let sig = self.compute_sig(payload, &nonce, ts);

        SignedEnvelope {
            payload: payload.clone(),
            nonce,
            ts,
            sig,
        }
    }

    /// Check an envelope's signature against its own payload, nonce, and
    /// timestamp. Comparison is constant-time. Replay rejection (consuming
    /// nonces) is the verifier's policy, not handled here.
    pub fn verify(&self, envelope: &SignedEnvelope) -> bool {
        let expected = match hex::decode(&envelope.sig) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let mut mac = self.mac();
        mac.update(canonical_json(&envelope.payload).as_bytes());
        mac.update(envelope.nonce.as_bytes());
        mac.update(envelope.ts.to_string().as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    fn compute_sig(&self, payload: &Value, nonce: &str, ts: i64) -> String {
        let mut mac = self.mac();
        mac.update(canonical_json(payload).as_bytes());
        mac.update(nonce.as_bytes());
        mac.update(ts.to_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        HmacSha256::new_from_slice(&self.secret).expect("HMAC key length")
    }
}

/// Serialize a value as canonical JSON: compact, object keys sorted
/// lexicographically at every nesting level.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let inner: Vec<String> = entries
                .iter()
                .map(|(key, val)| {
                    format!("{}:{}", Value::String((*key).clone()), canonical_json(val))
                })
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", inner.join(","))
        }
        scalar => scalar.to_string(),
    }
}
