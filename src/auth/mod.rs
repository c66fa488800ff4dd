//! Per-venue request authentication (spec.md §4.5).
//!
//! Each venue signs REST calls a different way; this module has one
//! function per scheme rather than a shared trait, since the inputs
//! (query string vs. endpoint+params+nonce) don't share a useful shape.
//! Grounded on the teacher's `auth/jwt.rs` for the Upbit JWT path and its
//! general pattern of a small stateless signer per auth scheme.

use base64::Engine;
use hmac::{Hmac, Mac};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UpbitClaims {
    access_key: String,
    nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash_alg: Option<String>,
    /// Milliseconds since epoch; not a registered JWT claim but required by
    /// Upbit's verifier.
    timestamp: i64,
}

/// Builds the `Authorization: Bearer <jwt>` value for an Upbit call.
/// `query_string` is the URL-encoded query for calls that carry one (e.g.
/// `market=KRW-XRP&side=bid`); pass `""` for bodyless calls.
pub fn upbit_jwt(access_key: &str, secret_key: &str, query_string: &str) -> CoreResult<String> {
    let (query_hash, query_hash_alg) = if query_string.is_empty() {
        (None, None)
    } else {
        let mut hasher = Sha512::new();
        hasher.update(query_string.as_bytes());
        let digest = hasher.finalize();
        (Some(hex::encode(digest)), Some("SHA512".to_string()))
    };

    let claims = UpbitClaims {
        access_key: access_key.to_string(),
        nonce: Uuid::new_v4().to_string(),
        query_hash,
        query_hash_alg,
        timestamp: now_ms(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret_key.as_bytes()),
    )
    .map_err(|e| CoreError::new(crate::error::ErrorKind::AuthenticationFailed, e.to_string()))?;

    Ok(format!("Bearer {token}"))
}

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Binance: HMAC-SHA256 over the canonical query string with `timestamp=`
/// already appended by the caller; returns the hex signature to append as
/// `&signature=`.
pub fn binance_signature(secret_key: &str, query_string: &str) -> CoreResult<String> {
    hmac_sha256_hex(secret_key, query_string)
}

/// MEXC: same construction as Binance (spec.md §4.5: "analogous to
/// Binance").
pub fn mexc_signature(secret_key: &str, query_string: &str) -> CoreResult<String> {
    hmac_sha256_hex(secret_key, query_string)
}

fn hmac_sha256_hex(secret_key: &str, message: &str) -> CoreResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|e| CoreError::new(crate::error::ErrorKind::AuthenticationFailed, e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Bithumb: HMAC-SHA512 of `endpoint + ";" + params + ";" + nonce`,
/// Base64-encoded. Returns `(signature, nonce)`; the nonce must be sent
/// alongside it in the matching request header.
pub fn bithumb_signature(secret_key: &str, endpoint: &str, params: &str) -> CoreResult<(String, String)> {
    let nonce = now_ms().to_string();
    let message = format!("{endpoint};{params};{nonce}");
    let mut mac = HmacSha512::new_from_slice(secret_key.as_bytes())
        .map_err(|e| CoreError::new(crate::error::ErrorKind::AuthenticationFailed, e.to_string()))?;
    mac.update(message.as_bytes());
    let signature = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());
    Ok((signature, nonce))
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upbit_jwt_without_query_omits_hash_claims() {
        let token = upbit_jwt("access", "secret", "").unwrap();
        assert!(token.starts_with("Bearer "));
        let jwt = token.trim_start_matches("Bearer ");
        let payload_b64 = jwt.split('.').nth(1).unwrap();
        let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload_b64)
            .unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&payload_bytes).unwrap();
        assert!(payload.get("query_hash").is_none());
        assert_eq!(payload["access_key"], "access");
    }

    #[test]
    fn upbit_jwt_with_query_includes_sha512_hash() {
        let token = upbit_jwt("access", "secret", "market=KRW-XRP&side=bid").unwrap();
        let jwt = token.trim_start_matches("Bearer ");
        let payload_b64 = jwt.split('.').nth(1).unwrap();
        let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload_b64)
            .unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&payload_bytes).unwrap();
        assert_eq!(payload["query_hash_alg"], "SHA512");
        assert!(payload["query_hash"].as_str().unwrap().len() == 128);
    }

    #[test]
    fn binance_signature_is_deterministic_for_same_input() {
        let a = binance_signature("secret", "symbol=XRPUSDT&timestamp=1").unwrap();
        let b = binance_signature("secret", "symbol=XRPUSDT&timestamp=1").unwrap();
        assert_eq!(a, b);
        let c = binance_signature("secret", "symbol=XRPUSDT&timestamp=2").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn bithumb_signature_changes_with_nonce() {
        let (sig1, nonce1) = bithumb_signature("secret", "/info/balance", "currency=XRP").unwrap();
        let (sig2, nonce2) = bithumb_signature("secret", "/info/balance", "currency=XRP").unwrap();
        assert_ne!(nonce1, nonce2);
        assert_ne!(sig1, sig2);
    }
}
