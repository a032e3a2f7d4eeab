//! Unverified JWT claim decoding.
//!
//! The client never holds the signing key, so nothing here proves a token is
//! genuine. Decoded claims are only used to guess whether a token is worth
//! presenting; the backend checks the signature and expiry on every request
//! and is the sole authority on whether a session is valid.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Tokens expiring within this many seconds are already treated as expired.
pub const EXPIRY_SKEW_SECONDS: i64 = 30;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims read from the payload segment of a token, without verification.
///
/// Only `exp` is interpreted. Every other claim is kept as raw JSON so an
/// unexpected type in, say, `sub` never makes a well-formed token unreadable.
#[derive(Debug, Clone, PartialEq)]
pub struct UnverifiedClaims {
    /// Expiry as whole seconds since the epoch, rounded up from fractional
    /// NumericDate values
    pub exp: Option<i64>,
    pub payload: Map<String, Value>,
}

impl UnverifiedClaims {
    /// Reads `exp` from a decoded payload. `None` when `exp` is present but
    /// not a number.
    pub fn from_payload(payload: Map<String, Value>) -> Option<Self> {
        let exp = match payload.get("exp") {
            None | Some(Value::Null) => None,
            Some(value) => Some(numeric_date(value)?),
        };
        Some(Self { exp, payload })
    }

    /// The subject claim rendered as text, whether it was sent as a string or
    /// a number.
    pub fn subject(&self) -> Option<String> {
        match self.payload.get("sub")? {
            Value::String(sub) => Some(sub.clone()),
            Value::Number(sub) => Some(sub.to_string()),
            _ => None,
        }
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// True while `now` is more than the skew buffer before expiry. Tokens
    /// without an expiry claim never expire from the client's point of view.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => now.timestamp() + EXPIRY_SKEW_SECONDS < exp,
            None => true,
        }
    }
}

// Rounding up keeps `whole_now < exp` exact for fractional expiries.
fn numeric_date(value: &Value) -> Option<i64> {
    if let Some(seconds) = value.as_i64() {
        return Some(seconds);
    }
    let seconds = value.as_f64()?;
    seconds.is_finite().then(|| seconds.ceil() as i64)
}

/// Decodes the payload of a three-segment token. Returns `None` for anything
/// that is not structurally a JWT with a JSON-object payload, or whose `exp`
/// is not a number.
pub fn decode_unverified(token: &str) -> Option<UnverifiedClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    let payload = URL_SAFE_LENIENT.decode(segments[1]).ok()?;
    match serde_json::from_slice::<Value>(&payload).ok()? {
        Value::Object(claims) => UnverifiedClaims::from_payload(claims),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::Duration;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_claims() {
        let token = token_with_payload(r#"{"sub":"ada@example.com","exp":2000000000,"role":"STUDENT"}"#);
        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.subject().as_deref(), Some("ada@example.com"));
        assert_eq!(claims.exp, Some(2_000_000_000));
        assert_eq!(claims.claim("role"), Some(&Value::from("STUDENT")));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(decode_unverified("abc.def").is_none());
        assert!(decode_unverified("").is_none());
        assert!(decode_unverified("a.!!!.c").is_none());
        assert!(decode_unverified(&token_with_payload("[1,2,3]")).is_none());
        assert!(decode_unverified(&token_with_payload(r#"{"exp":"soon"}"#)).is_none());
    }

    #[test]
    fn test_skew_buffer() {
        let now = Utc::now();
        let claims = |offset: i64| UnverifiedClaims {
            exp: Some((now + Duration::seconds(offset)).timestamp()),
            payload: Map::new(),
        };
        assert!(!claims(30).is_fresh_at(now));
        assert!(!claims(10).is_fresh_at(now));
        assert!(claims(31).is_fresh_at(now));
    }

    #[test]
    fn test_unrelated_claim_types_are_ignored() {
        let numeric_sub = decode_unverified(&token_with_payload(r#"{"sub":42,"exp":4000000000}"#)).unwrap();
        assert_eq!(numeric_sub.subject().as_deref(), Some("42"));
        assert_eq!(numeric_sub.exp, Some(4_000_000_000));

        let odd_iat = decode_unverified(&token_with_payload(r#"{"iat":"yesterday"}"#)).unwrap();
        assert_eq!(odd_iat.exp, None);
        assert!(odd_iat.is_fresh_at(Utc::now()));
    }

    #[test]
    fn test_fractional_expiry() {
        let claims = decode_unverified(&token_with_payload(r#"{"exp":4000000000.5}"#)).unwrap();
        assert_eq!(claims.exp, Some(4_000_000_001));
        assert!(claims.is_fresh_at(Utc::now()));

        let now = DateTime::from_timestamp(1_000_000_000, 0).unwrap();
        let edge = UnverifiedClaims::from_payload(
            serde_json::from_str(r#"{"exp":1000000030.5}"#).unwrap(),
        )
        .unwrap();
        assert!(edge.is_fresh_at(now));
        let expired = UnverifiedClaims::from_payload(
            serde_json::from_str(r#"{"exp":1000000029.5}"#).unwrap(),
        )
        .unwrap();
        assert!(!expired.is_fresh_at(now));
    }
}
