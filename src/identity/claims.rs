use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::{Map, Value};
use thiserror::Error;

// base64url, padding optional
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedTokenError {
    #[error("invalid token: missing payload segment")]
    MissingPayload,
    #[error("invalid token: payload is not base64 ({0})")]
    Base64(String),
    #[error("invalid token: payload is not JSON ({0})")]
    Json(String),
    #[error("invalid token: payload is not a JSON object")]
    NotAnObject,
}

/// Claims read from a token payload. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedClaims {
    claims: Map<String, Value>,
}

impl DecodedClaims {
    pub fn from_map(claims: Map<String, Value>) -> Self { Self { claims } }

    pub fn get(&self, name: &str) -> Option<&Value> { self.claims.get(name) }

    pub fn contains(&self, name: &str) -> bool { self.claims.contains_key(name) }

    /// Expiry in seconds since epoch. Numeric strings are accepted.
    pub fn exp(&self) -> Option<f64> {
        match self.claims.get("exp")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> { &self.claims }
}

/// Read the payload segment of a bearer token. Performs no signature check.
pub fn decode(token: &str) -> Result<DecodedClaims, MalformedTokenError> {
    let payload = token
        .trim()
        .split('.')
        .nth(1)
        .filter(|p| !p.is_empty())
        .ok_or(MalformedTokenError::MissingPayload)?;
    // accept the standard alphabet too
    let normalized: String = payload
        .chars()
        .map(|c| match c { '+' => '-', '/' => '_', other => other })
        .collect();
    let bytes = PAYLOAD_ENGINE
        .decode(normalized.as_bytes())
        .map_err(|e| MalformedTokenError::Base64(e.to_string()))?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|e| MalformedTokenError::Json(e.to_string()))?;
    match value {
        Value::Object(claims) => Ok(DecodedClaims { claims }),
        _ => Err(MalformedTokenError::NotAnObject),
    }
}

/// `exp * 1000 <= now_ms`. Claims without a usable `exp` count as expired.
pub fn is_expired(claims: &DecodedClaims, now_ms: i64) -> bool {
    match claims.exp() {
        Some(exp) if exp.is_finite() => exp * 1000.0 <= now_ms as f64,
        _ => true,
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use serde_json::json;

    fn token_for(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.sig")
    }

    #[test]
    fn decodes_payload_claims() {
        let t = token_for(&json!({"sub": "42", "role": "admin", "exp": 1_700_000_000}));
        let c = decode(&t).unwrap();
        assert_eq!(c.get("role"), Some(&json!("admin")));
        assert_eq!(c.exp(), Some(1_700_000_000.0));
        assert!(c.contains("sub"));
    }

    #[test]
    fn accepts_padded_standard_alphabet() {
        // "?>" encodes to "Pz4=" in the standard alphabet
        let payload = json!({"k": "?>?>", "exp": 10}).to_string();
        let t = format!("h.{}.s", STANDARD.encode(payload));
        let c = decode(&t).unwrap();
        assert_eq!(c.get("k"), Some(&json!("?>?>")));
    }

    #[test]
    fn signature_segment_is_optional() {
        let t = token_for(&json!({"exp": 5}));
        let two: Vec<&str> = t.split('.').take(2).collect();
        assert!(decode(&two.join(".")).is_ok());
    }

    #[test]
    fn malformed_inputs() {
        assert_eq!(decode("").unwrap_err(), MalformedTokenError::MissingPayload);
        assert_eq!(decode("onlyonesegment").unwrap_err(), MalformedTokenError::MissingPayload);
        assert_eq!(decode("a..c").unwrap_err(), MalformedTokenError::MissingPayload);
        assert!(matches!(decode("a.!!!.c").unwrap_err(), MalformedTokenError::Base64(_)));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("hello"));
        assert!(matches!(decode(&not_json).unwrap_err(), MalformedTokenError::Json(_)));
        let array = format!("a.{}.c", URL_SAFE_NO_PAD.encode("[1,2]"));
        assert_eq!(decode(&array).unwrap_err(), MalformedTokenError::NotAnObject);
    }

    #[test]
    fn expiry_compares_in_milliseconds() {
        let c = decode(&token_for(&json!({"exp": 1000}))).unwrap();
        assert!(!is_expired(&c, 999_999));
        assert!(is_expired(&c, 1_000_000));
        assert!(is_expired(&c, 1_000_001));
    }

    #[test]
    fn expiry_is_monotonic() {
        let c = decode(&token_for(&json!({"exp": 1_700_000_000}))).unwrap();
        let t0 = 1_700_000_000_000i64;
        assert!(is_expired(&c, t0));
        for dt in [1i64, 1_000, 86_400_000, 10 * 365 * 86_400_000] {
            assert!(is_expired(&c, t0 + dt));
        }
    }

    #[test]
    fn missing_or_bad_exp_counts_as_expired() {
        let none = decode(&token_for(&json!({"role": "admin"}))).unwrap();
        assert!(is_expired(&none, 0));
        let junk = decode(&token_for(&json!({"exp": "soon"}))).unwrap();
        assert!(is_expired(&junk, 0));
        let string_num = decode(&token_for(&json!({"exp": "2000"}))).unwrap();
        assert!(!is_expired(&string_num, 1_999_999));
    }
}
