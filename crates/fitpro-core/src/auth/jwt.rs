//! Local inspection of JWT bearer tokens.
//!
//! The signature is never checked here; the server does that. The client
//! only decodes the payload to reject tokens that are structurally broken or
//! already past their `exp` claim, which saves a round-trip that would end
//! in a 401 anyway.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// base64url that tolerates both padded and unpadded segments
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(&'static str),

    #[error("Token expired")]
    Expired,
}

/// Decoded token payload
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// Expiry in seconds since the Unix epoch, if the token carries one
    pub exp: Option<f64>,
    pub raw: Map<String, Value>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let exp = self.exp?;
        DateTime::from_timestamp_millis((exp * 1000.0) as i64)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => now.timestamp_millis() as f64 >= exp * 1000.0,
            None => false,
        }
    }
}

/// Split a token into its three segments and decode the payload
pub fn decode(token: &str) -> Result<Claims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Malformed("expected three segments"));
    }

    let payload = URL_SAFE_LENIENT
        .decode(segments[1])
        .map_err(|_| TokenError::Malformed("payload is not base64url"))?;

    let value: Value = serde_json::from_slice(&payload)
        .map_err(|_| TokenError::Malformed("payload is not JSON"))?;

    let Value::Object(raw) = value else {
        return Err(TokenError::Malformed("payload is not a JSON object"));
    };

    let exp = match raw.get("exp") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(_) => return Err(TokenError::Malformed("exp is not a number")),
    };

    Ok(Claims { exp, raw })
}

/// Decode the token and reject it if it has expired as of `now`
pub fn validate(token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
    let claims = decode(token)?;
    if claims.is_expired_at(now) {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::make_token;
    use chrono::Duration;

    #[test]
    fn test_valid_token_with_future_exp() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let token = make_token(Some(exp));

        let claims = validate(&token, Utc::now()).expect("token should be valid");
        assert_eq!(claims.exp, Some(exp as f64));
        assert_eq!(claims.raw.get("email").and_then(Value::as_str), Some("a@b.com"));
        assert!(claims.expires_at().is_some());
    }

    #[test]
    fn test_token_without_exp_never_expires() {
        let token = make_token(None);
        assert!(validate(&token, Utc::now() + Duration::days(3650)).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let exp = (Utc::now() - Duration::minutes(1)).timestamp();
        assert_eq!(validate(&make_token(Some(exp)), Utc::now()), Err(TokenError::Expired));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let exp_ms = now.timestamp_millis() - now.timestamp_millis() % 1000;
        let token = make_token(Some(exp_ms / 1000));
        let at_exp = DateTime::from_timestamp_millis(exp_ms).expect("timestamp");
        assert_eq!(validate(&token, at_exp), Err(TokenError::Expired));
    }

    #[test]
    fn test_malformed_tokens() {
        let now = Utc::now();
        assert!(matches!(validate("", now), Err(TokenError::Malformed(_))));
        assert!(matches!(validate("abc", now), Err(TokenError::Malformed(_))));
        assert!(matches!(validate("a.b", now), Err(TokenError::Malformed(_))));
        assert!(matches!(validate("a.b.c.d", now), Err(TokenError::Malformed(_))));
        // Payload is not base64
        assert!(matches!(validate("a.!!!.c", now), Err(TokenError::Malformed(_))));
        // Payload decodes but is not JSON
        let not_json = URL_SAFE_LENIENT.encode("hello");
        assert!(matches!(
            validate(&format!("h.{}.s", not_json), now),
            Err(TokenError::Malformed(_))
        ));
        // JSON but not an object
        let array = URL_SAFE_LENIENT.encode("[1,2]");
        assert!(matches!(
            validate(&format!("h.{}.s", array), now),
            Err(TokenError::Malformed(_))
        ));
        // exp of the wrong type
        let bad_exp = URL_SAFE_LENIENT.encode(r#"{"exp":"soon"}"#);
        assert!(matches!(
            validate(&format!("h.{}.s", bad_exp), now),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode(r#"{"sub":"1"}"#);
        assert!(padded.ends_with('='));
        assert!(decode(&format!("h.{}.s", padded)).is_ok());
    }
}
