//! Decode a client secret and report what Apple will see.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::clock::Clock;
use crate::error::{Result, SecretError};
use crate::secret::{Claims, AUDIENCE};

#[derive(Debug, Serialize)]
pub struct Inspection {
    pub header: Map<String, Value>,
    pub claims: Map<String, Value>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub lifetime_secs: Option<i64>,
    pub expired: bool,
    /// Set only when a public key was supplied; a bad signature is an error.
    pub signature_verified: bool,
}

fn decode_segment(name: &str, part: &str) -> Result<Map<String, Value>> {
    let raw = base64::decode_config(part, base64::URL_SAFE_NO_PAD)
        .map_err(|e| SecretError::Malformed(format!("{name} is not base64url: {e}")))?;
    match serde_json::from_slice(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(SecretError::Malformed(format!("{name} is not a JSON object"))),
        Err(e) => Err(SecretError::Malformed(format!("{name} is not JSON: {e}"))),
    }
}

/// Split and decode `token`. With `public_key_pem`, also check the ES256
/// signature and Apple audience; expiry is reported, not enforced.
pub fn inspect(token: &str, clock: &dyn Clock, public_key_pem: Option<&str>) -> Result<Inspection> {
    let token = token.trim();
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(SecretError::Malformed(format!(
            "expected 3 segments separated by '.', found {}",
            parts.len()
        )));
    }

    let header = decode_segment("header", parts[0])?;
    let claims = decode_segment("payload", parts[1])?;

    let ts = |key: &str| claims.get(key).and_then(Value::as_i64);
    let iat = ts("iat");
    let exp = ts("exp");
    let now = clock.now().timestamp();

    let signature_verified = match public_key_pem {
        None => false,
        Some(pem) => {
            let key = DecodingKey::from_ec_pem(pem.as_bytes()).map_err(SecretError::Verify)?;
            let mut validation = Validation::new(Algorithm::ES256);
            validation.set_audience(&[AUDIENCE]);
            validation.validate_exp = false;
            decode::<Claims>(token, &key, &validation).map_err(SecretError::Verify)?;
            true
        }
    };

    Ok(Inspection {
        header,
        issued_at: iat.and_then(|t| DateTime::from_timestamp(t, 0)),
        expires_at: exp.and_then(|t| DateTime::from_timestamp(t, 0)),
        lifetime_secs: iat.zip(exp).map(|(i, e)| e - i),
        expired: exp.is_some_and(|e| e <= now),
        signature_verified,
        claims,
    })
}
