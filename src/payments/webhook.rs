use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signature header sent with every gateway callback.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// How far a callback's signed timestamp may drift from server time.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,

    #[error("malformed signature header")]
    MalformedHeader,

    #[error("signed timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("signature mismatch")]
    Mismatch,
}

/// Verify a gateway callback: HMAC-SHA256 over `"{t}.{body}"` with the
/// shared webhook secret, matched against any `v1` candidate in the header.
/// This is the sole authentication boundary in front of booking creation.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let (timestamp, candidates) = parse_header(header)?;

    let age = now.signed_duration_since(timestamp_to_datetime(timestamp)?);
    if age.abs() > Duration::seconds(SIGNATURE_TOLERANCE_SECS) {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    for candidate in candidates {
        let Ok(digest) = hex::decode(candidate) else {
            continue;
        };
        // verify_slice is constant-time
        if mac.clone().verify_slice(&digest).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

/// Compute the header value the gateway would send for `payload` at `t`.
/// Counterpart of [`verify_signature`]; used by tests to forge valid
/// callbacks against a known secret.
pub fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let digest = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={digest}")
}

fn parse_header(header: &str) -> Result<(i64, Vec<&str>), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    Ok((timestamp, candidates))
}

fn timestamp_to_datetime(timestamp: i64) -> Result<DateTime<Utc>, SignatureError> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or(SignatureError::MalformedHeader)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const PAYLOAD: &[u8] = br#"{"type":"checkout.session.completed"}"#;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap()
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let header = sign_payload(SECRET, PAYLOAD, now().timestamp());
        assert_eq!(verify_signature(SECRET, PAYLOAD, &header, now()), Ok(()));
    }

    #[test]
    fn accepts_extra_unknown_scheme_entries() {
        let header = sign_payload(SECRET, PAYLOAD, now().timestamp());
        let header = format!("{header},v0=deadbeef");
        assert_eq!(verify_signature(SECRET, PAYLOAD, &header, now()), Ok(()));
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let header = sign_payload(SECRET, PAYLOAD, now().timestamp());
        let result = verify_signature(SECRET, b"{\"type\":\"evil\"}", &header, now());
        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn rejects_the_wrong_secret() {
        let header = sign_payload("whsec_other", PAYLOAD, now().timestamp());
        let result = verify_signature(SECRET, PAYLOAD, &header, now());
        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let stale = now().timestamp() - SIGNATURE_TOLERANCE_SECS - 1;
        let header = sign_payload(SECRET, PAYLOAD, stale);
        let result = verify_signature(SECRET, PAYLOAD, &header, now());
        assert_eq!(result, Err(SignatureError::TimestampOutOfTolerance));
    }

    #[test]
    fn rejects_headers_without_signatures() {
        assert_eq!(
            verify_signature(SECRET, PAYLOAD, "t=1750000000", now()),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify_signature(SECRET, PAYLOAD, "v1=abcd", now()),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify_signature(SECRET, PAYLOAD, "", now()),
            Err(SignatureError::MalformedHeader)
        );
    }
}
