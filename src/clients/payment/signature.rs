use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `t=<unix ts>,v1=<hex hmac>` over `{t}.{payload}`.
pub const SIGNATURE_HEADER: &str = "payment-signature";

/// Replay tolerance on the signature timestamp.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Clone, Copy, Debug, Eq, Fail, PartialEq)]
pub enum SignatureError {
    #[fail(display = "Malformed signature header")]
    Malformed,
    #[fail(display = "Signature timestamp outside tolerance")]
    StaleTimestamp,
    #[fail(display = "Signature mismatch")]
    Mismatch,
}

/// Verifies a webhook payload against its signature header.
pub fn verify(payload: &[u8], header: &str, secret: &str) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value.to_string()),
            Some(("v1", value)) => signature = Some(value.to_string()),
            _ => {}
        }
    }

    let timestamp: i64 = timestamp
        .ok_or(SignatureError::Malformed)?
        .parse()
        .map_err(|_| SignatureError::Malformed)?;
    let signature = signature.ok_or(SignatureError::Malformed)?;

    if (Utc::now().timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::StaleTimestamp);
    }

    let expected = hex::decode(&signature).map_err(|_| SignatureError::Malformed)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Builds the signature header for a payload, as the provider would.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const PAYLOAD: &[u8] = b"{\"type\":\"checkout.session.completed\"}";

    #[test]
    fn valid_signature_is_accepted() {
        let header = sign(PAYLOAD, SECRET, Utc::now().timestamp());
        assert_eq!(verify(PAYLOAD, &header, SECRET), Ok(()));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let header = sign(PAYLOAD, "wrong_secret", Utc::now().timestamp());
        assert_eq!(verify(PAYLOAD, &header, SECRET), Err(SignatureError::Mismatch));
    }

    #[test]
    fn modified_payload_is_rejected() {
        let header = sign(PAYLOAD, SECRET, Utc::now().timestamp());
        let tampered = b"{\"type\":\"checkout.session.completed\",\"hacked\":true}";
        assert_eq!(verify(tampered, &header, SECRET), Err(SignatureError::Mismatch));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        // 10 minutes ago, beyond the 5-minute tolerance
        let header = sign(PAYLOAD, SECRET, Utc::now().timestamp() - 600);
        assert_eq!(
            verify(PAYLOAD, &header, SECRET),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn missing_parts_are_malformed() {
        assert_eq!(
            verify(PAYLOAD, "v1=abcdef", SECRET),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify(PAYLOAD, "t=1234567890", SECRET),
            Err(SignatureError::Malformed)
        );
        assert_eq!(verify(PAYLOAD, "", SECRET), Err(SignatureError::Malformed));
    }
}
