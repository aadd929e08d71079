//! HMAC-SHA256 signatures for provisioner traffic, formatted `t=<unix>,v1=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Callbacks older than this are rejected to limit replay.
pub const MAX_SIGNATURE_AGE_SECS: i64 = 300;

fn mac_for(secret: &str, timestamp: i64, body: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}.{body}").as_bytes());
    mac
}

pub fn sign_payload(secret: &str, timestamp: i64, body: &str) -> String {
    let signature = hex::encode(mac_for(secret, timestamp, body).finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}

/// Check a `t=..,v1=..` header against the body. `now` is unix seconds.
pub fn verify_signature(secret: &str, header: &str, body: &str, now: i64) -> bool {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => signature = hex::decode(v).ok(),
            _ => {}
        }
    }
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return false;
    };
    if (now - timestamp).abs() > MAX_SIGNATURE_AGE_SECS {
        return false;
    }
    mac_for(secret, timestamp, body)
        .verify_slice(&signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"hostname":"booking.example.com","ssl_status":"active"}"#;

    #[test]
    fn signature_is_deterministic() {
        assert_eq!(
            sign_payload("secret", 1706500000, BODY),
            sign_payload("secret", 1706500000, BODY)
        );
    }

    #[test]
    fn signature_changes_with_different_secret() {
        assert_ne!(
            sign_payload("secret_a", 1706500000, BODY),
            sign_payload("secret_b", 1706500000, BODY)
        );
    }

    #[test]
    fn signature_has_correct_format() {
        let sig = sign_payload("secret", 1706500000, BODY);
        let hex_part = sig.strip_prefix("t=1706500000,v1=").unwrap();
        assert_eq!(hex_part.len(), 64);
    }

    #[test]
    fn verify_accepts_own_signature() {
        let sig = sign_payload("secret", 1706500000, BODY);
        assert!(verify_signature("secret", &sig, BODY, 1706500010));
    }

    #[test]
    fn verify_rejects_tampered_body_and_wrong_secret() {
        let sig = sign_payload("secret", 1706500000, BODY);
        assert!(!verify_signature("secret", &sig, "{}", 1706500000));
        assert!(!verify_signature("other", &sig, BODY, 1706500000));
    }

    #[test]
    fn verify_rejects_stale_and_malformed_headers() {
        let sig = sign_payload("secret", 1706500000, BODY);
        assert!(!verify_signature("secret", &sig, BODY, 1706500000 + 301));
        assert!(!verify_signature("secret", "v1=abcd", BODY, 1706500000));
        assert!(!verify_signature("secret", "garbage", BODY, 1706500000));
    }
}
