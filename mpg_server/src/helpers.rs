use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// The base64-encoded HMAC-SHA256 of `data`, keyed with `secret`.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(e) => {
            error!("🔐️ Could not initialise HMAC. {e}");
            return String::default();
        },
    };
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}

/// Whether `signature` is the HMAC-SHA256 of `data` keyed with `secret`. The comparison is constant-time.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &[u8]) -> bool {
    match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(data);
            mac.verify_slice(signature).is_ok()
        },
        Err(e) => {
            error!("🔐️ Could not initialise HMAC. {e}");
            false
        },
    }
}

/// The value of the `Idempotency-Key` header, if it is present, valid UTF-8 and not blank.
pub fn idempotency_key_from_headers(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(IDEMPOTENCY_KEY_HEADER)?;
    match value.to_str() {
        Ok(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            debug!("💻️ Ignoring an unreadable {IDEMPOTENCY_KEY_HEADER} header. {e}");
            None
        },
    }
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn hmac_is_base64_sha256() {
        // RFC 4231, test case 2
        let hmac = calculate_hmac("Jefe", b"what do ya want for nothing?");
        assert_eq!(hmac, "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=");
        assert_ne!(calculate_hmac("Jefe", b"what do ya want for nothing!"), hmac);
    }

    #[test]
    fn hmac_verification() {
        let signature = base64::decode("W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=").unwrap();
        assert!(verify_hmac("Jefe", b"what do ya want for nothing?", &signature));
        assert!(!verify_hmac("Jefe", b"what do ya want for nothing!", &signature));
        assert!(!verify_hmac("Jeff", b"what do ya want for nothing?", &signature));
        assert!(!verify_hmac("Jefe", b"what do ya want for nothing?", &signature[..16]));
    }

    #[test]
    fn idempotency_header() {
        let req = TestRequest::default().insert_header((IDEMPOTENCY_KEY_HEADER, " abc-123 ")).to_http_request();
        assert_eq!(idempotency_key_from_headers(&req).as_deref(), Some("abc-123"));
        let req = TestRequest::default().insert_header((IDEMPOTENCY_KEY_HEADER, "  ")).to_http_request();
        assert_eq!(idempotency_key_from_headers(&req), None);
        assert_eq!(idempotency_key_from_headers(&TestRequest::default().to_http_request()), None);
    }
}
