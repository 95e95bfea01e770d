use crate::errors::ValidationError;
use rand::Rng;
use sha2::Sha256;

/// Generate a secret key for callback signature validation.
///
/// Assigned to each workflow registration; the engine signs every callback
/// it sends us with this secret.
pub fn generate_callback_secret() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 32] = rng.gen();
    hex::encode(random_bytes)
}

/// Compute the hex-encoded HMAC-SHA256 signature of a payload
pub fn compute_signature(payload: &[u8], secret: &str) -> Result<String, ValidationError> {
    use hmac::{Hmac, Mac};

    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        ValidationError::InvalidFieldValue {
            field: "callback_secret".to_string(),
            reason: format!("Invalid secret key: {}", e),
        }
    })?;
    mac.update(payload);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Validate the HMAC-SHA256 signature on an inbound callback.
///
/// # Arguments
/// * `payload` - The raw request body bytes
/// * `signature` - The signature from the request header (hex-encoded)
/// * `secret` - The workflow's callback secret
pub fn validate_callback_signature(
    payload: &[u8],
    signature: &str,
    secret: &str,
) -> Result<bool, ValidationError> {
    let expected = compute_signature(payload, secret)?;
    Ok(expected == signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_callback_secret() {
        let secret1 = generate_callback_secret();
        let secret2 = generate_callback_secret();

        // Should be different each time
        assert_ne!(secret1, secret2);

        // Should be 64 hex characters (32 bytes)
        assert_eq!(secret1.len(), 64);
        assert!(hex::decode(&secret1).is_ok());
    }

    #[test]
    fn test_validate_callback_signature_valid() {
        let payload = br#"{"execution_id":"exec_1","results":{}}"#;
        let secret = "test_secret_key";

        let signature = compute_signature(payload, secret).unwrap();
        let result = validate_callback_signature(payload, &signature, secret).unwrap();
        assert!(result);
    }

    #[test]
    fn test_validate_callback_signature_invalid() {
        let payload = b"test payload";
        let secret = "test_secret_key";
        let wrong_signature = "0000000000000000000000000000000000000000000000000000000000000000";

        let result = validate_callback_signature(payload, wrong_signature, secret).unwrap();
        assert!(!result);
    }

    #[test]
    fn test_validate_callback_signature_different_payload() {
        let secret = "test_secret_key";
        let signature = compute_signature(b"payload one", secret).unwrap();

        let result = validate_callback_signature(b"payload two", &signature, secret).unwrap();
        assert!(!result);
    }

    #[test]
    fn test_validate_callback_signature_different_secret() {
        let payload = b"test payload";
        let signature = compute_signature(payload, "secret-a").unwrap();

        let result = validate_callback_signature(payload, &signature, "secret-b").unwrap();
        assert!(!result);
    }
}
