//! Wallet identity and request signing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};

use crate::error::{ConfirmationsError, Result};

pub const SIGNATURE_ALGORITHM: &str = "ed25519";
pub const SIGNATURE_KEY_ID: &str = "primary";

/// The rewards wallet: a payment id plus the ed25519 secret key that
/// authenticates refill and payout requests.
#[derive(Clone, Debug)]
pub struct WalletInfo {
    pub payment_id: String,
    pub secret_key: String,
}

impl WalletInfo {
    pub fn new(payment_id: &str, secret_key: &str) -> Self {
        Self {
            payment_id: payment_id.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.payment_id.is_empty() && self.signing_key().is_ok()
    }

    /// Accepts either a 32-byte seed or a 64-byte libsodium-style secret
    /// (seed followed by public key), hex encoded.
    fn signing_key(&self) -> Result<SigningKey> {
        let bytes = hex::decode(&self.secret_key)
            .map_err(|e| ConfirmationsError::Wallet(format!("Invalid secret key hex: {}", e)))?;
        if bytes.len() != 32 && bytes.len() != 64 {
            return Err(ConfirmationsError::Wallet(format!(
                "Secret key must be 32 or 64 bytes, got {}",
                bytes.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        Ok(SigningKey::from_bytes(&seed))
    }

    /// Builds the `digest` and `signature` headers for a signed request.
    /// The digest covers the body; the signature covers the digest header
    /// line, so the server can verify both body integrity and origin.
    pub fn sign_request_headers(&self, body: &str) -> Result<Vec<(String, String)>> {
        let body_hash = Sha256::digest(body.as_bytes());
        let digest_value = format!("SHA-256={}", BASE64.encode(body_hash));

        let message = format!("digest: {}", digest_value);
        let signature = self.signing_key()?.sign(message.as_bytes());

        let signature_value = format!(
            "keyId=\"{}\",algorithm=\"{}\",headers=\"digest\",signature=\"{}\"",
            SIGNATURE_KEY_ID,
            SIGNATURE_ALGORITHM,
            BASE64.encode(signature.to_bytes())
        );

        Ok(vec![
            ("digest".to_string(), digest_value),
            ("signature".to_string(), signature_value),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    const PAYMENT_ID: &str = "d4ed0b92-0b28-4ec9-bc4b-2cf84d0b9b44";

    fn test_wallet() -> WalletInfo {
        let seed = [7u8; 32];
        WalletInfo::new(PAYMENT_ID, &hex::encode(seed))
    }

    #[test]
    fn wallet_with_bad_hex_is_invalid() {
        assert!(!WalletInfo::new(PAYMENT_ID, "not-hex").is_valid());
        assert!(!WalletInfo::new("", &hex::encode([7u8; 32])).is_valid());
        assert!(test_wallet().is_valid());
    }

    #[test]
    fn sixty_four_byte_secret_uses_the_seed_half() {
        let seed = [7u8; 32];
        let key = SigningKey::from_bytes(&seed);
        let mut full = seed.to_vec();
        full.extend_from_slice(key.verifying_key().as_bytes());

        let short = WalletInfo::new(PAYMENT_ID, &hex::encode(seed));
        let long = WalletInfo::new(PAYMENT_ID, &hex::encode(full));
        assert_eq!(
            short.sign_request_headers("body").unwrap(),
            long.sign_request_headers("body").unwrap()
        );
    }

    #[test]
    fn signed_headers_verify_against_the_public_key() {
        let wallet = test_wallet();
        let headers = wallet.sign_request_headers("{\"blindedTokens\":[]}").unwrap();

        let digest = &headers[0];
        assert_eq!(digest.0, "digest");
        assert!(digest.1.starts_with("SHA-256="));

        let signature = &headers[1];
        assert_eq!(signature.0, "signature");
        assert!(signature.1.contains("keyId=\"primary\""));
        assert!(signature.1.contains("algorithm=\"ed25519\""));
        assert!(signature.1.contains("headers=\"digest\""));

        let b64 = signature
            .1
            .split("signature=\"")
            .nth(1)
            .unwrap()
            .trim_end_matches('"');
        let sig_bytes: [u8; 64] = BASE64.decode(b64).unwrap().try_into().unwrap();
        let verifying = SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        let message = format!("digest: {}", digest.1);
        assert!(verifying
            .verify(
                message.as_bytes(),
                &ed25519_dalek::Signature::from_bytes(&sig_bytes)
            )
            .is_ok());
    }
}
