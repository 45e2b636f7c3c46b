//! Redemption-time MAC keys derived from unblinded tokens.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encoding::{self, impl_base64_serde};
use crate::Result;

type HmacSha512 = Hmac<Sha512>;

const KEY_DERIVATION_DOMAIN: &[u8] = b"hash_derive_key";

/// A shared HMAC key. Client and server derive the same key from an
/// unblinded token, so a valid MAC proves the client holds a token the
/// server signed.
pub struct VerificationKey([u8; 64]);

impl VerificationKey {
    pub(crate) fn derive(preimage: &[u8], point: &[u8]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(KEY_DERIVATION_DOMAIN);
        hasher.update(preimage);
        hasher.update(point);
        let mut key = [0u8; 64];
        key.copy_from_slice(&hasher.finalize());
        Self(key)
    }

    fn mac(&self, message: &[u8]) -> HmacSha512 {
        // 64-byte key, HMAC accepts any key length.
        let mut mac = HmacSha512::new_from_slice(&self.0).expect("hmac accepts any key length");
        mac.update(message);
        mac
    }

    pub fn sign(&self, message: &[u8]) -> VerificationSignature {
        let mut tag = [0u8; 64];
        tag.copy_from_slice(&self.mac(message).finalize().into_bytes());
        VerificationSignature(tag)
    }

    /// Constant-time check that `signature` MACs `message` under this key.
    pub fn verify(&self, signature: &VerificationSignature, message: &[u8]) -> bool {
        self.mac(message).verify_slice(&signature.0).is_ok()
    }
}

impl Drop for VerificationKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// An HMAC-SHA512 tag over a redemption payload.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VerificationSignature([u8; 64]);

impl std::fmt::Debug for VerificationSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VerificationSignature(..)")
    }
}

impl VerificationSignature {
    pub fn encode_base64(&self) -> String {
        encoding::encode(&self.0)
    }

    pub fn decode_base64(encoded: &str) -> Result<Self> {
        let bytes = encoding::decode_exact(encoded, 64)?;
        let mut raw = [0u8; 64];
        raw.copy_from_slice(&bytes);
        Ok(Self(raw))
    }
}

impl_base64_serde!(VerificationSignature);

impl PartialEq for VerificationSignature {
    fn eq(&self, other: &Self) -> bool {
        // Not constant time; use VerificationKey::verify for untrusted input.
        self.0 == other.0
    }
}

impl Eq for VerificationSignature {}
