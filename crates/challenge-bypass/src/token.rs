//! Client-side token types and the blind/unblind transforms.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encoding::{self, impl_base64_serde};
use crate::error::TokenError;
use crate::verification::VerificationKey;
use crate::Result;

pub(crate) const PREIMAGE_LENGTH: usize = 64;
pub(crate) const POINT_LENGTH: usize = 32;
pub(crate) const SCALAR_LENGTH: usize = 32;

/// The random seed a token is minted from. Hashes to the group element that
/// actually gets blinded and signed; revealed to the server only at
/// redemption time.
#[derive(Clone, Debug, PartialEq, Eq, Zeroize)]
pub struct TokenPreimage(pub(crate) [u8; PREIMAGE_LENGTH]);

impl TokenPreimage {
    pub(crate) fn to_point(&self) -> RistrettoPoint {
        RistrettoPoint::hash_from_bytes::<Sha512>(&self.0)
    }

    pub fn encode_base64(&self) -> String {
        encoding::encode(&self.0)
    }

    pub fn decode_base64(encoded: &str) -> Result<Self> {
        let bytes = encoding::decode_exact(encoded, PREIMAGE_LENGTH)?;
        let mut preimage = [0u8; PREIMAGE_LENGTH];
        preimage.copy_from_slice(&bytes);
        Ok(Self(preimage))
    }
}

impl_base64_serde!(TokenPreimage);

/// A client secret: preimage plus blinding scalar. Never transmitted raw.
#[derive(Clone, Debug, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Token {
    preimage: TokenPreimage,
    blind: Scalar,
}

impl Token {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut seed = [0u8; PREIMAGE_LENGTH];
        rng.fill_bytes(&mut seed);
        Self {
            preimage: TokenPreimage(seed),
            blind: Scalar::random(rng),
        }
    }

    pub fn preimage(&self) -> &TokenPreimage {
        &self.preimage
    }

    /// Blinds the token for signing: `P = blind * HashToGroup(preimage)`.
    pub fn blinded(&self) -> BlindedToken {
        BlindedToken((self.blind * self.preimage.to_point()).compress())
    }

    /// Removes the blind from a signature over this token's blinded form:
    /// `W = blind^-1 * Q`.
    pub fn unblind(&self, signed: &SignedToken) -> Result<UnblindedToken> {
        let q = signed
            .0
            .decompress()
            .ok_or(TokenError::PointDecompression)?;
        Ok(UnblindedToken {
            preimage: self.preimage.clone(),
            w: (self.blind.invert() * q).compress(),
        })
    }

    pub fn encode_base64(&self) -> String {
        let mut bytes = Vec::with_capacity(PREIMAGE_LENGTH + SCALAR_LENGTH);
        bytes.extend_from_slice(&self.preimage.0);
        bytes.extend_from_slice(self.blind.as_bytes());
        encoding::encode(&bytes)
    }

    pub fn decode_base64(encoded: &str) -> Result<Self> {
        let bytes = encoding::decode_exact(encoded, PREIMAGE_LENGTH + SCALAR_LENGTH)?;
        let mut preimage = [0u8; PREIMAGE_LENGTH];
        preimage.copy_from_slice(&bytes[..PREIMAGE_LENGTH]);
        let mut scalar = [0u8; SCALAR_LENGTH];
        scalar.copy_from_slice(&bytes[PREIMAGE_LENGTH..]);
        let blind: Option<Scalar> = Scalar::from_canonical_bytes(scalar).into();
        Ok(Self {
            preimage: TokenPreimage(preimage),
            blind: blind.ok_or(TokenError::ScalarFormat)?,
        })
    }
}

impl_base64_serde!(Token);

/// A one-way-blinded token, safe to send to the server for signing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlindedToken(pub(crate) CompressedRistretto);

impl BlindedToken {
    pub fn encode_base64(&self) -> String {
        encoding::encode(self.0.as_bytes())
    }

    pub fn decode_base64(encoded: &str) -> Result<Self> {
        Ok(Self(decode_point(encoded)?))
    }
}

impl_base64_serde!(BlindedToken);

/// The server's blind signature over a [`BlindedToken`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedToken(pub(crate) CompressedRistretto);

impl SignedToken {
    pub fn encode_base64(&self) -> String {
        encoding::encode(self.0.as_bytes())
    }

    pub fn decode_base64(encoded: &str) -> Result<Self> {
        Ok(Self(decode_point(encoded)?))
    }
}

impl_base64_serde!(SignedToken);

/// The redeemable artifact: the preimage together with the unblinded
/// signature point `W = k * HashToGroup(preimage)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnblindedToken {
    pub(crate) preimage: TokenPreimage,
    pub(crate) w: CompressedRistretto,
}

impl UnblindedToken {
    pub fn preimage(&self) -> &TokenPreimage {
        &self.preimage
    }

    /// Derives the shared MAC key both sides can compute for this token.
    pub fn derive_verification_key(&self) -> VerificationKey {
        VerificationKey::derive(&self.preimage.0, self.w.as_bytes())
    }

    pub fn encode_base64(&self) -> String {
        let mut bytes = Vec::with_capacity(PREIMAGE_LENGTH + POINT_LENGTH);
        bytes.extend_from_slice(&self.preimage.0);
        bytes.extend_from_slice(self.w.as_bytes());
        encoding::encode(&bytes)
    }

    pub fn decode_base64(encoded: &str) -> Result<Self> {
        let bytes = encoding::decode_exact(encoded, PREIMAGE_LENGTH + POINT_LENGTH)?;
        let mut preimage = [0u8; PREIMAGE_LENGTH];
        preimage.copy_from_slice(&bytes[..PREIMAGE_LENGTH]);
        let mut point = [0u8; POINT_LENGTH];
        point.copy_from_slice(&bytes[PREIMAGE_LENGTH..]);
        Ok(Self {
            preimage: TokenPreimage(preimage),
            w: CompressedRistretto(point),
        })
    }
}

impl_base64_serde!(UnblindedToken);

pub(crate) fn decode_point(encoded: &str) -> Result<CompressedRistretto> {
    let bytes = encoding::decode_exact(encoded, POINT_LENGTH)?;
    let mut point = [0u8; POINT_LENGTH];
    point.copy_from_slice(&bytes);
    Ok(CompressedRistretto(point))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn token_base64_roundtrip() {
        let mut rng = StdRng::seed_from_u64(7);
        let token = Token::random(&mut rng);
        let decoded = Token::decode_base64(&token.encode_base64()).unwrap();
        assert_eq!(token, decoded);
    }

    #[test]
    fn blinded_token_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        let token = Token::random(&mut rng);
        assert_eq!(token.blinded(), token.blinded());
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(
            BlindedToken::decode_base64("AAAA"),
            Err(TokenError::Length {
                expected: 32,
                actual: 3
            })
        );
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert_eq!(Token::decode_base64("!!!"), Err(TokenError::Base64));
    }

    #[test]
    fn serde_uses_base64_strings() {
        let mut rng = StdRng::seed_from_u64(7);
        let token = Token::random(&mut rng);
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{}\"", token.encode_base64()));
        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(token, back);
    }
}
