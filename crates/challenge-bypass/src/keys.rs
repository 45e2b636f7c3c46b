//! Server-side signing key and its public commitment.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encoding::{self, impl_base64_serde};
use crate::error::TokenError;
use crate::token::{self, BlindedToken, SignedToken, TokenPreimage, UnblindedToken};
use crate::Result;

/// The public commitment `Y = k * B` to a [`SigningKey`]. Clients verify
/// batch DLEQ proofs against it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(pub(crate) CompressedRistretto);

impl PublicKey {
    pub fn encode_base64(&self) -> String {
        encoding::encode(self.0.as_bytes())
    }

    pub fn decode_base64(encoded: &str) -> Result<Self> {
        Ok(Self(token::decode_point(encoded)?))
    }
}

impl_base64_serde!(PublicKey);

/// The server's secret scalar `k`. Signs blinded tokens as `Q = k * P`.
#[derive(Clone, Debug, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    secret: Scalar,
    #[zeroize(skip)]
    public: CompressedRistretto,
}

impl SigningKey {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = Scalar::random(rng);
        Self {
            public: RistrettoPoint::mul_base(&secret).compress(),
            secret,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.public)
    }

    pub(crate) fn secret(&self) -> &Scalar {
        &self.secret
    }

    pub fn sign(&self, blinded: &BlindedToken) -> Result<SignedToken> {
        let p = blinded
            .0
            .decompress()
            .ok_or(TokenError::PointDecompression)?;
        Ok(SignedToken((self.secret * p).compress()))
    }

    /// Recomputes the unblinded token for a revealed preimage. This is the
    /// server half of redemption: `W = k * HashToGroup(preimage)`.
    pub fn rederive_unblinded_token(&self, preimage: &TokenPreimage) -> UnblindedToken {
        UnblindedToken {
            preimage: preimage.clone(),
            w: (self.secret * preimage.to_point()).compress(),
        }
    }

    pub fn encode_base64(&self) -> String {
        encoding::encode(self.secret.as_bytes())
    }

    pub fn decode_base64(encoded: &str) -> Result<Self> {
        let bytes = encoding::decode_exact(encoded, 32)?;
        let mut raw = [0u8; 32];
        raw.copy_from_slice(&bytes);
        let secret: Option<Scalar> = Scalar::from_canonical_bytes(raw).into();
        let secret = secret.ok_or(TokenError::ScalarFormat)?;
        Ok(Self {
            public: RistrettoPoint::mul_base(&secret).compress(),
            secret,
        })
    }
}

impl_base64_serde!(SigningKey);
