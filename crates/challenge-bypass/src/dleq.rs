//! Batch discrete-log equality proofs.
//!
//! A signing server proves that every token in a batch was signed with the
//! same key committed to by its public key. The batch is compressed into a
//! single Chaum-Pedersen proof over composite points built from
//! hash-derived per-token weights.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha512};

use crate::encoding::{self, impl_base64_serde};
use crate::error::TokenError;
use crate::keys::{PublicKey, SigningKey};
use crate::token::{BlindedToken, SignedToken, Token, UnblindedToken};
use crate::Result;

const COMPOSITE_DOMAIN: &[u8] = b"batch_dleq_composite";
const CHALLENGE_DOMAIN: &[u8] = b"batch_dleq_challenge";

/// A batch DLEQ proof `{c, s}` binding a batch of signed tokens to one
/// public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchDleqProof {
    c: Scalar,
    s: Scalar,
}

/// The composite points `M = sum(m_i * P_i)` and `Z = sum(m_i * Q_i)`, with
/// weights `m_i` derived by hashing the batch position and contents. Both
/// sides must compute identical weights for the proof to verify.
fn composites(
    blinded: &[BlindedToken],
    signed: &[SignedToken],
    public_key: &PublicKey,
) -> Result<(RistrettoPoint, RistrettoPoint)> {
    if blinded.len() != signed.len() {
        return Err(TokenError::LengthMismatch);
    }

    let mut m = RistrettoPoint::identity();
    let mut z = RistrettoPoint::identity();
    for (i, (p, q)) in blinded.iter().zip(signed).enumerate() {
        let mut hasher = Sha512::new();
        hasher.update(COMPOSITE_DOMAIN);
        hasher.update((i as u64).to_le_bytes());
        hasher.update(public_key.0.as_bytes());
        hasher.update(p.0.as_bytes());
        hasher.update(q.0.as_bytes());
        let weight = Scalar::from_hash(hasher);

        let p = p.0.decompress().ok_or(TokenError::PointDecompression)?;
        let q = q.0.decompress().ok_or(TokenError::PointDecompression)?;
        m += weight * p;
        z += weight * q;
    }
    Ok((m, z))
}

fn challenge(
    public_key: &PublicKey,
    m: &RistrettoPoint,
    z: &RistrettoPoint,
    a: &RistrettoPoint,
    b: &RistrettoPoint,
) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(CHALLENGE_DOMAIN);
    hasher.update(public_key.0.as_bytes());
    hasher.update(m.compress().as_bytes());
    hasher.update(z.compress().as_bytes());
    hasher.update(a.compress().as_bytes());
    hasher.update(b.compress().as_bytes());
    Scalar::from_hash(hasher)
}

impl BatchDleqProof {
    /// Proves that every `signed[i]` is `key * blinded[i]`.
    pub fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        blinded: &[BlindedToken],
        signed: &[SignedToken],
        key: &SigningKey,
    ) -> Result<Self> {
        let public_key = key.public_key();
        let (m, z) = composites(blinded, signed, &public_key)?;

        let nonce = Scalar::random(rng);
        let a = RistrettoPoint::mul_base(&nonce);
        let b = nonce * m;
        let c = challenge(&public_key, &m, &z, &a, &b);
        Ok(Self {
            c,
            s: nonce - c * key.secret(),
        })
    }

    /// Checks the proof against the batch and public key.
    pub fn verify(
        &self,
        blinded: &[BlindedToken],
        signed: &[SignedToken],
        public_key: &PublicKey,
    ) -> Result<()> {
        let (m, z) = composites(blinded, signed, public_key)?;
        let y = public_key
            .0
            .decompress()
            .ok_or(TokenError::PointDecompression)?;

        let a = RistrettoPoint::mul_base(&self.s) + self.c * y;
        let b = self.s * m + self.c * z;
        if challenge(public_key, &m, &z, &a, &b) != self.c {
            return Err(TokenError::ProofInvalid);
        }
        Ok(())
    }

    /// Verifies the proof and, only on success, unblinds the whole batch.
    /// `tokens` must be the secrets the `blinded` batch was produced from,
    /// in the same order.
    pub fn verify_and_unblind(
        &self,
        tokens: &[Token],
        blinded: &[BlindedToken],
        signed: &[SignedToken],
        public_key: &PublicKey,
    ) -> Result<Vec<UnblindedToken>> {
        if tokens.len() != blinded.len() {
            return Err(TokenError::LengthMismatch);
        }
        self.verify(blinded, signed, public_key)?;
        tokens
            .iter()
            .zip(signed)
            .map(|(token, signed)| token.unblind(signed))
            .collect()
    }

    pub fn encode_base64(&self) -> String {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(self.c.as_bytes());
        bytes.extend_from_slice(self.s.as_bytes());
        encoding::encode(&bytes)
    }

    pub fn decode_base64(encoded: &str) -> Result<Self> {
        let bytes = encoding::decode_exact(encoded, 64)?;
        let mut raw = [0u8; 32];
        raw.copy_from_slice(&bytes[..32]);
        let c: Option<Scalar> = Scalar::from_canonical_bytes(raw).into();
        raw.copy_from_slice(&bytes[32..]);
        let s: Option<Scalar> = Scalar::from_canonical_bytes(raw).into();
        Ok(Self {
            c: c.ok_or(TokenError::ScalarFormat)?,
            s: s.ok_or(TokenError::ScalarFormat)?,
        })
    }
}

impl_base64_serde!(BatchDleqProof);

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn batch(
        rng: &mut StdRng,
        key: &SigningKey,
        size: usize,
    ) -> (Vec<Token>, Vec<BlindedToken>, Vec<SignedToken>) {
        let tokens: Vec<Token> = (0..size).map(|_| Token::random(rng)).collect();
        let blinded: Vec<BlindedToken> = tokens.iter().map(Token::blinded).collect();
        let signed: Vec<SignedToken> = blinded.iter().map(|b| key.sign(b).unwrap()).collect();
        (tokens, blinded, signed)
    }

    #[test]
    fn valid_batch_verifies_and_unblinds() {
        let mut rng = StdRng::seed_from_u64(42);
        let key = SigningKey::random(&mut rng);
        let (tokens, blinded, signed) = batch(&mut rng, &key, 5);

        let proof = BatchDleqProof::new(&mut rng, &blinded, &signed, &key).unwrap();
        let unblinded = proof
            .verify_and_unblind(&tokens, &blinded, &signed, &key.public_key())
            .unwrap();

        assert_eq!(unblinded.len(), 5);
        for (token, unblinded) in tokens.iter().zip(&unblinded) {
            assert_eq!(
                *unblinded,
                key.rederive_unblinded_token(token.preimage())
            );
        }
    }

    #[test]
    fn proof_under_wrong_key_is_rejected() {
        let mut rng = StdRng::seed_from_u64(42);
        let key = SigningKey::random(&mut rng);
        let other = SigningKey::random(&mut rng);
        let (tokens, blinded, signed) = batch(&mut rng, &key, 3);

        let proof = BatchDleqProof::new(&mut rng, &blinded, &signed, &key).unwrap();
        assert_eq!(
            proof.verify_and_unblind(&tokens, &blinded, &signed, &other.public_key()),
            Err(TokenError::ProofInvalid)
        );
    }

    #[test]
    fn substituted_signature_is_rejected() {
        let mut rng = StdRng::seed_from_u64(42);
        let key = SigningKey::random(&mut rng);
        let (_, blinded, mut signed) = batch(&mut rng, &key, 3);

        let proof = BatchDleqProof::new(&mut rng, &blinded, &signed, &key).unwrap();
        signed.swap(0, 1);
        assert_eq!(
            proof.verify(&blinded, &signed, &key.public_key()),
            Err(TokenError::ProofInvalid)
        );
    }

    #[test]
    fn mismatched_batch_lengths_are_rejected() {
        let mut rng = StdRng::seed_from_u64(42);
        let key = SigningKey::random(&mut rng);
        let (_, blinded, signed) = batch(&mut rng, &key, 3);

        let proof = BatchDleqProof::new(&mut rng, &blinded, &signed, &key).unwrap();
        assert_eq!(
            proof.verify(&blinded[..2], &signed, &key.public_key()),
            Err(TokenError::LengthMismatch)
        );
    }

    #[test]
    fn proof_base64_roundtrip() {
        let mut rng = StdRng::seed_from_u64(42);
        let key = SigningKey::random(&mut rng);
        let (_, blinded, signed) = batch(&mut rng, &key, 2);

        let proof = BatchDleqProof::new(&mut rng, &blinded, &signed, &key).unwrap();
        let decoded = BatchDleqProof::decode_base64(&proof.encode_base64()).unwrap();
        assert_eq!(proof, decoded);
        decoded.verify(&blinded, &signed, &key.public_key()).unwrap();
    }
}
